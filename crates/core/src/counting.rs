//! Occurrence-counting push measure.

use std::sync::{Arc, Mutex, PoisonError};

use crate::measure::{Measure, MeasureListener, PushMeasure};
use crate::simple::SimplePushMeasure;

/// A push measure that counts occurrences and notifies the running total.
///
/// Typical use is an iteration counter: the owning loop calls
/// [`increment`](CountingMeasure::increment) once per round and consumers
/// observe the count through the push interface, or through a push-to-pull
/// adapter when they prefer polling.
pub struct CountingMeasure {
    push: SimplePushMeasure<i64>,
    // Held across the push so counts are delivered in order.
    count: Mutex<i64>,
}

impl CountingMeasure {
    /// Create a counter starting at zero.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            push: SimplePushMeasure::new(name, description),
            count: Mutex::new(0),
        }
    }

    /// Add one to the count and notify listeners with the new total.
    pub fn increment(&self) -> i64 {
        self.increment_by(1)
    }

    /// Add `amount` to the count and notify listeners with the new total.
    pub fn increment_by(&self, amount: i64) -> i64 {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count += amount;
        let current = *count;
        self.push.push(&current);
        current
    }

    /// Reset the count to zero and notify listeners.
    pub fn reset(&self) {
        self.reset_to(0);
    }

    /// Reset the count to `value` and notify listeners.
    pub fn reset_to(&self, value: i64) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = value;
        self.push.push(&value);
    }

    /// Current count without notifying anyone.
    pub fn count(&self) -> i64 {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Measure for CountingMeasure {
    fn name(&self) -> &str {
        self.push.name()
    }

    fn description(&self) -> &str {
        self.push.description()
    }
}

impl PushMeasure<i64> for CountingMeasure {
    fn register(&self, listener: Arc<dyn MeasureListener<i64>>) {
        self.push.register(listener);
    }

    fn unregister(&self, listener: &Arc<dyn MeasureListener<i64>>) {
        self.push.unregister(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_notifies_running_count() {
        let counter = CountingMeasure::new("iterations", "loop iterations");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        counter.register(Arc::new(move |value: &i64| {
            sink.lock().unwrap().push(*value);
        }));

        counter.increment();
        counter.increment();
        counter.increment_by(3);

        assert_eq!(counter.count(), 5);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 5]);
    }

    #[test]
    fn test_reset_notifies_new_value() {
        let counter = CountingMeasure::new("iterations", "loop iterations");
        counter.increment_by(9);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        counter.register(Arc::new(move |value: &i64| {
            sink.lock().unwrap().push(*value);
        }));

        counter.reset();
        assert_eq!(counter.count(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![0]);
    }
}
