//! Basic measure implementations.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::Result;
use crate::measure::{Measure, MeasureListener, PullMeasure, PushMeasure};

/// A push measure whose owner calls [`push`](SimplePushMeasure::push) on
/// each value change.
///
/// The listener set is guarded by a mutex and iterated over a snapshot, so
/// listeners may register or unregister from inside a callback without
/// deadlocking.
pub struct SimplePushMeasure<V> {
    name: String,
    description: String,
    listeners: Mutex<Vec<Arc<dyn MeasureListener<V>>>>,
}

impl<V> SimplePushMeasure<V> {
    /// Create a push measure with the given name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Fan a value out to every currently registered listener.
    ///
    /// Delivery order across listeners is unspecified.
    pub fn push(&self, value: &V) {
        let snapshot: Vec<_> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in snapshot {
            listener.measure_generated(value);
        }
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<V> Measure for SimplePushMeasure<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<V> PushMeasure<V> for SimplePushMeasure<V> {
    fn register(&self, listener: Arc<dyn MeasureListener<V>>) {
        let mut listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    fn unregister(&self, listener: &Arc<dyn MeasureListener<V>>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| !Arc::ptr_eq(l, listener));
    }
}

/// A pull measure backed by a read closure supplied at construction.
pub struct SimplePullMeasure<V> {
    name: String,
    description: String,
    read: Box<dyn Fn() -> Result<V> + Send + Sync>,
}

impl<V> SimplePullMeasure<V> {
    /// Create a pull measure that evaluates `read` on every `get` call.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        read: impl Fn() -> Result<V> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            read: Box::new(read),
        }
    }
}

impl<V> Measure for SimplePullMeasure<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<V> PullMeasure<V> for SimplePullMeasure<V> {
    fn get(&self) -> Result<V> {
        (self.read)()
    }
}
