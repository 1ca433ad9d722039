//! Push-to-pull adapter backed by a cached last value.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use meterkit_core::{Measure, MeasureListener, PullMeasure, PushMeasure, Result};

/// Removes the adapter's listener from the source when the adapter drops.
///
/// Holds only a `Weak` source reference so the adapter never keeps the
/// source alive. A source that dropped first needs no cleanup.
struct ListenerGuard<V> {
    source: Weak<dyn PushMeasure<V>>,
    listener: Arc<dyn MeasureListener<V>>,
}

impl<V> Drop for ListenerGuard<V> {
    fn drop(&mut self) {
        if let Some(source) = self.source.upgrade() {
            source.unregister(&self.listener);
        }
    }
}

/// A pull measure reading the latest value a push measure delivered.
///
/// The adapter registers a listener on the source before the constructor
/// returns, so no notification is missed after construction. `get` reads a
/// cached cell and never blocks on the source; until the first notification
/// it returns the initial value supplied at construction.
///
/// Values observed only between two reads are invisible to callers, which
/// is the point of the adapter: consumers poll at their own pace.
pub struct PullFromPush<V> {
    name: String,
    description: String,
    cache: Arc<RwLock<V>>,
    _guard: ListenerGuard<V>,
}

impl<V> PullFromPush<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Adapt `source` into a pull measure starting from `initial`.
    pub fn new(source: &Arc<dyn PushMeasure<V>>, initial: V) -> Self {
        let cache = Arc::new(RwLock::new(initial));
        let sink = Arc::clone(&cache);
        let listener: Arc<dyn MeasureListener<V>> = Arc::new(move |value: &V| {
            *sink.write().unwrap_or_else(PoisonError::into_inner) = value.clone();
        });
        source.register(Arc::clone(&listener));
        Self {
            name: source.name().to_string(),
            description: source.description().to_string(),
            cache,
            _guard: ListenerGuard {
                source: Arc::downgrade(source),
                listener,
            },
        }
    }
}

impl<V> Measure for PullFromPush<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<V> PullMeasure<V> for PullFromPush<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self) -> Result<V> {
        Ok(self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}
