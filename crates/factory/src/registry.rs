//! Name-keyed registry of value-typed measures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tracing::debug;

use meterkit_core::{MeasureValue, PullMeasure, PushMeasure};

struct RegistryState {
    pulls: HashMap<String, Arc<dyn PullMeasure<MeasureValue>>>,
    pushes: HashMap<String, Arc<dyn PushMeasure<MeasureValue>>>,
}

/// A registry of [`MeasureValue`]-typed measures, keyed by name.
///
/// Pull and push measures live in separate slots, so one key may carry
/// both. Registering under an existing key replaces the previous measure
/// in that slot.
pub struct MeasureRegistry {
    state: Mutex<RegistryState>,
}

impl MeasureRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                pulls: HashMap::new(),
                pushes: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a pull measure under `key`.
    pub fn register_pull(&self, key: impl Into<String>, measure: Arc<dyn PullMeasure<MeasureValue>>) {
        let key = key.into();
        debug!("Registering pull measure '{}'", key);
        self.lock().pulls.insert(key, measure);
    }

    /// Register a push measure under `key`.
    pub fn register_push(&self, key: impl Into<String>, measure: Arc<dyn PushMeasure<MeasureValue>>) {
        let key = key.into();
        debug!("Registering push measure '{}'", key);
        self.lock().pushes.insert(key, measure);
    }

    /// Register every measure of a builder result, keyed as built.
    pub fn register_pulls(&self, measures: HashMap<String, Arc<dyn PullMeasure<MeasureValue>>>) {
        let mut state = self.lock();
        for (key, measure) in measures {
            state.pulls.insert(key, measure);
        }
    }

    /// The pull measure registered under `key`.
    pub fn pull(&self, key: &str) -> Option<Arc<dyn PullMeasure<MeasureValue>>> {
        self.lock().pulls.get(key).cloned()
    }

    /// The push measure registered under `key`.
    pub fn push(&self, key: &str) -> Option<Arc<dyn PushMeasure<MeasureValue>>> {
        self.lock().pushes.get(key).cloned()
    }

    /// All registered keys, sorted and deduplicated across both slots.
    pub fn keys(&self) -> Vec<String> {
        let state = self.lock();
        let mut keys: Vec<String> = state
            .pulls
            .keys()
            .chain(state.pushes.keys())
            .cloned()
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Remove both slots of `key`. Returns whether anything was removed.
    pub fn remove(&self, key: &str) -> bool {
        let mut state = self.lock();
        let removed_pull = state.pulls.remove(key).is_some();
        let removed_push = state.pushes.remove(key).is_some();
        removed_pull || removed_push
    }

    /// Read every registered pull measure once.
    ///
    /// A failing read is recorded under its key and never aborts the rest
    /// of the snapshot.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let pulls: Vec<_> = {
            let state = self.lock();
            state
                .pulls
                .iter()
                .map(|(key, measure)| (key.clone(), Arc::clone(measure)))
                .collect()
        };

        let mut values = Vec::new();
        let mut failures = Vec::new();
        for (key, measure) in pulls {
            match measure.get() {
                Ok(value) => values.push((key, value)),
                Err(error) => failures.push((key, error.to_string())),
            }
        }
        values.sort_by(|a, b| a.0.cmp(&b.0));
        failures.sort_by(|a, b| a.0.cmp(&b.0));

        RegistrySnapshot {
            timestamp: Utc::now(),
            values,
            failures,
        }
    }
}

impl Default for MeasureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of every registered pull measure at a point in time.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    /// When snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// Successfully read values by key, sorted by key
    pub values: Vec<(String, MeasureValue)>,

    /// Read failures by key, sorted by key
    pub failures: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterkit_core::{MeasureError, SimplePullMeasure, SimplePushMeasure};

    fn constant(name: &str, value: i64) -> Arc<dyn PullMeasure<MeasureValue>> {
        Arc::new(SimplePullMeasure::new(name, name, move || {
            Ok(MeasureValue::Integer(value))
        }))
    }

    fn failing(name: &'static str) -> Arc<dyn PullMeasure<MeasureValue>> {
        Arc::new(SimplePullMeasure::new(name, name, move || {
            Err(MeasureError::access_failed(
                name,
                anyhow::anyhow!("probe offline"),
            ))
        }))
    }

    #[test]
    fn test_register_and_read_back() {
        let registry = MeasureRegistry::new();
        registry.register_pull("depth", constant("depth", 4));
        registry.register_push(
            "events",
            Arc::new(SimplePushMeasure::new("events", "event stream")),
        );

        assert_eq!(registry.keys(), vec!["depth", "events"]);
        assert_eq!(
            registry.pull("depth").unwrap().get().unwrap(),
            MeasureValue::Integer(4)
        );
        assert!(registry.push("events").is_some());
        assert!(registry.pull("events").is_none());
    }

    #[test]
    fn test_reregistering_replaces_the_slot() {
        let registry = MeasureRegistry::new();
        registry.register_pull("depth", constant("depth", 1));
        registry.register_pull("depth", constant("depth", 2));

        assert_eq!(registry.keys(), vec!["depth"]);
        assert_eq!(
            registry.pull("depth").unwrap().get().unwrap(),
            MeasureValue::Integer(2)
        );
    }

    #[test]
    fn test_remove_clears_both_slots() {
        let registry = MeasureRegistry::new();
        registry.register_pull("depth", constant("depth", 1));
        registry.register_push(
            "depth",
            Arc::new(SimplePushMeasure::new("depth", "queue depth")),
        );

        assert!(registry.remove("depth"));
        assert!(registry.keys().is_empty());
        assert!(!registry.remove("depth"));
    }

    #[test]
    fn test_snapshot_records_failures_per_key() {
        let registry = MeasureRegistry::new();
        registry.register_pull("depth", constant("depth", 4));
        registry.register_pull("rate", failing("rate"));

        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot.values,
            vec![("depth".to_string(), MeasureValue::Integer(4))]
        );
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].0, "rate");
        assert!(snapshot.failures[0].1.contains("probe offline"));
    }

    #[test]
    fn test_register_pulls_bulk() {
        let registry = MeasureRegistry::new();
        let mut measures: HashMap<String, Arc<dyn PullMeasure<MeasureValue>>> = HashMap::new();
        measures.insert("a".to_string(), constant("a", 1));
        measures.insert("b".to_string(), constant("b", 2));
        registry.register_pulls(measures);

        assert_eq!(registry.keys(), vec!["a", "b"]);
    }
}
