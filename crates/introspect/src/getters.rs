//! Measures built from caller-declared accessor methods.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::debug;

use meterkit_core::{Measure, MeasureError, MeasureValue, PullMeasure, Result};

/// Naming convention an accessor must follow to yield a measure.
const GETTER_PATTERN: &str = "^get_[a-z0-9_]+$";

fn getter_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(GETTER_PATTERN).expect("getter pattern compiles"))
}

/// A named zero-argument accessor on a subject of type `T`.
///
/// Build lists of these with the [`accessors!`](crate::accessors) macro,
/// which derives each name from the method it wraps.
pub struct Accessor<T> {
    name: String,
    read: Arc<dyn Fn(&T) -> anyhow::Result<MeasureValue> + Send + Sync>,
}

impl<T> Accessor<T> {
    /// Wrap `read` under the accessor name `name`.
    pub fn new(
        name: impl Into<String>,
        read: impl Fn(&T) -> anyhow::Result<MeasureValue> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            read: Arc::new(read),
        }
    }

    /// The accessor's declared name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Build accessor lists from plain method names.
///
/// `accessors![get_depth, get_rate]` expands to a `Vec<Accessor<T>>` whose
/// entries call `subject.get_depth()` and `subject.get_rate()`, converting
/// the returned values with `MeasureValue::from`.
#[macro_export]
macro_rules! accessors {
    ($($method:ident),* $(,)?) => {
        vec![
            $($crate::Accessor::new(stringify!($method), |subject| {
                Ok($crate::MeasureValue::from(subject.$method()))
            })),*
        ]
    };
}

struct GetterMeasure<T> {
    key: String,
    description: String,
    subject: Arc<T>,
    read: Arc<dyn Fn(&T) -> anyhow::Result<MeasureValue> + Send + Sync>,
}

impl<T> Measure for GetterMeasure<T>
where
    T: Send + Sync,
{
    fn name(&self) -> &str {
        &self.key
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<T> PullMeasure<MeasureValue> for GetterMeasure<T>
where
    T: Send + Sync,
{
    fn get(&self) -> Result<MeasureValue> {
        (self.read)(&self.subject).map_err(|source| MeasureError::access_failed(&self.key, source))
    }
}

/// One pull measure per conforming accessor of `subject`.
///
/// Accessors whose name does not match `get_` followed by lowercase
/// letters, digits or underscores are skipped silently. The map key is the
/// accessor name with the `get_` prefix stripped. Every `get` invokes the
/// accessor afresh; a failing accessor surfaces as
/// [`MeasureError::AccessFailed`] for its own measure only. The returned
/// measures keep `subject` alive.
pub fn pulls_from_getters<T>(
    subject: Arc<T>,
    accessors: Vec<Accessor<T>>,
) -> HashMap<String, Arc<dyn PullMeasure<MeasureValue>>>
where
    T: Send + Sync + 'static,
{
    let mut measures: HashMap<String, Arc<dyn PullMeasure<MeasureValue>>> = HashMap::new();
    for accessor in accessors {
        if !getter_pattern().is_match(&accessor.name) {
            debug!("Skipping non-conforming accessor '{}'", accessor.name);
            continue;
        }
        let key = accessor
            .name
            .strip_prefix("get_")
            .unwrap_or(&accessor.name)
            .to_string();
        let measure = GetterMeasure {
            description: format!("value of {} on the observed subject", key),
            key: key.clone(),
            subject: Arc::clone(&subject),
            read: accessor.read,
        };
        measures.insert(key, Arc::new(measure));
    }
    debug!("Built {} accessor measure(s)", measures.len());
    measures
}
