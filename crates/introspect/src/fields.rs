//! Measures built from a subject's serialized fields.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use meterkit_core::{Measure, MeasureError, MeasureValue, PullMeasure, Result};

struct FieldMeasure<T> {
    key: String,
    description: String,
    subject: Arc<T>,
}

impl<T> FieldMeasure<T>
where
    T: Serialize + Send + Sync,
{
    fn read(&self) -> anyhow::Result<MeasureValue> {
        let rendered = serde_json::to_value(&*self.subject)?;
        match rendered {
            serde_json::Value::Object(mut fields) => match fields.remove(&self.key) {
                Some(value) => Ok(MeasureValue::from(value)),
                None => Err(anyhow::anyhow!("field '{}' no longer present", self.key)),
            },
            other => Err(anyhow::anyhow!(
                "subject no longer serializes to an object, got {}",
                other
            )),
        }
    }
}

impl<T> Measure for FieldMeasure<T>
where
    T: Serialize + Send + Sync,
{
    fn name(&self) -> &str {
        &self.key
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl<T> PullMeasure<MeasureValue> for FieldMeasure<T>
where
    T: Serialize + Send + Sync,
{
    fn get(&self) -> Result<MeasureValue> {
        self.read()
            .map_err(|source| MeasureError::access_failed(&self.key, source))
    }
}

/// One pull measure per externally visible field of `subject`.
///
/// Fields are enumerated through one serialization at construction; a
/// subject that does not serialize to an object is rejected with
/// [`MeasureError::NotIntrospectable`]. Each measure re-serializes the
/// subject at `get` time and extracts its own field, so reads observe
/// later mutation of the subject through interior mutability. Structured
/// field values render as [`MeasureValue::Opaque`] JSON. The returned
/// measures keep `subject` alive.
pub fn pulls_from_fields<T>(
    subject: Arc<T>,
) -> Result<HashMap<String, Arc<dyn PullMeasure<MeasureValue>>>>
where
    T: Serialize + Send + Sync + 'static,
{
    let rendered = serde_json::to_value(&*subject).map_err(|error| {
        MeasureError::NotIntrospectable {
            reason: format!("subject failed to serialize: {}", error),
        }
    })?;
    let fields = match rendered {
        serde_json::Value::Object(fields) => fields,
        other => {
            return Err(MeasureError::NotIntrospectable {
                reason: format!("subject serializes to {}, not an object", kind_of(&other)),
            });
        }
    };

    let mut measures: HashMap<String, Arc<dyn PullMeasure<MeasureValue>>> = HashMap::new();
    for key in fields.into_iter().map(|(key, _)| key) {
        let measure = FieldMeasure {
            description: format!("field {} of the observed subject", key),
            key: key.clone(),
            subject: Arc::clone(&subject),
        };
        measures.insert(key, Arc::new(measure));
    }
    debug!("Built {} field measure(s)", measures.len());
    Ok(measures)
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
