//! Error taxonomy of the measurement layer.

use std::time::Duration;

/// Result type for measure operations.
pub type Result<T> = std::result::Result<T, MeasureError>;

/// Errors that can occur when constructing or reading measures.
///
/// Overrun of a polling period is deliberately not represented here: it is
/// a degraded-performance condition reported through the log channel only.
#[derive(Debug, thiserror::Error)]
pub enum MeasureError {
    /// A polling period that cannot drive a schedule, reported at
    /// construction time.
    #[error("polling period must be greater than zero, got {period:?}")]
    InvalidPeriod {
        /// The rejected period.
        period: Duration,
    },

    /// An introspective read failed at `get` time.
    #[error("failed to read measure '{key}': {cause}")]
    AccessFailed {
        /// Key of the affected measure.
        key: String,
        /// Underlying accessor or serialization failure.
        cause: anyhow::Error,
    },

    /// The subject handed to a builder exposes no introspectable fields.
    #[error("subject cannot be introspected: {reason}")]
    NotIntrospectable {
        /// Why field enumeration was impossible.
        reason: String,
    },
}

impl MeasureError {
    /// Wrap an accessor failure for the measure registered under `key`.
    pub fn access_failed(key: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        MeasureError::AccessFailed {
            key: key.into(),
            cause: cause.into(),
        }
    }
}
