//! Unique identifiers for background adapters.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a polling adapter, carried in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdapterId(Ulid);

impl AdapterId {
    /// Generate a new AdapterId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for AdapterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AdapterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
