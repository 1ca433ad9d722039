//! Measure builders over a subject's accessors or serialized fields.
//!
//! [`pulls_from_getters`] turns caller-declared accessor methods into a map
//! of pull measures, keyed by the accessor name minus its `get_` prefix.
//! [`pulls_from_fields`] derives one pull measure per serialized field of
//! the subject. Both produce [`MeasureValue`]-typed measures so callers can
//! treat heterogeneous subjects uniformly.

#![warn(missing_docs)]

mod fields;
mod getters;

pub use fields::pulls_from_fields;
pub use getters::{pulls_from_getters, Accessor};

// Re-exported for the `accessors!` macro expansion.
pub use meterkit_core::MeasureValue;
