//! Adapters bridging the pull and push measure interfaces.
//!
//! [`PullFromPush`] caches the latest notification of a push measure behind
//! a non-blocking `get`. [`PushFromPull`] polls a pull measure on a
//! background task and notifies listeners on change.

#![warn(missing_docs)]

mod id;
mod pull_from_push;
mod push_from_pull;

pub use id::AdapterId;
pub use pull_from_push::PullFromPush;
pub use push_from_pull::PushFromPull;
