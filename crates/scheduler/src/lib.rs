//! Shared polling scheduler for pull measures.
//!
//! One background task serves any number of scheduled checks, each with its
//! own period. [`PollScheduler::schedule`] hands back a [`ScheduledPush`]
//! that behaves like the dedicated polling adapter but costs no extra task.

#![warn(missing_docs)]

mod id;
mod scheduler;

pub use id::EntryId;
pub use scheduler::{PollScheduler, ScheduledPush};
