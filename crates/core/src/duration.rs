//! Wall-clock duration measure.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::measure::{Measure, PullMeasure};

#[derive(Default)]
struct DurationState {
    accumulated: Duration,
    started_at: Option<Instant>,
}

/// A pull measure exposing accumulated running time.
///
/// The clock accumulates across [`start`](DurationMeasure::start) and
/// [`stop`](DurationMeasure::stop) spans. While running, `get` reports the
/// accumulated total plus the elapsed part of the current span.
pub struct DurationMeasure {
    name: String,
    description: String,
    state: Mutex<DurationState>,
}

impl DurationMeasure {
    /// Create a stopped clock with nothing accumulated.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            state: Mutex::new(DurationState::default()),
        }
    }

    /// Start a span. Calling `start` on a running clock is a no-op.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
    }

    /// End the current span and fold it into the accumulated total.
    ///
    /// Calling `stop` on a stopped clock is a no-op.
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(started_at) = state.started_at.take() {
            state.accumulated += started_at.elapsed();
        }
    }

    /// Discard everything accumulated and stop the clock.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.accumulated = Duration::ZERO;
        state.started_at = None;
    }

    /// Whether a span is currently open.
    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .started_at
            .is_some()
    }
}

impl Measure for DurationMeasure {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

impl PullMeasure<Duration> for DurationMeasure {
    fn get(&self) -> Result<Duration> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let running = state
            .started_at
            .map(|started_at| started_at.elapsed())
            .unwrap_or(Duration::ZERO);
        Ok(state.accumulated + running)
    }
}
