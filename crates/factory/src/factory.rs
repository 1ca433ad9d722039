//! One-stop constructors for adapters and builders.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use meterkit_adapters::{PullFromPush, PushFromPull};
use meterkit_core::{MeasureValue, PullMeasure, PushMeasure, Result};
use meterkit_introspect::Accessor;
use meterkit_scheduler::{PollScheduler, ScheduledPush};

/// Entry point bundling every adapter and builder constructor.
///
/// The factory is cheap to create and to clone. All clones share one
/// [`PollScheduler`], whose task starts lazily on the first
/// [`push_from_pull_shared`](MeasureFactory::push_from_pull_shared) call.
#[derive(Clone, Default)]
pub struct MeasureFactory {
    scheduler: PollScheduler,
}

impl MeasureFactory {
    /// Create a factory with an idle shared scheduler.
    pub fn new() -> Self {
        Self {
            scheduler: PollScheduler::new(),
        }
    }

    /// Adapt a push measure into a pull measure caching the latest value.
    ///
    /// `get` returns `initial` until the first notification arrives.
    pub fn pull_from_push<V>(
        &self,
        source: &Arc<dyn PushMeasure<V>>,
        initial: V,
    ) -> PullFromPush<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        PullFromPush::new(source, initial)
    }

    /// Adapt a pull measure into a push measure polled on its own task.
    pub fn push_from_pull<V>(
        &self,
        source: &Arc<dyn PullMeasure<V>>,
        period: Duration,
    ) -> Result<PushFromPull<V>>
    where
        V: PartialEq + Send + 'static,
    {
        PushFromPull::new(source, period)
    }

    /// Adapt a pull measure into a push measure polled by the shared
    /// scheduler task.
    pub fn push_from_pull_shared<V>(
        &self,
        source: &Arc<dyn PullMeasure<V>>,
        period: Duration,
    ) -> Result<ScheduledPush<V>>
    where
        V: PartialEq + Send + 'static,
    {
        self.scheduler.schedule(source, period)
    }

    /// One pull measure per conforming accessor of `subject`.
    pub fn pulls_from_getters<T>(
        &self,
        subject: Arc<T>,
        accessors: Vec<Accessor<T>>,
    ) -> HashMap<String, Arc<dyn PullMeasure<MeasureValue>>>
    where
        T: Send + Sync + 'static,
    {
        meterkit_introspect::pulls_from_getters(subject, accessors)
    }

    /// One pull measure per serialized field of `subject`.
    pub fn pulls_from_fields<T>(
        &self,
        subject: Arc<T>,
    ) -> Result<HashMap<String, Arc<dyn PullMeasure<MeasureValue>>>>
    where
        T: Serialize + Send + Sync + 'static,
    {
        meterkit_introspect::pulls_from_fields(subject)
    }

    /// The scheduler behind [`push_from_pull_shared`]
    /// (MeasureFactory::push_from_pull_shared).
    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }
}
