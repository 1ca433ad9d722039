//! Shared polling scheduler multiplexing many pull sources on one task.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use meterkit_core::timing::realign;
use meterkit_core::{
    Measure, MeasureError, MeasureListener, PullMeasure, PushMeasure, Result, SimplePushMeasure,
};

use crate::id::EntryId;

/// How long the scheduler task parks on an empty registry before it
/// rechecks whether any handle still exists.
const PARK_RECHECK: Duration = Duration::from_secs(1);

struct Entry {
    id: EntryId,
    period: Duration,
    next_due: Instant,
    // Upgrades its weak source/sink pair, runs one check, pushes on change.
    // Returns false once either side is gone and the entry must go.
    check: Box<dyn FnMut() -> bool + Send>,
}

struct SchedulerState {
    entries: Vec<Entry>,
    cancelled: HashSet<EntryId>,
    task_started: bool,
}

struct SchedulerInner {
    state: Mutex<SchedulerState>,
    wake: Notify,
}

impl SchedulerInner {
    fn lock(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One background task polling any number of pull sources at their own
/// periods.
///
/// Cheap to clone; all clones feed the same task. The task starts lazily on
/// the first [`schedule`](PollScheduler::schedule) call and ends once every
/// scheduler clone and every entry handle is gone. Entries hold only `Weak`
/// references to their source and sink, so scheduling never keeps either
/// alive.
#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<SchedulerInner>,
}

impl PollScheduler {
    /// Create a scheduler with no entries and no running task.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(SchedulerState {
                    entries: Vec::new(),
                    cancelled: HashSet::new(),
                    task_started: false,
                }),
                wake: Notify::new(),
            }),
        }
    }

    /// Check `source` every `period`, pushing observed changes.
    ///
    /// The entry's first check happens one period from now. The value read
    /// at scheduling time becomes the comparison baseline, so the first
    /// check only notifies if the value changed since then. Must be called
    /// from within a tokio runtime the first time, as it may start the
    /// scheduler task.
    pub fn schedule<V>(
        &self,
        source: &Arc<dyn PullMeasure<V>>,
        period: Duration,
    ) -> Result<ScheduledPush<V>>
    where
        V: PartialEq + Send + 'static,
    {
        if period.is_zero() {
            return Err(MeasureError::InvalidPeriod { period });
        }
        let id = EntryId::new();
        let fanout = Arc::new(SimplePushMeasure::new(source.name(), source.description()));

        let weak_source = Arc::downgrade(source);
        let weak_sink = Arc::downgrade(&fanout);
        let mut last: Option<V> = match source.get() {
            Ok(value) => Some(value),
            Err(error) => {
                warn!("Scheduled check {} failed its baseline read: {}", id, error);
                None
            }
        };
        let check = Box::new(move || -> bool {
            let (source, sink) = match (weak_source.upgrade(), weak_sink.upgrade()) {
                (Some(source), Some(sink)) => (source, sink),
                _ => return false,
            };
            match source.get() {
                Ok(value) => {
                    if last.as_ref() != Some(&value) {
                        sink.push(&value);
                        last = Some(value);
                    }
                }
                Err(error) => {
                    warn!("Scheduled check {} skipped: {}", id, error);
                }
            }
            true
        });

        {
            let mut state = self.inner.lock();
            state.entries.push(Entry {
                id,
                period,
                next_due: Instant::now() + period,
                check,
            });
            if !state.task_started {
                state.task_started = true;
                tokio::spawn(run(Arc::downgrade(&self.inner)));
            }
        }
        self.inner.wake.notify_one();
        debug!("Scheduled check {} for '{}' every {:?}", id, fanout.name(), period);

        Ok(ScheduledPush {
            id,
            fanout,
            scheduler: Arc::clone(&self.inner),
            stop_on_drop: AtomicBool::new(true),
        })
    }

    /// Number of currently registered entries.
    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one scheduled polling entry, usable as a push measure.
///
/// Dropping the handle cancels the entry unless
/// [`detach`](ScheduledPush::detach) was called first. Cancelling one entry
/// never disturbs the others sharing the scheduler.
pub struct ScheduledPush<V> {
    id: EntryId,
    fanout: Arc<SimplePushMeasure<V>>,
    scheduler: Arc<SchedulerInner>,
    stop_on_drop: AtomicBool,
}

impl<V> std::fmt::Debug for ScheduledPush<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledPush")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl<V> ScheduledPush<V> {
    /// Identifier carried in this entry's log lines.
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// Cancel the entry. Idempotent; listeners receive nothing more.
    pub fn stop(&self) {
        let mut state = self.scheduler.lock();
        let before = state.entries.len();
        state.entries.retain(|entry| entry.id != self.id);
        if state.entries.len() == before {
            // Entry is mid-check; honored as soon as the check returns.
            state.cancelled.insert(self.id);
        }
        drop(state);
        self.scheduler.wake.notify_one();
    }

    /// Whether the entry is still registered with the scheduler.
    pub fn is_active(&self) -> bool {
        self.scheduler
            .lock()
            .entries
            .iter()
            .any(|entry| entry.id == self.id)
    }

    /// Disarm stop-on-drop and hand out the fan-out measure.
    ///
    /// After this call the entry keeps running once the handle is dropped,
    /// for as long as both the returned measure and the source stay alive.
    pub fn detach(&self) -> Arc<SimplePushMeasure<V>> {
        self.stop_on_drop.store(false, Ordering::SeqCst);
        Arc::clone(&self.fanout)
    }
}

impl<V> Measure for ScheduledPush<V>
where
    V: Send + Sync,
{
    fn name(&self) -> &str {
        self.fanout.name()
    }

    fn description(&self) -> &str {
        self.fanout.description()
    }
}

impl<V> PushMeasure<V> for ScheduledPush<V>
where
    V: Send + Sync,
{
    fn register(&self, listener: Arc<dyn MeasureListener<V>>) {
        self.fanout.register(listener);
    }

    fn unregister(&self, listener: &Arc<dyn MeasureListener<V>>) {
        self.fanout.unregister(listener);
    }
}

impl<V> Drop for ScheduledPush<V> {
    fn drop(&mut self) {
        if self.stop_on_drop.load(Ordering::SeqCst) {
            self.stop();
        }
    }
}

async fn run(inner: Weak<SchedulerInner>) {
    debug!("Poll scheduler task started");
    loop {
        let Some(inner) = inner.upgrade() else { break };
        let next_due = inner.lock().entries.iter().map(|e| e.next_due).min();
        match next_due {
            Some(due) => {
                tokio::select! {
                    _ = time::sleep_until(due) => run_due(&inner),
                    _ = inner.wake.notified() => {}
                }
            }
            None => {
                let _ = time::timeout(PARK_RECHECK, inner.wake.notified()).await;
            }
        }
    }
    debug!("Poll scheduler task ended");
}

fn run_due(inner: &SchedulerInner) {
    let now = Instant::now();
    let due: Vec<Entry> = {
        let mut state = inner.lock();
        let (due, rest): (Vec<Entry>, Vec<Entry>) = state
            .entries
            .drain(..)
            .partition(|entry| entry.next_due <= now);
        state.entries = rest;
        due
    };

    let mut keep = Vec::new();
    for mut entry in due {
        if inner.lock().cancelled.remove(&entry.id) {
            continue;
        }
        if !(entry.check)() {
            debug!("Scheduled check {} removed, source or sink gone", entry.id);
            continue;
        }
        let after = Instant::now();
        let lag = after.duration_since(entry.next_due);
        if lag >= entry.period {
            let (remainder, missed) = realign(lag, entry.period);
            warn!(
                "Scheduled check {} lagged {:?} behind its {:?} period, dropping {} tick(s)",
                entry.id, lag, entry.period, missed
            );
            entry.next_due = after + (entry.period - remainder);
        } else {
            entry.next_due += entry.period;
        }
        if !inner.lock().cancelled.remove(&entry.id) {
            keep.push(entry);
        }
    }

    let mut state = inner.lock();
    state.entries.extend(keep);
    state.cancelled.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterkit_core::SimplePullMeasure;
    use std::sync::atomic::AtomicI64;

    fn ticking_source(name: &str) -> (Arc<AtomicI64>, Arc<dyn PullMeasure<i64>>) {
        let cell = Arc::new(AtomicI64::new(0));
        let read = Arc::clone(&cell);
        let source: Arc<dyn PullMeasure<i64>> =
            Arc::new(SimplePullMeasure::new(name, name, move || {
                Ok(read.fetch_add(1, Ordering::SeqCst))
            }));
        (cell, source)
    }

    fn constant_source(name: &str, value: i64) -> Arc<dyn PullMeasure<i64>> {
        Arc::new(SimplePullMeasure::new(name, name, move || Ok(value)))
    }

    fn collect(seen: &Arc<Mutex<Vec<i64>>>) -> Arc<dyn MeasureListener<i64>> {
        let seen = Arc::clone(seen);
        Arc::new(move |value: &i64| {
            seen.lock().unwrap().push(*value);
        })
    }

    #[tokio::test]
    async fn test_zero_period_rejected() {
        let scheduler = PollScheduler::new();
        let source = constant_source("depth", 1);
        let err = scheduler.schedule(&source, Duration::ZERO).unwrap_err();
        assert!(matches!(err, MeasureError::InvalidPeriod { .. }));
        assert_eq!(scheduler.entry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_tick_at_their_own_periods() {
        let scheduler = PollScheduler::new();
        let (_fast_cell, fast) = ticking_source("fast");
        let (_slow_cell, slow) = ticking_source("slow");
        let fast_handle = scheduler.schedule(&fast, Duration::from_millis(100)).unwrap();
        let slow_handle = scheduler.schedule(&slow, Duration::from_millis(250)).unwrap();

        let fast_seen = Arc::new(Mutex::new(Vec::new()));
        let slow_seen = Arc::new(Mutex::new(Vec::new()));
        fast_handle.register(collect(&fast_seen));
        slow_handle.register(collect(&slow_seen));

        time::sleep(Duration::from_millis(550)).await;
        assert_eq!(*fast_seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(*slow_seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_value_not_renotified() {
        let scheduler = PollScheduler::new();
        let cell = Arc::new(AtomicI64::new(7));
        let read = Arc::clone(&cell);
        let source: Arc<dyn PullMeasure<i64>> =
            Arc::new(SimplePullMeasure::new("depth", "depth", move || {
                Ok(read.load(Ordering::SeqCst))
            }));
        let handle = scheduler.schedule(&source, Duration::from_millis(100)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        handle.register(collect(&seen));

        time::sleep(Duration::from_millis(250)).await;
        assert!(seen.lock().unwrap().is_empty());

        cell.store(8, Ordering::SeqCst);
        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(*seen.lock().unwrap(), vec![8]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_only_that_entry() {
        let scheduler = PollScheduler::new();
        let (_kept_cell, kept) = ticking_source("kept");
        let (_gone_cell, gone) = ticking_source("gone");
        let kept_handle = scheduler.schedule(&kept, Duration::from_millis(100)).unwrap();
        let gone_handle = scheduler.schedule(&gone, Duration::from_millis(100)).unwrap();

        let kept_seen = Arc::new(Mutex::new(Vec::new()));
        let gone_seen = Arc::new(Mutex::new(Vec::new()));
        kept_handle.register(collect(&kept_seen));
        gone_handle.register(collect(&gone_seen));

        gone_handle.stop();
        assert!(!gone_handle.is_active());
        assert!(kept_handle.is_active());

        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*kept_seen.lock().unwrap(), vec![1, 2]);
        assert!(gone_seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_of_handle_cancels_entry() {
        let scheduler = PollScheduler::new();
        let (_cell, source) = ticking_source("depth");
        let handle = scheduler.schedule(&source, Duration::from_millis(100)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        handle.register(collect(&seen));

        drop(handle);
        assert_eq!(scheduler.entry_count(), 0);

        time::sleep(Duration::from_millis(300)).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_entry_outlives_the_handle() {
        let scheduler = PollScheduler::new();
        let (_cell, source) = ticking_source("depth");
        let handle = scheduler.schedule(&source, Duration::from_millis(100)).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = handle.detach();
        sink.register(collect(&seen));
        drop(handle);
        assert_eq!(scheduler.entry_count(), 1);

        time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);

        drop(sink);
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(scheduler.entry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_drop_removes_entry() {
        let scheduler = PollScheduler::new();
        let (_cell, source) = ticking_source("depth");
        let handle = scheduler.schedule(&source, Duration::from_millis(100)).unwrap();

        drop(source);
        time::sleep(Duration::from_millis(150)).await;
        assert!(!handle.is_active());
        assert_eq!(scheduler.entry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_feed_the_same_task() {
        let scheduler = PollScheduler::new();
        let clone = scheduler.clone();
        let (_cell_a, a) = ticking_source("a");
        let (_cell_b, b) = ticking_source("b");
        let _ha = scheduler.schedule(&a, Duration::from_millis(100)).unwrap();
        let _hb = clone.schedule(&b, Duration::from_millis(100)).unwrap();

        assert_eq!(scheduler.entry_count(), 2);
        assert_eq!(clone.entry_count(), 2);
    }
}
