//! Pull-to-push adapter polling its source on a background task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use meterkit_core::timing::realign;
use meterkit_core::{
    Measure, MeasureError, MeasureListener, PullMeasure, PushMeasure, Result, SimplePushMeasure,
};

use crate::id::AdapterId;

/// A push measure that checks a pull source periodically and notifies
/// listeners when the observed value changes.
///
/// One tokio task per adapter runs the checks. The task holds only `Weak`
/// references to the source and to the output fan-out, so it ends on its
/// own once either side is dropped; the caller is responsible for keeping
/// the source alive for as long as notifications are wanted. [`stop`]
/// (PushFromPull::stop) ends the task explicitly, and dropping the adapter
/// stops it unless [`detach`](PushFromPull::detach) was called first.
///
/// Values the source takes between two checks are never observed. A check
/// that consumes more than one period drops the missed ticks instead of
/// replaying them, logging the lag once.
pub struct PushFromPull<V> {
    id: AdapterId,
    period: Duration,
    fanout: Arc<SimplePushMeasure<V>>,
    stop: watch::Sender<bool>,
    stop_on_drop: AtomicBool,
    terminated: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<V> std::fmt::Debug for PushFromPull<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushFromPull")
            .field("id", &self.id)
            .field("period", &self.period)
            .finish_non_exhaustive()
    }
}

impl<V> PushFromPull<V>
where
    V: PartialEq + Send + 'static,
{
    /// Start polling `source` every `period`.
    ///
    /// The value read at construction becomes the comparison baseline, so
    /// the first check only notifies if the value changed since then. Must
    /// be called from within a tokio runtime.
    pub fn new(source: &Arc<dyn PullMeasure<V>>, period: Duration) -> Result<Self> {
        if period.is_zero() {
            return Err(MeasureError::InvalidPeriod { period });
        }
        let id = AdapterId::new();
        let fanout = Arc::new(SimplePushMeasure::new(source.name(), source.description()));
        let baseline = match source.get() {
            Ok(value) => Some(value),
            Err(error) => {
                warn!("Polling adapter {} failed its baseline read: {}", id, error);
                None
            }
        };
        let (stop, stop_rx) = watch::channel(false);
        let terminated = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(poll_loop(
            id,
            period,
            Arc::downgrade(source),
            Arc::downgrade(&fanout),
            baseline,
            stop_rx,
            Arc::clone(&terminated),
        ));
        debug!("Polling adapter {} checks '{}' every {:?}", id, fanout.name(), period);
        Ok(Self {
            id,
            period,
            fanout,
            stop,
            stop_on_drop: AtomicBool::new(true),
            terminated,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Identifier carried in this adapter's log lines.
    pub fn id(&self) -> AdapterId {
        self.id
    }

    /// The polling period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// End the polling task. Idempotent; listeners receive nothing more.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Whether the polling task has ended, for any reason.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Disarm stop-on-drop and hand out the fan-out measure.
    ///
    /// After this call the task keeps running once the adapter handle is
    /// dropped, for as long as both the returned measure and the source
    /// stay alive.
    pub fn detach(&self) -> Arc<SimplePushMeasure<V>> {
        self.stop_on_drop.store(false, Ordering::SeqCst);
        Arc::clone(&self.fanout)
    }

    /// Wait for the polling task to end.
    pub async fn join(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl<V> Measure for PushFromPull<V>
where
    V: PartialEq + Send + 'static,
{
    fn name(&self) -> &str {
        self.fanout.name()
    }

    fn description(&self) -> &str {
        self.fanout.description()
    }
}

impl<V> PushMeasure<V> for PushFromPull<V>
where
    V: PartialEq + Send + 'static,
{
    fn register(&self, listener: Arc<dyn MeasureListener<V>>) {
        self.fanout.register(listener);
    }

    fn unregister(&self, listener: &Arc<dyn MeasureListener<V>>) {
        self.fanout.unregister(listener);
    }
}

impl<V> Drop for PushFromPull<V> {
    fn drop(&mut self) {
        if self.stop_on_drop.load(Ordering::SeqCst) {
            let _ = self.stop.send(true);
        }
    }
}

async fn poll_loop<V>(
    id: AdapterId,
    period: Duration,
    source: Weak<dyn PullMeasure<V>>,
    sink: Weak<SimplePushMeasure<V>>,
    mut last: Option<V>,
    mut stop_rx: watch::Receiver<bool>,
    terminated: Arc<AtomicBool>,
) where
    V: PartialEq + Send + 'static,
{
    let mut next_due = Instant::now() + period;
    let mut stop_armed = true;
    loop {
        tokio::select! {
            changed = stop_rx.changed(), if stop_armed => match changed {
                Ok(()) => {
                    if *stop_rx.borrow_and_update() {
                        debug!("Polling adapter {} stopped", id);
                        break;
                    }
                }
                // Sender gone without a stop: the handle detached and the
                // loop runs on weak reachability alone.
                Err(_) => stop_armed = false,
            },
            _ = time::sleep_until(next_due) => {
                let (source, sink) = match (source.upgrade(), sink.upgrade()) {
                    (Some(source), Some(sink)) => (source, sink),
                    _ => {
                        debug!("Polling adapter {} lost its source or sink", id);
                        break;
                    }
                };
                let started = Instant::now();
                match source.get() {
                    Ok(value) => {
                        if last.as_ref() != Some(&value) {
                            sink.push(&value);
                            last = Some(value);
                        }
                    }
                    Err(error) => {
                        warn!("Polling adapter {} skipped a check: {}", id, error);
                    }
                }
                drop(source);
                drop(sink);
                let consumed = started.elapsed();
                if consumed >= period {
                    let (remainder, missed) = realign(consumed, period);
                    warn!(
                        "Polling adapter {} consumed {:?} of a {:?} period, dropping {} tick(s)",
                        id, consumed, period, missed
                    );
                    next_due = Instant::now() + (period - remainder);
                } else {
                    next_due = Instant::now() + (period - consumed);
                }
            }
        }
    }
    terminated.store(true, Ordering::SeqCst);
}
