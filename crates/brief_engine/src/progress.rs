use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use brief_core::{ItemId, ProgressEstimate, ProgressThresholds};
use brief_logging::brief_debug;
use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Receives periodic progress estimates for running items.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, item_id: &ItemId, estimate: &ProgressEstimate);
}

struct Tracker {
    started: Instant,
    label: String,
    cancel: CancellationToken,
}

/// Per-item tick tasks that turn elapsed time into a progress signal.
///
/// Purely cosmetic: the queue starts and stops trackers but never asks them
/// anything before deciding what to admit.
pub struct ProgressEstimator {
    sink: Arc<dyn ProgressSink>,
    thresholds: ProgressThresholds,
    tick_interval: Duration,
    runtime: Handle,
    trackers: Mutex<HashMap<ItemId, Tracker>>,
}

impl ProgressEstimator {
    pub fn new(
        sink: Arc<dyn ProgressSink>,
        thresholds: ProgressThresholds,
        tick_interval: Duration,
        runtime: Handle,
    ) -> Self {
        Self {
            sink,
            thresholds,
            tick_interval: tick_interval.max(Duration::from_millis(1)),
            runtime,
            trackers: Mutex::new(HashMap::new()),
        }
    }

    /// Starts tracking `item_id`, replacing any tracker it already had.
    pub fn start(&self, item_id: &ItemId, label: &str) {
        let started = Instant::now();
        let cancel = CancellationToken::new();
        let previous = self.lock_trackers().insert(
            item_id.clone(),
            Tracker {
                started,
                label: label.to_string(),
                cancel: cancel.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
        brief_debug!("progress started for {} ({})", item_id, label);

        let sink = Arc::clone(&self.sink);
        let thresholds = self.thresholds;
        let period = self.tick_interval;
        let item_id = item_id.clone();
        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(started + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        sink.emit(&item_id, &thresholds.estimate(started.elapsed()));
                    }
                }
            }
        });
    }

    /// Stops and discards the tracker. Unknown ids are a no-op.
    pub fn stop(&self, item_id: &ItemId) -> bool {
        let Some(tracker) = self.lock_trackers().remove(item_id) else {
            return false;
        };
        tracker.cancel.cancel();
        brief_debug!(
            "progress stopped for {} ({}) after {:?}",
            item_id,
            tracker.label,
            tracker.started.elapsed()
        );
        true
    }

    pub fn stop_all(&self) {
        for (_, tracker) in self.lock_trackers().drain() {
            tracker.cancel.cancel();
        }
    }

    pub fn is_tracking(&self, item_id: &ItemId) -> bool {
        self.lock_trackers().contains_key(item_id)
    }

    /// Current estimate, computed on demand rather than from the last tick.
    pub fn estimate(&self, item_id: &ItemId) -> Option<ProgressEstimate> {
        self.lock_trackers()
            .get(item_id)
            .map(|tracker| self.thresholds.estimate(tracker.started.elapsed()))
    }

    pub fn tracked_count(&self) -> usize {
        self.lock_trackers().len()
    }

    fn lock_trackers(&self) -> MutexGuard<'_, HashMap<ItemId, Tracker>> {
        self.trackers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ProgressEstimator {
    fn drop(&mut self) {
        self.stop_all();
    }
}
