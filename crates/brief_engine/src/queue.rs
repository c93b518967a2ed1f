use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::SystemTime;

use brief_core::{
    update, BriefState, Effect, GenerationRequest, ItemId, JobOutcome, JobTicket, Msg,
    ProgressEstimate, QueueState, QueueStats, RowControl,
};
use brief_logging::{brief_debug, brief_error, brief_info, brief_warn};
use tokio::runtime::Handle;
use tokio::sync::Notify;

use crate::{
    interpret_response, CacheStore, EngineError, ProgressEstimator, ProgressSink, QueueSettings,
    RemoteCaller, ViewRenderer,
};

/// Bounded-concurrency scheduler for brief generation.
///
/// All bookkeeping lives in a [`QueueState`] behind one mutex and only moves
/// through [`brief_core::update`]. Effects are queued in the order their
/// updates happened and executed by a single drainer after the lock is
/// released, so collaborators may call back into the queue.
#[derive(Clone)]
pub struct GenerationQueue {
    shared: Arc<Shared>,
}

struct Shared {
    state: Mutex<QueueState>,
    settings: QueueSettings,
    caller: Arc<dyn RemoteCaller>,
    renderer: Arc<dyn ViewRenderer>,
    cache: Arc<dyn CacheStore>,
    progress: ProgressEstimator,
    runtime: Handle,
    outbox: Mutex<Outbox>,
    idle: Notify,
}

/// Effects waiting to run. Only the caller that finds `draining` unset runs
/// them; everyone else just appends.
#[derive(Default)]
struct Outbox {
    effects: VecDeque<Effect>,
    draining: bool,
}

struct RendererSink(Arc<dyn ViewRenderer>);

impl ProgressSink for RendererSink {
    fn emit(&self, item_id: &ItemId, estimate: &ProgressEstimate) {
        self.0.update_progress(item_id, estimate);
    }
}

impl GenerationQueue {
    /// Builds a queue on the current tokio runtime.
    pub fn new(
        settings: QueueSettings,
        caller: Arc<dyn RemoteCaller>,
        renderer: Arc<dyn ViewRenderer>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        Ok(Self::with_runtime(settings, caller, renderer, cache, runtime))
    }

    pub fn with_runtime(
        settings: QueueSettings,
        caller: Arc<dyn RemoteCaller>,
        renderer: Arc<dyn ViewRenderer>,
        cache: Arc<dyn CacheStore>,
        runtime: Handle,
    ) -> Self {
        let progress = ProgressEstimator::new(
            Arc::new(RendererSink(Arc::clone(&renderer))),
            settings.thresholds,
            settings.tick_interval,
            runtime.clone(),
        );
        let shared = Shared {
            state: Mutex::new(QueueState::new(settings.max_concurrent)),
            settings,
            caller,
            renderer,
            cache,
            progress,
            runtime,
            outbox: Mutex::new(Outbox::default()),
            idle: Notify::new(),
        };
        Self {
            shared: Arc::new(shared),
        }
    }

    /// Returns false when the id is empty or already queued or running.
    pub fn submit(&self, request: GenerationRequest) -> bool {
        self.shared.submit(request)
    }

    pub fn brief_state(&self, item_id: impl Into<ItemId>) -> BriefState {
        self.shared.lock_state().brief_state(item_id)
    }

    pub fn queue_position(&self, item_id: impl Into<ItemId>) -> usize {
        self.shared.lock_state().queue_position(item_id)
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.lock_state().stats()
    }

    /// Control a page row should show, given whether a brief already exists.
    pub fn row_control(&self, item_id: impl Into<ItemId>, has_generated_brief: bool) -> RowControl {
        brief_core::row_control(&self.shared.lock_state(), item_id, has_generated_brief)
    }

    pub fn running_ids(&self) -> Vec<ItemId> {
        self.shared.lock_state().running_ids()
    }

    pub fn queued_ids(&self) -> Vec<ItemId> {
        self.shared.lock_state().queued_ids()
    }

    pub fn is_idle(&self) -> bool {
        self.shared.lock_state().is_idle()
    }

    /// Forgets completed and failed ids without touching in-flight work.
    pub fn cleanup(&self) {
        self.shared.apply(Msg::Cleanup);
    }

    /// Clears every set. Outstanding calls are not cancelled; they settle
    /// later against the cleared state and are ignored.
    pub fn reset(&self) {
        brief_info!("resetting generation queue");
        self.shared.apply(Msg::Reset);
    }

    pub fn progress(&self) -> &ProgressEstimator {
        &self.shared.progress
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.shared.settings
    }

    /// Resolves once nothing is running or queued.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn submit(self: &Arc<Self>, request: GenerationRequest) -> bool {
        let item_id = request.item_id.clone();
        match self.apply(Msg::Submit {
            request,
            at: SystemTime::now(),
        }) {
            Some(position) => {
                brief_info!("brief {} accepted at queue position {}", item_id, position);
                true
            }
            None => {
                brief_info!("brief {} already queued or running; rejected", item_id);
                false
            }
        }
    }

    /// Runs one message through the core and queues its effects.
    ///
    /// Returns the queue position when the message enqueued an item.
    fn apply(self: &Arc<Self>, msg: Msg) -> Option<usize> {
        let settling = match &msg {
            Msg::Settled { item_id, ticket, .. } => Some((item_id.clone(), *ticket)),
            _ => None,
        };

        let (queued_at, stale) = {
            let mut guard = self.lock_state();
            let (next, effects) = update(std::mem::take(&mut *guard), msg);
            *guard = next;
            let queued_at = effects.iter().find_map(|effect| match effect {
                Effect::RenderQueued { position, .. } => Some(*position),
                _ => None,
            });
            let stale = effects.is_empty();
            // Appended under the state lock so effect order matches update order.
            self.lock_outbox().effects.extend(effects);
            (queued_at, stale)
        };

        if let Some((item_id, ticket)) = settling.filter(|_| stale) {
            brief_debug!("ignoring stale settle for {} (ticket {})", item_id, ticket);
        }
        self.drain();
        queued_at
    }

    /// Executes queued effects until none are left, unless another caller
    /// is already doing so. Nested calls from collaborators return at once
    /// and their effects run after the ones already queued.
    fn drain(self: &Arc<Self>) {
        {
            let mut outbox = self.lock_outbox();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let _release = DrainGuard(self.as_ref());
        loop {
            let next = {
                let mut outbox = self.lock_outbox();
                let next = outbox.effects.pop_front();
                if next.is_none() {
                    outbox.draining = false;
                }
                next
            };
            match next {
                Some(effect) => self.run_effect(effect),
                None => break,
            }
        }
        if self.lock_state().is_idle() {
            self.idle.notify_waiters();
        }
    }

    fn run_effect(self: &Arc<Self>, effect: Effect) {
        match effect {
            Effect::RenderQueued { item_id, position } => {
                self.renderer.render_queued(&item_id, position);
            }
            Effect::RenderGenerating { item_id } => {
                self.renderer.render_generating(&item_id);
            }
            Effect::StartProgress { item_id, label } => {
                self.progress.start(&item_id, &label);
            }
            Effect::CallRemote { ticket, request } => {
                let running = self.lock_state().running_count();
                brief_info!(
                    "starting brief {} ({}/{})",
                    request.item_id,
                    running,
                    self.settings.max_concurrent
                );
                self.spawn_call(ticket, request);
            }
            Effect::StopProgress { item_id } => {
                self.progress.stop(&item_id);
            }
            Effect::PersistGenerated { item_id, brief } => {
                if let Err(err) = self.cache.persist_generated(&item_id, &brief) {
                    brief_error!("failed to cache generated brief {}: {}", item_id, err);
                }
            }
            Effect::RenderGenerated { item_id, brief } => {
                brief_info!("brief {} generated", item_id);
                self.renderer.render_generated(&item_id, &brief);
            }
            Effect::NotifyError { item_id, message } => {
                brief_warn!("brief {} failed: {}", item_id, message);
                self.renderer.notify_error(&item_id, &message);
            }
            Effect::RenderFailed { item_id, retry } => {
                let handle = RetryHandle {
                    queue: Arc::downgrade(self),
                    request: retry,
                };
                self.renderer.render_failed(&item_id, handle);
            }
            Effect::StatsChanged(stats) => {
                self.renderer.render_stats(&stats);
            }
        }
    }

    fn spawn_call(self: &Arc<Self>, ticket: JobTicket, request: GenerationRequest) {
        let shared = Arc::clone(self);
        self.runtime.spawn(async move {
            let item_id = request.item_id.clone();
            let outcome = shared.call_remote(request).await;
            shared.apply(Msg::Settled {
                ticket,
                item_id,
                outcome,
                at: SystemTime::now(),
            });
        });
    }

    /// The call runs in its own task so a panic or a hang in the caller
    /// still settles this job and nothing else.
    async fn call_remote(&self, request: GenerationRequest) -> JobOutcome {
        let caller = Arc::clone(&self.caller);
        let mut call = self
            .runtime
            .spawn(async move { caller.create_brief(&request).await });
        match tokio::time::timeout(self.settings.call_timeout, &mut call).await {
            Ok(Ok(result)) => interpret_response(result),
            Ok(Err(join_err)) => {
                JobOutcome::failed(format!("brief generation aborted: {join_err}"))
            }
            Err(_) => {
                call.abort();
                JobOutcome::failed(format!(
                    "brief generation timed out after {}s",
                    self.settings.call_timeout.as_secs()
                ))
            }
        }
    }
}

/// Clears the draining flag if an effect panics, so later updates can still
/// drain.
struct DrainGuard<'a>(&'a Shared);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock_outbox().draining = false;
        }
    }
}

/// Resubmits a failed request through the normal submission path.
#[derive(Clone)]
pub struct RetryHandle {
    queue: Weak<Shared>,
    request: GenerationRequest,
}

impl RetryHandle {
    pub fn item_id(&self) -> &ItemId {
        &self.request.item_id
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    /// Same rules as any submission; false if the queue is gone.
    pub fn retry(&self) -> bool {
        match self.queue.upgrade() {
            Some(shared) => shared.submit(self.request.resubmitted()),
            None => {
                brief_warn!("retry of {} dropped: queue no longer exists", self.item_id());
                false
            }
        }
    }
}

impl fmt::Debug for RetryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandle")
            .field("item_id", &self.request.item_id)
            .finish_non_exhaustive()
    }
}
