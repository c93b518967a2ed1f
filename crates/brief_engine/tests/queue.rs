mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use brief_core::{
    BriefMeta, BriefState, GenerationRequest, ItemId, ProgressEstimate, QueueStats, RowControl,
};
use brief_engine::{
    CreateBriefResponse, EngineError, GenerationQueue, QueueSettings, RemoteCaller, RemoteError,
    RemoteFailureKind, RetryHandle, ViewRenderer,
};
use common::{
    drain, init_logging, next_call, rejection, request, success, wait_for, MemoryCache,
    RecordingRenderer, Rendered, ScriptedCaller,
};
use pretty_assertions::assert_eq;

fn id(value: u64) -> ItemId {
    ItemId::from(value)
}

struct Harness {
    queue: GenerationQueue,
    caller: Arc<ScriptedCaller>,
    calls: tokio::sync::mpsc::UnboundedReceiver<ItemId>,
    renderer: Arc<RecordingRenderer>,
    events: tokio::sync::mpsc::UnboundedReceiver<Rendered>,
    cache: Arc<MemoryCache>,
}

fn harness() -> Harness {
    init_logging();
    let (caller, calls) = ScriptedCaller::new();
    let (renderer, events) = RecordingRenderer::new();
    let cache = Arc::new(MemoryCache::default());
    let queue = GenerationQueue::new(
        QueueSettings::default(),
        caller.clone(),
        renderer.clone(),
        cache.clone(),
    )
    .expect("inside runtime");
    Harness {
        queue,
        caller,
        calls,
        renderer,
        events,
        cache,
    }
}

#[tokio::test]
async fn four_submissions_run_two_and_queue_two() {
    let mut h = harness();
    for item in 1..=4 {
        assert!(h.queue.submit(request(item)));
    }

    assert_eq!(next_call(&mut h.calls).await, id(1));
    assert_eq!(next_call(&mut h.calls).await, id(2));
    assert_eq!(h.queue.brief_state(1u64), BriefState::Generating);
    assert_eq!(h.queue.brief_state("2"), BriefState::Generating);
    assert_eq!(h.queue.brief_state(3u64), BriefState::Queued);
    assert_eq!(h.queue.brief_state(4u64), BriefState::Queued);
    assert_eq!(h.queue.queue_position(3u64), 1);
    assert_eq!(h.queue.queue_position(4u64), 2);
    assert!(h.queue.progress().is_tracking(&id(1)));
    assert!(!h.queue.progress().is_tracking(&id(3)));
    assert!(h.calls.try_recv().is_err());
}

#[tokio::test]
async fn success_persists_and_backfills_from_queue_head() {
    let mut h = harness();
    for item in 1..=4 {
        h.queue.submit(request(item));
    }
    next_call(&mut h.calls).await;
    next_call(&mut h.calls).await;

    h.caller.resolve(1, Ok(success(&id(1))));
    wait_for(&mut h.events, |e| *e == Rendered::Generated(id(1))).await;

    assert_eq!(h.queue.brief_state(1u64), BriefState::Completed);
    assert_eq!(h.queue.brief_state(3u64), BriefState::Generating);
    assert_eq!(h.queue.queue_position(4u64), 1);
    assert_eq!(next_call(&mut h.calls).await, id(3));
    assert_eq!(h.cache.ids(), vec![id(1)]);
    assert_eq!(h.queue.row_control(1u64, true), RowControl::Generated);
    assert_eq!(h.queue.row_control(3u64, true), RowControl::Progress);
    assert_eq!(
        h.queue.row_control(4u64, false),
        RowControl::Queued { position: 1 }
    );
    assert!(!h.queue.progress().is_tracking(&id(1)));
    assert!(h.queue.progress().is_tracking(&id(3)));
}

#[tokio::test]
async fn domain_rejection_fails_row_and_retry_is_accepted() {
    let mut h = harness();
    h.queue.submit(request(1));
    h.queue.submit(request(2));
    next_call(&mut h.calls).await;
    next_call(&mut h.calls).await;

    h.caller.resolve(2, Ok(rejection("quota exceeded")));
    let seen = wait_for(&mut h.events, |e| *e == Rendered::Failed(id(2))).await;

    assert!(seen.contains(&Rendered::Error(id(2), "quota exceeded".to_string())));
    assert_eq!(h.queue.brief_state(2u64), BriefState::Failed);
    assert_eq!(h.queue.brief_state(1u64), BriefState::Generating);
    assert!(h.cache.ids().is_empty());
    assert_eq!(h.queue.row_control(2u64, false), RowControl::Retry);

    let handle = h.renderer.retry_handle(2).expect("retry control rendered");
    assert!(handle.retry());
    assert_eq!(h.queue.brief_state(2u64), BriefState::Generating);
    assert_eq!(next_call(&mut h.calls).await, id(2));

    // A second click while the retry is in flight is a duplicate.
    assert!(!handle.retry());
}

#[tokio::test]
async fn transport_error_is_a_failure_too() {
    let mut h = harness();
    h.queue.submit(request(9));
    next_call(&mut h.calls).await;

    h.caller.resolve(
        9,
        Err(RemoteError::new(RemoteFailureKind::HttpStatus(502), "bad gateway")),
    );
    let seen = wait_for(&mut h.events, |e| *e == Rendered::Failed(id(9))).await;

    assert!(seen
        .iter()
        .any(|e| matches!(e, Rendered::Error(item, msg) if *item == id(9) && msg.contains("502"))));
    assert_eq!(h.queue.brief_state(9u64), BriefState::Failed);
    assert!(h.queue.is_idle());
}

#[tokio::test]
async fn duplicate_submissions_are_rejected() {
    let mut h = harness();
    assert!(h.queue.submit(request(1)));
    assert!(h.queue.submit(request(2)));
    assert!(h.queue.submit(request(3)));

    assert!(!h.queue.submit(request(1)));
    assert!(!h.queue.submit(request(3)));
    assert!(!h.queue.submit(GenerationRequest::new("3", request(3).payload)));

    let stats = h.queue.stats();
    assert_eq!((stats.running, stats.queued), (2, 1));
    next_call(&mut h.calls).await;
    next_call(&mut h.calls).await;
}

#[tokio::test]
async fn reset_ignores_calls_that_settle_afterwards() {
    let mut h = harness();
    h.queue.submit(request(1));
    h.queue.submit(request(2));
    h.queue.submit(request(3));
    next_call(&mut h.calls).await;
    next_call(&mut h.calls).await;

    h.queue.reset();
    assert!(h.queue.is_idle());
    assert_eq!(h.queue.progress().tracked_count(), 0);
    drain(&mut h.events);

    h.caller.resolve(1, Ok(success(&id(1))));
    h.caller.resolve(2, Ok(rejection("late failure")));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.queue.stats().total, 0);
    assert_eq!(h.queue.brief_state(1u64), BriefState::Idle);
    assert_eq!(h.queue.brief_state(2u64), BriefState::Idle);
    assert!(h.cache.ids().is_empty());
    assert!(drain(&mut h.events).is_empty());
    assert!(h.calls.try_recv().is_err());
}

#[tokio::test]
async fn cleanup_forgets_history_but_keeps_in_flight_work() {
    let mut h = harness();
    h.queue.submit(request(1));
    h.queue.submit(request(2));
    next_call(&mut h.calls).await;
    next_call(&mut h.calls).await;
    h.caller.resolve(1, Ok(success(&id(1))));
    wait_for(&mut h.events, |e| *e == Rendered::Generated(id(1))).await;

    h.queue.cleanup();
    h.queue.cleanup();

    assert_eq!(h.queue.brief_state(1u64), BriefState::Idle);
    assert_eq!(h.queue.brief_state(2u64), BriefState::Generating);
    assert_eq!(h.queue.stats().total, 1);
}

#[tokio::test]
async fn hung_call_times_out_and_frees_its_slot() {
    init_logging();
    struct HangingCaller;

    #[async_trait::async_trait]
    impl RemoteCaller for HangingCaller {
        async fn create_brief(
            &self,
            _request: &GenerationRequest,
        ) -> Result<CreateBriefResponse, RemoteError> {
            std::future::pending().await
        }
    }

    let (renderer, mut events) = RecordingRenderer::new();
    let settings = QueueSettings {
        call_timeout: Duration::from_millis(50),
        ..QueueSettings::default()
    };
    let queue = GenerationQueue::new(
        settings,
        Arc::new(HangingCaller),
        renderer,
        Arc::new(MemoryCache::default()),
    )
    .expect("inside runtime");

    queue.submit(request(1));
    let seen = wait_for(&mut events, |e| *e == Rendered::Failed(id(1))).await;

    assert!(seen
        .iter()
        .any(|e| matches!(e, Rendered::Error(_, msg) if msg.contains("timed out"))));
    assert!(queue.is_idle());
}

#[tokio::test]
async fn panicking_caller_fails_only_its_own_job() {
    init_logging();
    struct PickyCaller;

    #[async_trait::async_trait]
    impl RemoteCaller for PickyCaller {
        async fn create_brief(
            &self,
            request: &GenerationRequest,
        ) -> Result<CreateBriefResponse, RemoteError> {
            if request.item_id.as_str() == "13" {
                panic!("unlucky page");
            }
            Ok(success(&request.item_id))
        }
    }

    let (renderer, _events) = RecordingRenderer::new();
    let queue = GenerationQueue::new(
        QueueSettings::default(),
        Arc::new(PickyCaller),
        renderer,
        Arc::new(MemoryCache::default()),
    )
    .expect("inside runtime");

    for item in [12, 13, 14] {
        queue.submit(request(item));
    }
    tokio::time::timeout(Duration::from_secs(5), queue.wait_idle())
        .await
        .expect("queue drained");

    assert_eq!(queue.brief_state(12u64), BriefState::Completed);
    assert_eq!(queue.brief_state(13u64), BriefState::Failed);
    assert_eq!(queue.brief_state(14u64), BriefState::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_flight_calls_never_exceed_the_cap() {
    init_logging();
    struct CountingCaller {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl RemoteCaller for CountingCaller {
        async fn create_brief(
            &self,
            request: &GenerationRequest,
        ) -> Result<CreateBriefResponse, RemoteError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(success(&request.item_id))
        }
    }

    let caller = Arc::new(CountingCaller {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
    });
    let cache = Arc::new(MemoryCache::default());
    let (renderer, _events) = RecordingRenderer::new();
    let queue = GenerationQueue::new(
        QueueSettings::default(),
        caller.clone(),
        renderer,
        cache.clone(),
    )
    .expect("inside runtime");

    for item in 0..12 {
        assert!(queue.submit(request(item)));
        assert!(queue.stats().running <= 2);
    }
    tokio::time::timeout(Duration::from_secs(10), queue.wait_idle())
        .await
        .expect("queue drained");

    assert!(caller.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(queue.stats().completed, 12);
    assert_eq!(cache.ids().len(), 12);
}

#[test]
fn construction_outside_runtime_is_an_error() {
    let (caller, _calls) = ScriptedCaller::new();
    let (renderer, _events) = RecordingRenderer::new();
    let result = GenerationQueue::new(
        QueueSettings::default(),
        caller,
        renderer,
        Arc::new(MemoryCache::default()),
    );
    assert!(matches!(result, Err(EngineError::NoRuntime)));
}

#[tokio::test]
async fn retry_from_inside_the_renderer_keeps_rendered_stats_current() {
    init_logging();

    /// Clicks retry the moment a failed row is rendered.
    struct RetryOnFailure {
        inner: Arc<RecordingRenderer>,
        retried: AtomicBool,
    }

    impl ViewRenderer for RetryOnFailure {
        fn render_queued(&self, item_id: &ItemId, position: usize) {
            self.inner.render_queued(item_id, position);
        }

        fn render_generating(&self, item_id: &ItemId) {
            self.inner.render_generating(item_id);
        }

        fn render_generated(&self, item_id: &ItemId, brief: &BriefMeta) {
            self.inner.render_generated(item_id, brief);
        }

        fn render_failed(&self, item_id: &ItemId, retry: RetryHandle) {
            self.inner.render_failed(item_id, retry.clone());
            if !self.retried.swap(true, Ordering::SeqCst) {
                assert!(retry.retry());
            }
        }

        fn update_progress(&self, item_id: &ItemId, estimate: &ProgressEstimate) {
            self.inner.update_progress(item_id, estimate);
        }

        fn notify_error(&self, item_id: &ItemId, message: &str) {
            self.inner.notify_error(item_id, message);
        }

        fn render_stats(&self, stats: &QueueStats) {
            self.inner.render_stats(stats);
        }
    }

    let (caller, mut calls) = ScriptedCaller::new();
    let (recorder, mut events) = RecordingRenderer::new();
    let renderer = Arc::new(RetryOnFailure {
        inner: recorder,
        retried: AtomicBool::new(false),
    });
    let queue = GenerationQueue::new(
        QueueSettings::default(),
        caller.clone(),
        renderer,
        Arc::new(MemoryCache::default()),
    )
    .expect("inside runtime");

    for item in 1..=3 {
        queue.submit(request(item));
    }
    next_call(&mut calls).await;
    next_call(&mut calls).await;
    drain(&mut events);

    caller.resolve(2, Ok(rejection("validation failed")));
    let mut seen = wait_for(&mut events, |e| {
        matches!(e, Rendered::Queued(item, _) if *item == id(2))
    })
    .await;
    seen.extend(drain(&mut events));

    assert_eq!(queue.brief_state(2u64), BriefState::Queued);
    assert_eq!(queue.queue_position(2u64), 1);
    assert_eq!(queue.brief_state(3u64), BriefState::Generating);

    let last_stats = seen
        .iter()
        .rev()
        .find_map(|e| match e {
            Rendered::Stats(stats) => Some(*stats),
            _ => None,
        })
        .expect("stats rendered");
    assert_eq!(last_stats, queue.stats());
    assert_eq!(last_stats.queued, 1);
    assert_eq!(last_stats.total, 4);

    // The retry's row update comes after everything the failure produced.
    let failed_at = seen
        .iter()
        .position(|e| *e == Rendered::Failed(id(2)))
        .unwrap();
    let generating_3 = seen
        .iter()
        .position(|e| *e == Rendered::Generating(id(3)))
        .unwrap();
    let requeued_at = seen
        .iter()
        .position(|e| matches!(e, Rendered::Queued(item, _) if *item == id(2)))
        .unwrap();
    assert!(failed_at < generating_3 && generating_3 < requeued_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reset_and_resubmit_leave_running_items_tracked() {
    init_logging();
    struct SilentCaller;

    #[async_trait::async_trait]
    impl RemoteCaller for SilentCaller {
        async fn create_brief(
            &self,
            _request: &GenerationRequest,
        ) -> Result<CreateBriefResponse, RemoteError> {
            std::future::pending().await
        }
    }

    let (renderer, _events) = RecordingRenderer::new();
    let queue = GenerationQueue::new(
        QueueSettings::default(),
        Arc::new(SilentCaller),
        renderer,
        Arc::new(MemoryCache::default()),
    )
    .expect("inside runtime");

    for _ in 0..200 {
        queue.submit(request(1));
        let resetter = {
            let queue = queue.clone();
            tokio::task::spawn_blocking(move || queue.reset())
        };
        let submitter = {
            let queue = queue.clone();
            tokio::task::spawn_blocking(move || queue.submit(request(1)))
        };
        resetter.await.unwrap();
        submitter.await.unwrap();

        for running in queue.running_ids() {
            assert!(queue.progress().is_tracking(&running));
        }
        if queue.running_ids().is_empty() {
            assert_eq!(queue.progress().tracked_count(), 0);
        }
        queue.reset();
    }
}
