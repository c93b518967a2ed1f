#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use brief_core::{BriefMeta, BriefPayload, GenerationRequest, ItemId, ProgressEstimate, QueueStats};
use brief_engine::{
    CacheError, CacheStore, CreateBriefData, CreateBriefResponse, RemoteCaller, RemoteError,
    RemoteFailureKind, RetryHandle, ViewRenderer,
};
use tokio::sync::{mpsc, oneshot};

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(brief_logging::initialize_for_tests);
}

pub fn request(id: u64) -> GenerationRequest {
    GenerationRequest::new(
        id,
        BriefPayload {
            title: format!("Page {id}"),
            url: format!("https://example.com/page-{id}"),
            template: "page".to_string(),
            ..BriefPayload::default()
        },
    )
}

pub fn success(id: &ItemId) -> CreateBriefResponse {
    CreateBriefResponse {
        success: true,
        data: Some(CreateBriefData {
            brief: Some(BriefMeta {
                page_id: Some(id.clone()),
                status: Some("generated".to_string()),
                ..BriefMeta::default()
            }),
        }),
        error: None,
    }
}

pub fn rejection(message: &str) -> CreateBriefResponse {
    CreateBriefResponse {
        success: false,
        data: None,
        error: Some(message.to_string()),
    }
}

type Reply = Result<CreateBriefResponse, RemoteError>;

/// Remote caller whose calls stay outstanding until the test resolves them.
pub struct ScriptedCaller {
    pending: Mutex<HashMap<ItemId, oneshot::Sender<Reply>>>,
    started: mpsc::UnboundedSender<ItemId>,
}

impl ScriptedCaller {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ItemId>) {
        let (started, rx) = mpsc::unbounded_channel();
        let caller = Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
            started,
        });
        (caller, rx)
    }

    pub fn resolve(&self, id: u64, reply: Reply) {
        let sender = self
            .pending
            .lock()
            .unwrap()
            .remove(&ItemId::from(id))
            .expect("call is outstanding");
        let _ = sender.send(reply);
    }
}

#[async_trait::async_trait]
impl RemoteCaller for ScriptedCaller {
    async fn create_brief(&self, request: &GenerationRequest) -> Reply {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .unwrap()
            .insert(request.item_id.clone(), tx);
        let _ = self.started.send(request.item_id.clone());
        rx.await
            .unwrap_or_else(|_| Err(RemoteError::new(RemoteFailureKind::Network, "dropped")))
    }
}

pub async fn next_call(rx: &mut mpsc::UnboundedReceiver<ItemId>) -> ItemId {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("remote call started in time")
        .expect("caller alive")
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Queued(ItemId, usize),
    Generating(ItemId),
    Generated(ItemId),
    Failed(ItemId),
    Error(ItemId, String),
    Progress(ItemId, ProgressEstimate),
    Stats(QueueStats),
}

pub struct RecordingRenderer {
    events: mpsc::UnboundedSender<Rendered>,
    retries: Mutex<Vec<RetryHandle>>,
}

impl RecordingRenderer {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Rendered>) {
        let (events, rx) = mpsc::unbounded_channel();
        let renderer = Arc::new(Self {
            events,
            retries: Mutex::new(Vec::new()),
        });
        (renderer, rx)
    }

    pub fn retry_handle(&self, id: u64) -> Option<RetryHandle> {
        let id = ItemId::from(id);
        self.retries
            .lock()
            .unwrap()
            .iter()
            .find(|handle| handle.item_id() == &id)
            .cloned()
    }

    fn push(&self, event: Rendered) {
        let _ = self.events.send(event);
    }
}

impl ViewRenderer for RecordingRenderer {
    fn render_queued(&self, item_id: &ItemId, position: usize) {
        self.push(Rendered::Queued(item_id.clone(), position));
    }

    fn render_generating(&self, item_id: &ItemId) {
        self.push(Rendered::Generating(item_id.clone()));
    }

    fn render_generated(&self, item_id: &ItemId, _brief: &BriefMeta) {
        self.push(Rendered::Generated(item_id.clone()));
    }

    fn render_failed(&self, item_id: &ItemId, retry: RetryHandle) {
        self.retries.lock().unwrap().push(retry);
        self.push(Rendered::Failed(item_id.clone()));
    }

    fn update_progress(&self, item_id: &ItemId, estimate: &ProgressEstimate) {
        self.push(Rendered::Progress(item_id.clone(), *estimate));
    }

    fn notify_error(&self, item_id: &ItemId, message: &str) {
        self.push(Rendered::Error(item_id.clone(), message.to_string()));
    }

    fn render_stats(&self, stats: &QueueStats) {
        self.push(Rendered::Stats(*stats));
    }
}

/// Waits for the first event matching `want`, returning everything seen.
pub async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<Rendered>,
    want: impl Fn(&Rendered) -> bool,
) -> Vec<Rendered> {
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("render event in time")
            .expect("renderer alive");
        let done = want(&event);
        seen.push(event);
        if done {
            return seen;
        }
    }
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<Rendered>) -> Vec<Rendered> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }
    seen
}

#[derive(Default)]
pub struct MemoryCache {
    pub written: Mutex<Vec<(ItemId, BriefMeta)>>,
}

impl MemoryCache {
    pub fn ids(&self) -> Vec<ItemId> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl CacheStore for MemoryCache {
    fn persist_generated(&self, item_id: &ItemId, brief: &BriefMeta) -> Result<(), CacheError> {
        self.written
            .lock()
            .unwrap()
            .push((item_id.clone(), brief.clone()));
        Ok(())
    }
}
