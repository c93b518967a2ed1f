//! Brief engine: drives the core queue on tokio and talks to the outside world.
mod cache;
mod progress;
mod queue;
mod remote;
mod render;
mod settings;
mod types;

pub use cache::{ensure_cache_dir, AtomicFileWriter, CacheStore, CachedBrief, FileCacheStore};
pub use progress::{ProgressEstimator, ProgressSink};
pub use queue::{GenerationQueue, RetryHandle};
pub use remote::{
    interpret_response, CreateBriefBody, CreateBriefData, CreateBriefResponse, HttpBriefCaller,
    RemoteCaller,
};
pub use render::ViewRenderer;
pub use settings::{ClientSettings, QueueSettings};
pub use types::{CacheError, EngineError, RemoteError, RemoteFailureKind};
