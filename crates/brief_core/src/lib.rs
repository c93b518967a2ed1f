//! Brief core: pure queue state machine, progress arithmetic and view-model helpers.
mod effect;
mod id;
mod msg;
mod progress;
mod request;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use id::{normalize_item_id, ItemId};
pub use msg::Msg;
pub use progress::{
    ProgressEstimate, ProgressThresholds, Severity, DANGER_AFTER, ESTIMATED_DURATION,
    TICK_INTERVAL,
};
pub use request::{BriefMeta, BriefPayload, GenerationRequest, JobOutcome};
pub use state::{
    Admission, BriefState, EntryState, JobTicket, QueueEntry, QueueState, Settlement,
    SubmitOutcome, DEFAULT_MAX_CONCURRENT,
};
pub use update::update;
pub use view_model::{row_control, QueueStats, RowControl};
