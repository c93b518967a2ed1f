use crate::{BriefMeta, GenerationRequest, ItemId, JobTicket, QueueStats};

/// Work the host must perform after a state transition, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    RenderQueued {
        item_id: ItemId,
        position: usize,
    },
    RenderGenerating {
        item_id: ItemId,
    },
    StartProgress {
        item_id: ItemId,
        label: String,
    },
    CallRemote {
        ticket: JobTicket,
        request: GenerationRequest,
    },
    StopProgress {
        item_id: ItemId,
    },
    PersistGenerated {
        item_id: ItemId,
        brief: BriefMeta,
    },
    RenderGenerated {
        item_id: ItemId,
        brief: BriefMeta,
    },
    NotifyError {
        item_id: ItemId,
        message: String,
    },
    /// `retry` is the request a retry control resubmits.
    RenderFailed {
        item_id: ItemId,
        retry: GenerationRequest,
    },
    StatsChanged(QueueStats),
}
