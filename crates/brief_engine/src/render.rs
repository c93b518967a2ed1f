use brief_core::{BriefMeta, ItemId, ProgressEstimate, QueueStats};

use crate::RetryHandle;

/// Push-only presentation sink. The queue never reads anything back.
///
/// Implementations are called outside the queue lock, so calling back into
/// the queue (for instance `RetryHandle::retry`) from here is allowed.
pub trait ViewRenderer: Send + Sync {
    fn render_queued(&self, item_id: &ItemId, position: usize);

    fn render_generating(&self, item_id: &ItemId);

    fn render_generated(&self, item_id: &ItemId, brief: &BriefMeta);

    fn render_failed(&self, item_id: &ItemId, retry: RetryHandle);

    fn update_progress(&self, item_id: &ItemId, estimate: &ProgressEstimate);

    /// User-visible error notification for a failed generation.
    fn notify_error(&self, item_id: &ItemId, message: &str);

    fn render_stats(&self, _stats: &QueueStats) {}
}
