use crate::{BriefState, ItemId, QueueState};

/// Counters behind the global queue indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub running: usize,
    pub queued: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub max_concurrent: usize,
}

impl QueueStats {
    pub fn new(
        running: usize,
        queued: usize,
        completed: usize,
        failed: usize,
        max_concurrent: usize,
    ) -> Self {
        Self {
            running,
            queued,
            completed,
            failed,
            total: running + queued + completed + failed,
            max_concurrent,
        }
    }

    /// Lines of the floating indicator; empty when nothing is in flight.
    pub fn indicator_lines(&self) -> Vec<String> {
        if self.running == 0 && self.queued == 0 {
            return Vec::new();
        }
        let mut lines = vec!["Brief generation".to_string()];
        if self.running > 0 {
            lines.push(format!("running {}/{}", self.running, self.max_concurrent));
        }
        if self.queued > 0 {
            lines.push(format!("queued {}", self.queued));
        }
        if self.completed > 0 {
            lines.push(format!("completed {}", self.completed));
        }
        if self.failed > 0 {
            lines.push(format!("failed {}", self.failed));
        }
        lines
    }
}

/// Control a page row should offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowControl {
    Generate,
    Queued { position: usize },
    Progress,
    /// Read/download/regenerate actions for an existing brief.
    Generated,
    Retry,
}

/// Picks the row control. In-flight state wins over a brief the backend
/// already knows about, so regenerating a page shows its progress.
pub fn row_control(
    state: &QueueState,
    item_id: impl Into<ItemId>,
    has_generated_brief: bool,
) -> RowControl {
    let item_id = item_id.into();
    match state.brief_state(&item_id) {
        BriefState::Generating => RowControl::Progress,
        BriefState::Queued => RowControl::Queued {
            position: state.queue_position(&item_id),
        },
        BriefState::Completed => RowControl::Generated,
        _ if has_generated_brief => RowControl::Generated,
        BriefState::Failed => RowControl::Retry,
        BriefState::Idle => RowControl::Generate,
    }
}
