use std::collections::{HashMap, HashSet, VecDeque};
use std::time::SystemTime;

use crate::{GenerationRequest, ItemId, JobOutcome, QueueStats};

/// Concurrency cap used by the dashboard: two briefs in flight at most.
pub const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Stamp handed out on admission; a settle must present the matching ticket.
pub type JobTicket = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub request: GenerationRequest,
    pub state: EntryState,
    pub started_at: Option<SystemTime>,
    pub ticket: Option<JobTicket>,
}

impl QueueEntry {
    fn queued(request: GenerationRequest) -> Self {
        Self {
            request,
            state: EntryState::Queued,
            started_at: None,
            ticket: None,
        }
    }
}

/// What a row should show, as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BriefState {
    Generating,
    Queued,
    Completed,
    Failed,
    Idle,
}

impl BriefState {
    pub fn as_str(self) -> &'static str {
        match self {
            BriefState::Generating => "generating",
            BriefState::Queued => "queued",
            BriefState::Completed => "completed",
            BriefState::Failed => "failed",
            BriefState::Idle => "idle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Appended to the wait queue at this 1-based position.
    Accepted { position: usize },
    /// Empty id, or the id is already queued or running.
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub ticket: JobTicket,
    pub request: GenerationRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub entry: QueueEntry,
    pub outcome: JobOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueState {
    max_concurrent: usize,
    running: HashMap<ItemId, QueueEntry>,
    waiting: VecDeque<QueueEntry>,
    completed: HashSet<ItemId>,
    failed: HashSet<ItemId>,
    next_ticket: JobTicket,
}

impl Default for QueueState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl QueueState {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
            running: HashMap::new(),
            waiting: VecDeque::new(),
            completed: HashSet::new(),
            failed: HashSet::new(),
            next_ticket: 1,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn queued_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.waiting.is_empty()
    }

    pub fn is_tracked(&self, item_id: &ItemId) -> bool {
        self.running.contains_key(item_id)
            || self.waiting.iter().any(|entry| &entry.request.item_id == item_id)
    }

    /// Appends to the tail of the wait queue unless the id is empty or
    /// already queued or running. Terminal sets never block a submission.
    pub fn submit(&mut self, request: GenerationRequest) -> SubmitOutcome {
        if request.item_id.is_empty() || self.is_tracked(&request.item_id) {
            return SubmitOutcome::Rejected;
        }
        self.waiting.push_back(QueueEntry::queued(request));
        SubmitOutcome::Accepted {
            position: self.waiting.len(),
        }
    }

    /// Admits the head of the wait queue if a slot is free.
    pub fn dispatch_next(&mut self, now: SystemTime) -> Option<Admission> {
        if self.running.len() >= self.max_concurrent {
            return None;
        }
        let mut entry = self.waiting.pop_front()?;
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        entry.state = EntryState::Running;
        entry.started_at = Some(now);
        entry.ticket = Some(ticket);
        let request = entry.request.clone();
        self.running.insert(request.item_id.clone(), entry);
        Some(Admission { ticket, request })
    }

    /// Records the terminal outcome of a running job.
    ///
    /// Returns `None` when no running entry carries `ticket` for `item_id`,
    /// which is the case for calls that outlived a `reset`.
    pub fn settle(
        &mut self,
        ticket: JobTicket,
        item_id: &ItemId,
        outcome: JobOutcome,
    ) -> Option<Settlement> {
        let owns_slot = self
            .running
            .get(item_id)
            .is_some_and(|entry| entry.ticket == Some(ticket));
        if !owns_slot {
            return None;
        }
        let mut entry = self.running.remove(item_id)?;
        match &outcome {
            JobOutcome::Generated(_) => {
                entry.state = EntryState::Completed;
                self.failed.remove(item_id);
                self.completed.insert(item_id.clone());
            }
            JobOutcome::Failed { .. } => {
                entry.state = EntryState::Failed;
                self.completed.remove(item_id);
                self.failed.insert(item_id.clone());
            }
        }
        Some(Settlement { entry, outcome })
    }

    pub fn brief_state(&self, item_id: impl Into<ItemId>) -> BriefState {
        let item_id = item_id.into();
        if self.running.contains_key(&item_id) {
            BriefState::Generating
        } else if self
            .waiting
            .iter()
            .any(|entry| entry.request.item_id == item_id)
        {
            BriefState::Queued
        } else if self.completed.contains(&item_id) {
            BriefState::Completed
        } else if self.failed.contains(&item_id) {
            BriefState::Failed
        } else {
            BriefState::Idle
        }
    }

    /// 1-based position in the wait queue, 0 when not queued.
    pub fn queue_position(&self, item_id: impl Into<ItemId>) -> usize {
        let item_id = item_id.into();
        self.waiting
            .iter()
            .position(|entry| entry.request.item_id == item_id)
            .map_or(0, |index| index + 1)
    }

    /// Running or queued entry for `item_id`.
    pub fn entry(&self, item_id: impl Into<ItemId>) -> Option<&QueueEntry> {
        let item_id = item_id.into();
        self.running.get(&item_id).or_else(|| {
            self.waiting
                .iter()
                .find(|entry| entry.request.item_id == item_id)
        })
    }

    /// Running ids in admission order.
    pub fn running_ids(&self) -> Vec<ItemId> {
        let mut entries: Vec<_> = self.running.values().collect();
        entries.sort_by_key(|entry| entry.ticket);
        entries
            .into_iter()
            .map(|entry| entry.request.item_id.clone())
            .collect()
    }

    pub fn queued_ids(&self) -> Vec<ItemId> {
        self.waiting
            .iter()
            .map(|entry| entry.request.item_id.clone())
            .collect()
    }

    /// Forgets completed and failed ids. In-flight work is untouched.
    pub fn cleanup(&mut self) {
        self.completed.clear();
        self.failed.clear();
    }

    /// Drops every set. Returns the ids that were running so their progress
    /// can be stopped; their outstanding calls will settle as stale.
    pub fn reset(&mut self) -> Vec<ItemId> {
        let dropped = self.running_ids();
        self.running.clear();
        self.waiting.clear();
        self.completed.clear();
        self.failed.clear();
        dropped
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats::new(
            self.running.len(),
            self.waiting.len(),
            self.completed.len(),
            self.failed.len(),
            self.max_concurrent,
        )
    }
}
