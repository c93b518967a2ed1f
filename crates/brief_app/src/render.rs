use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use brief_core::{BriefMeta, ItemId, ProgressEstimate, QueueStats, RowControl, Severity};
use brief_engine::{RetryHandle, ViewRenderer};
use brief_logging::brief_warn;

/// Minimum spacing between two progress lines of the same row at equal severity.
const PROGRESS_EVERY: Duration = Duration::from_secs(30);

/// Prints one line per row change to a terminal-like writer.
pub struct TerminalRenderer<W = io::Stdout> {
    out: Mutex<W>,
    titles: HashMap<ItemId, String>,
    retries: Mutex<BTreeMap<ItemId, RetryHandle>>,
    last_progress: Mutex<HashMap<ItemId, (Severity, Duration)>>,
}

impl TerminalRenderer {
    pub fn stdout(titles: HashMap<ItemId, String>) -> Self {
        Self::new(io::stdout(), titles)
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W, titles: HashMap<ItemId, String>) -> Self {
        Self {
            out: Mutex::new(out),
            titles,
            retries: Mutex::new(BTreeMap::new()),
            last_progress: Mutex::new(HashMap::new()),
        }
    }

    /// Hands out every retry control rendered so far.
    pub fn take_retries(&self) -> Vec<RetryHandle> {
        let mut retries = lock(&self.retries);
        std::mem::take(&mut *retries).into_values().collect()
    }

    pub fn print_row(&self, item_id: &ItemId, control: RowControl) {
        self.line(&format!("{} {}", self.row_prefix(item_id), describe(control)));
    }

    pub fn print_line(&self, text: &str) {
        self.line(text);
    }

    fn row_prefix(&self, item_id: &ItemId) -> String {
        match self.titles.get(item_id).filter(|title| !title.is_empty()) {
            Some(title) => format!("[{item_id}] {title}:"),
            None => format!("[{item_id}]:"),
        }
    }

    fn line(&self, text: &str) {
        let mut out = lock(&self.out);
        if let Err(err) = writeln!(out, "{text}").and_then(|()| out.flush()) {
            brief_warn!("terminal write failed: {}", err);
        }
    }

    /// True when this estimate is worth a line of output.
    fn should_print(&self, item_id: &ItemId, estimate: &ProgressEstimate) -> bool {
        let mut last = lock(&self.last_progress);
        let print = match last.get(item_id) {
            None => true,
            Some((severity, at)) => {
                *severity != estimate.severity
                    || estimate.elapsed.saturating_sub(*at) >= PROGRESS_EVERY
                    || estimate.elapsed < *at
            }
        };
        if print {
            last.insert(item_id.clone(), (estimate.severity, estimate.elapsed));
        }
        print
    }
}

impl<W: Write + Send> ViewRenderer for TerminalRenderer<W> {
    fn render_queued(&self, item_id: &ItemId, position: usize) {
        self.print_row(item_id, RowControl::Queued { position });
    }

    fn render_generating(&self, item_id: &ItemId) {
        lock(&self.last_progress).remove(item_id);
        self.print_row(item_id, RowControl::Progress);
    }

    fn render_generated(&self, item_id: &ItemId, brief: &BriefMeta) {
        lock(&self.retries).remove(item_id);
        let status = brief.status.as_deref().unwrap_or("generated");
        self.line(&format!(
            "{} {} ({status})",
            self.row_prefix(item_id),
            describe(RowControl::Generated)
        ));
    }

    fn render_failed(&self, item_id: &ItemId, retry: RetryHandle) {
        lock(&self.retries).insert(item_id.clone(), retry);
        self.print_row(item_id, RowControl::Retry);
    }

    fn update_progress(&self, item_id: &ItemId, estimate: &ProgressEstimate) {
        if !self.should_print(item_id, estimate) {
            return;
        }
        self.line(&format!(
            "{} {} {:.0}% [{}]",
            self.row_prefix(item_id),
            estimate.label(),
            estimate.percent,
            estimate.severity.as_str()
        ));
    }

    fn notify_error(&self, item_id: &ItemId, message: &str) {
        self.line(&format!("{} error: {message}", self.row_prefix(item_id)));
    }

    fn render_stats(&self, stats: &QueueStats) {
        let lines = stats.indicator_lines();
        if !lines.is_empty() {
            self.line(&format!("== {}", lines.join(" | ")));
        }
    }
}

pub fn describe(control: RowControl) -> String {
    match control {
        RowControl::Generate => "ready to generate".to_string(),
        RowControl::Queued { position } => format!("queued (#{position})"),
        RowControl::Progress => "generating".to_string(),
        RowControl::Generated => "brief ready".to_string(),
        RowControl::Retry => "failed, retry available".to_string(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
