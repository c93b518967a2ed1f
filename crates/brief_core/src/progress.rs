//! Synthetic progress for long-running generations.
//!
//! The backend gives no progress signal, so the bar is driven by wall time
//! against a fixed estimate. Nothing here feeds back into scheduling.

use std::time::Duration;

/// Expected duration of one brief generation.
pub const ESTIMATED_DURATION: Duration = Duration::from_secs(4 * 60);
/// Elapsed time after which a running generation is flagged as danger.
pub const DANGER_AFTER: Duration = Duration::from_secs(6 * 60);
/// How often a running generation's progress is recomputed.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Severity {
    #[default]
    Normal,
    Warning,
    Danger,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressThresholds {
    pub estimated: Duration,
    pub danger_after: Duration,
}

impl Default for ProgressThresholds {
    fn default() -> Self {
        Self {
            estimated: ESTIMATED_DURATION,
            danger_after: DANGER_AFTER,
        }
    }
}

impl ProgressThresholds {
    pub fn estimate(&self, elapsed: Duration) -> ProgressEstimate {
        let percent = if self.estimated.is_zero() {
            100.0
        } else {
            (elapsed.as_secs_f64() / self.estimated.as_secs_f64() * 100.0).min(100.0)
        };
        let severity = if elapsed > self.danger_after {
            Severity::Danger
        } else if elapsed > self.estimated {
            Severity::Warning
        } else {
            Severity::Normal
        };
        ProgressEstimate {
            percent,
            elapsed,
            estimated: self.estimated,
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEstimate {
    /// 0..=100, capped once the estimate is exceeded.
    pub percent: f64,
    pub elapsed: Duration,
    pub estimated: Duration,
    pub severity: Severity,
}

impl ProgressEstimate {
    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }

    /// `m:ss / ~m:ss`, elapsed over estimate.
    pub fn label(&self) -> String {
        format!(
            "{} / ~{}",
            format_minutes(self.elapsed),
            format_minutes(self.estimated)
        )
    }
}

fn format_minutes(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}
