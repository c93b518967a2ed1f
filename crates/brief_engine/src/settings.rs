use std::time::Duration;

use brief_core::{ProgressThresholds, DEFAULT_MAX_CONCURRENT, TICK_INTERVAL};

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub max_concurrent: usize,
    /// Upper bound for one remote call before it settles as failed.
    pub call_timeout: Duration,
    pub tick_interval: Duration,
    pub thresholds: ProgressThresholds,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            call_timeout: Duration::from_secs(10 * 60),
            tick_interval: TICK_INTERVAL,
            thresholds: ProgressThresholds::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3001/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(10 * 60),
        }
    }
}
