use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use brief_core::DEFAULT_MAX_CONCURRENT;
use brief_engine::{ClientSettings, QueueSettings};
use brief_logging::brief_info;
use serde::Deserialize;

use crate::logging::LogDestination;

pub const DEFAULT_CONFIG_FILE: &str = "brief_app.ron";

/// Runtime options read from a RON file. Missing fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub max_concurrent: usize,
    pub call_timeout_secs: u64,
    pub cache_dir: PathBuf,
    pub log_destination: LogDestination,
    pub retry_failed_once: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            api_base_url: client.api_base_url,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            call_timeout_secs: client.request_timeout.as_secs(),
            cache_dir: PathBuf::from("cache"),
            log_destination: LogDestination::default(),
            retry_failed_once: false,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or `brief_app.ron` when none is given. A missing file
    /// yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };
        let config: Self =
            ron::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
        brief_info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            max_concurrent: self.max_concurrent,
            call_timeout: self.call_timeout(),
            ..QueueSettings::default()
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            api_base_url: self.api_base_url.clone(),
            request_timeout: self.call_timeout(),
            ..ClientSettings::default()
        }
    }
}
