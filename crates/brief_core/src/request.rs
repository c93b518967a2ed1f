use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ItemId;

/// Caller-supplied fields needed to build the remote brief request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BriefPayload {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub rest_base: String,
    #[serde(default)]
    pub wordpress_type: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub template: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub item_id: ItemId,
    pub payload: BriefPayload,
    pub submitted_at: SystemTime,
}

impl GenerationRequest {
    pub fn new(item_id: impl Into<ItemId>, payload: BriefPayload) -> Self {
        Self {
            item_id: item_id.into(),
            payload,
            submitted_at: SystemTime::now(),
        }
    }

    /// Same request, stamped as a fresh submission. Retry goes through this.
    pub fn resubmitted(&self) -> Self {
        Self {
            submitted_at: SystemTime::now(),
            ..self.clone()
        }
    }

    /// Human label for logs and progress rows: the title, else the id.
    pub fn label(&self) -> &str {
        let title = self.payload.title.trim();
        if title.is_empty() {
            self.item_id.as_str()
        } else {
            title
        }
    }
}

/// Identity and status of a generated brief as returned by the backend.
///
/// Only `page_id` and `status` are interpreted; everything else is carried
/// through untouched for the cache.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BriefMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Settled result of one remote generation call.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Generated(BriefMeta),
    Failed { message: String },
}

impl JobOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        JobOutcome::Failed {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Generated(_))
    }
}
