use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WebhookEventStatus {
    #[default]
    Processing,
    Processed,
    Failed,
}

impl Display for WebhookEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            WebhookEventStatus::Processing => "processing",
            WebhookEventStatus::Processed => "processed",
            WebhookEventStatus::Failed => "failed",
        };
        write!(f, "{}", status)
    }
}

impl WebhookEventStatus {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "processing" => Some(WebhookEventStatus::Processing),
            "processed" => Some(WebhookEventStatus::Processed),
            "failed" => Some(WebhookEventStatus::Failed),
            _ => None,
        }
    }
}
