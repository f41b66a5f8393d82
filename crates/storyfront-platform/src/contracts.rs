use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use storyfront_core::{Creator, FieldIssue};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldIssue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_purchase_id: Option<Uuid>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            existing_purchase_id: None,
        }
    }
}

/// Body served instead of re-running a handler for a known idempotency key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotentReplayBody {
    pub error: String,
    pub idempotency_key: String,
    pub original_response: Value,
    pub original_status: u16,
    pub original_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthFeatures {
    pub hmac: bool,
    pub idempotency: bool,
    pub storage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub features: HealthFeatures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorListResponse {
    pub items: Vec<Creator>,
}
