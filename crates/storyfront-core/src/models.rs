use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How long a cached idempotent response stays replayable.
pub const IDEMPOTENCY_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CreatorTier {
    Gold,
    Blue,
    Grey,
    Unverified,
}

impl CreatorTier {
    pub fn as_str(self) -> &'static str {
        match self {
            CreatorTier::Gold => "gold",
            CreatorTier::Blue => "blue",
            CreatorTier::Grey => "grey",
            CreatorTier::Unverified => "unverified",
        }
    }

    /// Unknown labels are treated as unverified.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "gold" => CreatorTier::Gold,
            "blue" => CreatorTier::Blue,
            "grey" | "gray" => CreatorTier::Grey,
            _ => CreatorTier::Unverified,
        }
    }
}

impl fmt::Display for CreatorTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub id: String,
    pub handle: String,
    pub display_name: String,
    pub tier: CreatorTier,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub creator_id: String,
    pub title: String,
    pub media_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoryWithCreator {
    #[serde(flatten)]
    pub story: Story,
    pub creator: Creator,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoryPage {
    pub items: Vec<StoryWithCreator>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdempotencyRecord {
    pub key: String,
    pub method: String,
    pub path: String,
    pub request_hash: String,
    pub status_code: u16,
    pub response_body: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(
        key: String,
        method: String,
        path: String,
        request_hash: String,
        status_code: u16,
        response_body: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            method,
            path,
            request_hash,
            status_code,
            response_body,
            created_at,
            expires_at: created_at + Duration::hours(IDEMPOTENCY_TTL_HOURS),
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommerceTotals {
    pub impressions: i64,
    pub ctas: i64,
    pub purchases: i64,
    pub refunds: i64,
    pub gross_usd: Decimal,
    pub refunded_usd: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_labels_fall_back_to_unverified() {
        assert_eq!(CreatorTier::from_label("GOLD"), CreatorTier::Gold);
        assert_eq!(CreatorTier::from_label("gray"), CreatorTier::Grey);
        assert_eq!(CreatorTier::from_label("platinum"), CreatorTier::Unverified);
        assert_eq!(CreatorTier::Blue.to_string(), "blue");
    }

    #[test]
    fn idempotency_records_expire_after_a_day() {
        let created_at = Utc::now();
        let record = IdempotencyRecord::new(
            "key-1".to_string(),
            "POST".to_string(),
            "/api/track/cta".to_string(),
            "abc".to_string(),
            200,
            "{}".to_string(),
            created_at,
        );

        assert_eq!(record.expires_at - record.created_at, Duration::hours(24));
        assert!(record.is_live(created_at + Duration::hours(23)));
        assert!(!record.is_live(created_at + Duration::hours(24)));
    }
}
