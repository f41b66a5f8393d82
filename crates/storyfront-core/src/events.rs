//! Commerce events: validated inputs and the immutable records persisted for
//! them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storyfront_currency::Currency;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpressionInput {
    pub story_id: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtaInput {
    pub story_id: String,
    pub product_id: Option<String>,
    pub user_id: Option<String>,
}

/// Purchase payload after schema validation. `amount` is not rounded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseInput {
    pub order_id: String,
    pub product_id: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub user_id: Option<String>,
    pub referrer_story_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundInput {
    /// Opaque; an id that names no purchase is a lookup miss, not a schema error.
    pub purchase_id: String,
    pub amount: Decimal,
    pub currency: Currency,
    pub reason: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Impression {
    pub id: Uuid,
    pub story_id: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Cta {
    pub id: Uuid,
    pub story_id: String,
    pub product_id: Option<String>,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: Uuid,
    pub order_id: String,
    pub user_id: Option<String>,
    pub product_id: String,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(rename = "amountUSD")]
    pub amount_usd: Decimal,
    pub referrer_story_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: Uuid,
    pub purchase_id: Uuid,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(rename = "amountUSD")]
    pub amount_usd: Decimal,
    pub reason: String,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
