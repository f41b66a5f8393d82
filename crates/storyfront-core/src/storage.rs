use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    events::{Cta, Impression, Purchase, Refund},
    models::{CommerceTotals, Creator, IdempotencyRecord, StoryPage, StoryWithCreator},
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("duplicate value violates unique constraint {0}")]
    Duplicate(String),
    #[error("unknown pagination cursor {0}")]
    UnknownCursor(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Returns the record for `key` only while it has not expired at `now`.
    async fn find_idempotency_key(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, StoreError>;

    async fn create_idempotency_key(&self, record: IdempotencyRecord) -> Result<(), StoreError>;
}

#[async_trait]
pub trait CommerceStore: Send + Sync {
    async fn create_impression(&self, impression: Impression) -> Result<Impression, StoreError>;

    async fn create_cta(&self, cta: Cta) -> Result<Cta, StoreError>;

    async fn find_purchase_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<Purchase>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the order id already exists.
    async fn create_purchase(&self, purchase: Purchase) -> Result<Purchase, StoreError>;

    async fn find_purchase_by_id(&self, id: Uuid) -> Result<Option<Purchase>, StoreError>;

    async fn create_refund(&self, refund: Refund) -> Result<Refund, StoreError>;

    async fn commerce_totals(&self) -> Result<CommerceTotals, StoreError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_story_with_creator(
        &self,
        story_id: &str,
    ) -> Result<Option<StoryWithCreator>, StoreError>;

    async fn list_creators(&self) -> Result<Vec<Creator>, StoreError>;

    /// Newest stories first, starting after the story named by `cursor`.
    async fn list_stories(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<StoryPage, StoreError>;
}
