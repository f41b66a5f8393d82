use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use storyfront_core::{
    CatalogStore, CommerceStore, CommerceTotals, Creator, Cta, IdempotencyRecord,
    IdempotencyStore, Impression, Purchase, Refund, Story, StoryPage, StoryWithCreator,
    StoreError,
};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct CommerceTables {
    impressions: Vec<Impression>,
    ctas: Vec<Cta>,
    purchases: HashMap<Uuid, Purchase>,
    purchases_by_order: HashMap<String, Uuid>,
    refunds: Vec<Refund>,
}

#[derive(Default)]
struct CatalogTables {
    creators: HashMap<String, Creator>,
    stories: Vec<Story>,
}

/// Process-local store used in development and tests. Each write holds a
/// single lock for its check and insert, mirroring the uniqueness
/// constraints of the Postgres schema.
#[derive(Default)]
pub struct InMemoryStore {
    commerce: RwLock<CommerceTables>,
    catalog: RwLock<CatalogTables>,
    idempotency: RwLock<HashMap<String, IdempotencyRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_creator(&self, creator: Creator) {
        let mut catalog = self.catalog.write().await;
        catalog.creators.insert(creator.id.clone(), creator);
    }

    pub async fn insert_story(&self, story: Story) -> Result<(), StoreError> {
        let mut catalog = self.catalog.write().await;
        if !catalog.creators.contains_key(&story.creator_id) {
            return Err(anyhow!(
                "story {} references unknown creator {}",
                story.id,
                story.creator_id
            )
            .into());
        }
        if catalog.stories.iter().any(|existing| existing.id == story.id) {
            return Err(StoreError::Duplicate("stories_pkey".to_string()));
        }

        catalog.stories.push(story);
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryStore {
    async fn find_idempotency_key(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let records = self.idempotency.read().await;
        Ok(records.get(key).filter(|record| record.is_live(now)).cloned())
    }

    async fn create_idempotency_key(&self, record: IdempotencyRecord) -> Result<(), StoreError> {
        let mut records = self.idempotency.write().await;
        let now = Utc::now();
        // Expired keys may be overwritten; live ones are unique.
        if records.get(&record.key).is_some_and(|existing| existing.is_live(now)) {
            return Err(StoreError::Duplicate("idempotency_keys_pkey".to_string()));
        }

        records.insert(record.key.clone(), record);
        Ok(())
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn create_impression(&self, impression: Impression) -> Result<Impression, StoreError> {
        let mut tables = self.commerce.write().await;
        tables.impressions.push(impression.clone());
        Ok(impression)
    }

    async fn create_cta(&self, cta: Cta) -> Result<Cta, StoreError> {
        let mut tables = self.commerce.write().await;
        tables.ctas.push(cta.clone());
        Ok(cta)
    }

    async fn find_purchase_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<Purchase>, StoreError> {
        let tables = self.commerce.read().await;
        Ok(tables
            .purchases_by_order
            .get(order_id)
            .and_then(|id| tables.purchases.get(id))
            .cloned())
    }

    async fn create_purchase(&self, purchase: Purchase) -> Result<Purchase, StoreError> {
        let mut tables = self.commerce.write().await;
        if tables.purchases_by_order.contains_key(&purchase.order_id) {
            return Err(StoreError::Duplicate("purchases_order_id_key".to_string()));
        }

        tables
            .purchases_by_order
            .insert(purchase.order_id.clone(), purchase.id);
        tables.purchases.insert(purchase.id, purchase.clone());
        Ok(purchase)
    }

    async fn find_purchase_by_id(&self, id: Uuid) -> Result<Option<Purchase>, StoreError> {
        let tables = self.commerce.read().await;
        Ok(tables.purchases.get(&id).cloned())
    }

    async fn create_refund(&self, refund: Refund) -> Result<Refund, StoreError> {
        let mut tables = self.commerce.write().await;
        if !tables.purchases.contains_key(&refund.purchase_id) {
            return Err(anyhow!(
                "refund {} references unknown purchase {}",
                refund.id,
                refund.purchase_id
            )
            .into());
        }

        tables.refunds.push(refund.clone());
        Ok(refund)
    }

    async fn commerce_totals(&self) -> Result<CommerceTotals, StoreError> {
        let tables = self.commerce.read().await;
        Ok(CommerceTotals {
            impressions: tables.impressions.len() as i64,
            ctas: tables.ctas.len() as i64,
            purchases: tables.purchases.len() as i64,
            refunds: tables.refunds.len() as i64,
            gross_usd: tables
                .purchases
                .values()
                .map(|purchase| purchase.amount_usd)
                .sum::<Decimal>(),
            refunded_usd: tables
                .refunds
                .iter()
                .map(|refund| refund.amount_usd)
                .sum::<Decimal>(),
        })
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_story_with_creator(
        &self,
        story_id: &str,
    ) -> Result<Option<StoryWithCreator>, StoreError> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .stories
            .iter()
            .find(|story| story.id == story_id)
            .and_then(|story| {
                catalog.creators.get(&story.creator_id).map(|creator| StoryWithCreator {
                    story: story.clone(),
                    creator: creator.clone(),
                })
            }))
    }

    async fn list_creators(&self) -> Result<Vec<Creator>, StoreError> {
        let catalog = self.catalog.read().await;
        let mut creators: Vec<Creator> = catalog.creators.values().cloned().collect();
        creators.sort_by(|left, right| left.handle.cmp(&right.handle));
        Ok(creators)
    }

    async fn list_stories(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<StoryPage, StoreError> {
        let catalog = self.catalog.read().await;
        let mut stories: Vec<&Story> = catalog.stories.iter().collect();
        stories.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.id.cmp(&left.id))
        });

        let start = match cursor {
            Some(cursor) => {
                stories
                    .iter()
                    .position(|story| story.id == cursor)
                    .ok_or_else(|| StoreError::UnknownCursor(cursor.to_string()))?
                    + 1
            }
            None => 0,
        };

        let mut items: Vec<StoryWithCreator> = stories
            .into_iter()
            .skip(start)
            .take(limit + 1)
            .filter_map(|story| {
                catalog.creators.get(&story.creator_id).map(|creator| StoryWithCreator {
                    story: story.clone(),
                    creator: creator.clone(),
                })
            })
            .collect();

        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|item| item.story.id.clone())
        } else {
            None
        };

        Ok(StoryPage { items, next_cursor })
    }
}
