use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use storyfront_core::{
    CatalogStore, CommerceStore, CommerceTotals, Creator, CreatorTier, Cta, IdempotencyRecord,
    IdempotencyStore, Impression, Purchase, Refund, Story, StoryPage, StoryWithCreator,
    StoreError,
};
use storyfront_currency::Currency;
use uuid::Uuid;

/// Postgres implementation of every storage interface. Uniqueness of order
/// ids and idempotency keys is enforced by the schema, not by this code.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn store_error(err: sqlx::Error) -> StoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate(db_err.constraint().unwrap_or("unique").to_string());
        }
    }

    StoreError::Backend(err.into())
}

fn parse_currency(row: &PgRow) -> Result<Currency, StoreError> {
    let code: String = row.try_get("currency").map_err(store_error)?;
    code.parse::<Currency>()
        .map_err(|err| StoreError::Backend(anyhow!("stored currency {code} is invalid: {err}")))
}

fn purchase_from_row(row: &PgRow) -> Result<Purchase, StoreError> {
    Ok(Purchase {
        id: row.try_get("id").map_err(store_error)?,
        order_id: row.try_get("order_id").map_err(store_error)?,
        user_id: row.try_get("user_id").map_err(store_error)?,
        product_id: row.try_get("product_id").map_err(store_error)?,
        amount: row.try_get("amount").map_err(store_error)?,
        currency: parse_currency(row)?,
        amount_usd: row.try_get("amount_usd").map_err(store_error)?,
        referrer_story_id: row.try_get("referrer_story_id").map_err(store_error)?,
        created_at: row.try_get("created_at").map_err(store_error)?,
    })
}

fn story_with_creator_from_row(row: &PgRow) -> Result<StoryWithCreator, StoreError> {
    let tier: String = row.try_get("tier").map_err(store_error)?;
    let creator_id: String = row.try_get("creator_id").map_err(store_error)?;

    Ok(StoryWithCreator {
        story: Story {
            id: row.try_get("id").map_err(store_error)?,
            creator_id: creator_id.clone(),
            title: row.try_get("title").map_err(store_error)?,
            media_url: row.try_get("media_url").map_err(store_error)?,
            created_at: row.try_get("created_at").map_err(store_error)?,
        },
        creator: Creator {
            id: creator_id,
            handle: row.try_get("handle").map_err(store_error)?,
            display_name: row.try_get("display_name").map_err(store_error)?,
            tier: CreatorTier::from_label(&tier),
            created_at: row.try_get("creator_created_at").map_err(store_error)?,
        },
    })
}

const PURCHASE_COLUMNS: &str = r#"
    id, order_id, user_id, product_id, amount, currency, amount_usd, referrer_story_id, created_at
"#;

const STORY_WITH_CREATOR_SELECT: &str = r#"
    SELECT
        s.id,
        s.creator_id,
        s.title,
        s.media_url,
        s.created_at,
        c.handle,
        c.display_name,
        c.tier,
        c.created_at AS creator_created_at
    FROM stories s
    JOIN creators c ON c.id = s.creator_id
"#;

#[async_trait]
impl IdempotencyStore for PgStore {
    async fn find_idempotency_key(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT key, method, path, request_hash, status_code, response_body, created_at, expires_at
            FROM idempotency_keys
            WHERE key = $1
              AND expires_at > $2
            "#,
        )
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let status_code: i32 = row.try_get("status_code").map_err(store_error)?;
        Ok(Some(IdempotencyRecord {
            key: row.try_get("key").map_err(store_error)?,
            method: row.try_get("method").map_err(store_error)?,
            path: row.try_get("path").map_err(store_error)?,
            request_hash: row.try_get("request_hash").map_err(store_error)?,
            status_code: u16::try_from(status_code)
                .map_err(|err| StoreError::Backend(anyhow!("stored status {status_code}: {err}")))?,
            response_body: row.try_get("response_body").map_err(store_error)?,
            created_at: row.try_get("created_at").map_err(store_error)?,
            expires_at: row.try_get("expires_at").map_err(store_error)?,
        }))
    }

    async fn create_idempotency_key(&self, record: IdempotencyRecord) -> Result<(), StoreError> {
        // Expired rows are overwritten in place; live rows make this a no-op.
        let result = sqlx::query(
            r#"
            INSERT INTO idempotency_keys (
                key, method, path, request_hash, status_code, response_body, created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (key) DO UPDATE
            SET method = EXCLUDED.method,
                path = EXCLUDED.path,
                request_hash = EXCLUDED.request_hash,
                status_code = EXCLUDED.status_code,
                response_body = EXCLUDED.response_body,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
            WHERE idempotency_keys.expires_at <= EXCLUDED.created_at
            "#,
        )
        .bind(&record.key)
        .bind(&record.method)
        .bind(&record.path)
        .bind(&record.request_hash)
        .bind(i32::from(record.status_code))
        .bind(&record.response_body)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate("idempotency_keys_pkey".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl CommerceStore for PgStore {
    async fn create_impression(&self, impression: Impression) -> Result<Impression, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO impressions (id, story_id, user_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(impression.id)
        .bind(&impression.story_id)
        .bind(impression.user_id.as_deref())
        .bind(impression.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(impression)
    }

    async fn create_cta(&self, cta: Cta) -> Result<Cta, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO ctas (id, story_id, product_id, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(cta.id)
        .bind(&cta.story_id)
        .bind(cta.product_id.as_deref())
        .bind(cta.user_id.as_deref())
        .bind(cta.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(cta)
    }

    async fn find_purchase_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<Purchase>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE order_id = $1 LIMIT 1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.as_ref().map(purchase_from_row).transpose()
    }

    async fn create_purchase(&self, purchase: Purchase) -> Result<Purchase, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO purchases (
                id, order_id, user_id, product_id, amount, currency, amount_usd, referrer_story_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(purchase.id)
        .bind(&purchase.order_id)
        .bind(purchase.user_id.as_deref())
        .bind(&purchase.product_id)
        .bind(purchase.amount)
        .bind(purchase.currency.code())
        .bind(purchase.amount_usd)
        .bind(purchase.referrer_story_id.as_deref())
        .bind(purchase.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(purchase)
    }

    async fn find_purchase_by_id(&self, id: Uuid) -> Result<Option<Purchase>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;

        row.as_ref().map(purchase_from_row).transpose()
    }

    async fn create_refund(&self, refund: Refund) -> Result<Refund, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refunds (
                id, purchase_id, amount, currency, amount_usd, reason, user_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(refund.id)
        .bind(refund.purchase_id)
        .bind(refund.amount)
        .bind(refund.currency.code())
        .bind(refund.amount_usd)
        .bind(&refund.reason)
        .bind(refund.user_id.as_deref())
        .bind(refund.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(refund)
    }

    async fn commerce_totals(&self) -> Result<CommerceTotals, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM impressions) AS impressions,
                (SELECT COUNT(*) FROM ctas) AS ctas,
                (SELECT COUNT(*) FROM purchases) AS purchases,
                (SELECT COUNT(*) FROM refunds) AS refunds,
                (SELECT COALESCE(SUM(amount_usd), 0) FROM purchases) AS gross_usd,
                (SELECT COALESCE(SUM(amount_usd), 0) FROM refunds) AS refunded_usd
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(CommerceTotals {
            impressions: row.try_get("impressions").map_err(store_error)?,
            ctas: row.try_get("ctas").map_err(store_error)?,
            purchases: row.try_get("purchases").map_err(store_error)?,
            refunds: row.try_get("refunds").map_err(store_error)?,
            gross_usd: row.try_get("gross_usd").map_err(store_error)?,
            refunded_usd: row.try_get("refunded_usd").map_err(store_error)?,
        })
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn find_story_with_creator(
        &self,
        story_id: &str,
    ) -> Result<Option<StoryWithCreator>, StoreError> {
        let row = sqlx::query(&format!("{STORY_WITH_CREATOR_SELECT} WHERE s.id = $1"))
            .bind(story_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;

        row.as_ref().map(story_with_creator_from_row).transpose()
    }

    async fn list_creators(&self) -> Result<Vec<Creator>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, handle, display_name, tier, created_at
            FROM creators
            ORDER BY handle
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        rows.iter()
            .map(|row| {
                let tier: String = row.try_get("tier").map_err(store_error)?;
                Ok(Creator {
                    id: row.try_get("id").map_err(store_error)?,
                    handle: row.try_get("handle").map_err(store_error)?,
                    display_name: row.try_get("display_name").map_err(store_error)?,
                    tier: CreatorTier::from_label(&tier),
                    created_at: row.try_get("created_at").map_err(store_error)?,
                })
            })
            .collect()
    }

    async fn list_stories(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<StoryPage, StoreError> {
        let anchor: Option<(DateTime<Utc>, String)> = match cursor {
            Some(cursor) => {
                let row = sqlx::query("SELECT created_at, id FROM stories WHERE id = $1")
                    .bind(cursor)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(store_error)?
                    .ok_or_else(|| StoreError::UnknownCursor(cursor.to_string()))?;
                Some((
                    row.try_get("created_at").map_err(store_error)?,
                    row.try_get("id").map_err(store_error)?,
                ))
            }
            None => None,
        };
        let (anchor_at, anchor_id) = anchor.unzip();
        let fetch_limit = i64::try_from(limit + 1).unwrap_or(i64::MAX);

        let rows = sqlx::query(&format!(
            r#"
            {STORY_WITH_CREATOR_SELECT}
            WHERE $1::timestamptz IS NULL OR (s.created_at, s.id) < ($1::timestamptz, $2::text)
            ORDER BY s.created_at DESC, s.id DESC
            LIMIT $3
            "#
        ))
        .bind(anchor_at)
        .bind(anchor_id)
        .bind(fetch_limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut items = rows
            .iter()
            .map(story_with_creator_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let next_cursor = if items.len() > limit {
            items.truncate(limit);
            items.last().map(|item| item.story.id.clone())
        } else {
            None
        };

        Ok(StoryPage { items, next_cursor })
    }
}
