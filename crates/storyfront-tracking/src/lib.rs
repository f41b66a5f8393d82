//! Records impressions, CTAs, purchases and refunds, normalizing money through
//! the currency engine before anything reaches storage.

pub mod commission;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use storyfront_core::{
    CatalogStore, CommerceStore, Cta, CtaInput, Impression, ImpressionInput, Purchase,
    PurchaseInput, Refund, RefundInput, StoreError,
};
use storyfront_currency::{
    Currency, CurrencyError, RateTable, convert_to_base_currency, round_to_minor_unit,
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub use commission::{Commission, commission_rate, compute_commission, default_commission_rate};

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error(transparent)]
    Currency(#[from] CurrencyError),
    #[error("purchase already recorded for order {order_id}")]
    DuplicateOrder {
        order_id: String,
        purchase_id: Option<Uuid>,
    },
    #[error("purchase {0} not found")]
    PurchaseNotFound(String),
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventReceipt {
    pub success: bool,
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attribution {
    pub referrer_story_id: String,
    pub creator_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub success: bool,
    pub purchase_id: Uuid,
    pub order_id: String,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(rename = "amountUSD")]
    pub amount_usd: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission: Option<Commission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefundReceipt {
    pub success: bool,
    pub refund_id: Uuid,
    pub purchase_id: Uuid,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(rename = "amountUSD")]
    pub amount_usd: Decimal,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub impressions: i64,
    pub ctas: i64,
    pub purchases: i64,
    pub refunds: i64,
    #[serde(rename = "grossRevenueUSD")]
    pub gross_revenue_usd: Decimal,
    #[serde(rename = "refundedUSD")]
    pub refunded_usd: Decimal,
    #[serde(rename = "netRevenueUSD")]
    pub net_revenue_usd: Decimal,
    pub click_through_rate: Decimal,
    pub generated_at: DateTime<Utc>,
}

pub struct CommerceTracker {
    commerce: Arc<dyn CommerceStore>,
    catalog: Arc<dyn CatalogStore>,
    rates: RateTable,
}

impl CommerceTracker {
    pub fn new(
        commerce: Arc<dyn CommerceStore>,
        catalog: Arc<dyn CatalogStore>,
        rates: RateTable,
    ) -> Self {
        Self {
            commerce,
            catalog,
            rates,
        }
    }

    pub async fn record_impression(
        &self,
        input: ImpressionInput,
    ) -> Result<EventReceipt, TrackingError> {
        let impression = self
            .commerce
            .create_impression(Impression {
                id: Uuid::new_v4(),
                story_id: input.story_id,
                user_id: input.user_id,
                created_at: Utc::now(),
            })
            .await?;

        Ok(EventReceipt {
            success: true,
            id: impression.id,
            created_at: impression.created_at,
        })
    }

    pub async fn record_cta(&self, input: CtaInput) -> Result<EventReceipt, TrackingError> {
        let cta = self
            .commerce
            .create_cta(Cta {
                id: Uuid::new_v4(),
                story_id: input.story_id,
                product_id: input.product_id,
                user_id: input.user_id,
                created_at: Utc::now(),
            })
            .await?;

        Ok(EventReceipt {
            success: true,
            id: cta.id,
            created_at: cta.created_at,
        })
    }

    pub async fn record_purchase(
        &self,
        input: PurchaseInput,
    ) -> Result<PurchaseReceipt, TrackingError> {
        let currency = input.currency;
        let amount = round_to_minor_unit(input.amount, currency);
        let amount_usd = convert_to_base_currency(amount, currency, &self.rates)?;

        if let Some(existing) = self
            .commerce
            .find_purchase_by_order_id(&input.order_id)
            .await?
        {
            return Err(TrackingError::DuplicateOrder {
                order_id: input.order_id,
                purchase_id: Some(existing.id),
            });
        }

        let order_id = input.order_id.clone();
        let purchase = Purchase {
            id: Uuid::new_v4(),
            order_id: input.order_id,
            user_id: input.user_id,
            product_id: input.product_id,
            amount,
            currency,
            amount_usd,
            referrer_story_id: input.referrer_story_id,
            created_at: Utc::now(),
        };

        // A concurrent request may win the race between lookup and insert;
        // the storage constraint turns that into the same conflict.
        let purchase = match self.commerce.create_purchase(purchase).await {
            Ok(purchase) => purchase,
            Err(StoreError::Duplicate(constraint)) => {
                warn!(%order_id, %constraint, "concurrent purchase insert rejected");
                let existing = self.commerce.find_purchase_by_order_id(&order_id).await?;
                return Err(TrackingError::DuplicateOrder {
                    order_id,
                    purchase_id: existing.map(|purchase| purchase.id),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let (commission, attribution) = match purchase.referrer_story_id.as_deref() {
            Some(story_id) => self.attribute(&purchase, story_id).await,
            None => (None, None),
        };

        info!(
            purchase_id = %purchase.id,
            order_id = %purchase.order_id,
            amount = %purchase.amount,
            currency = %purchase.currency,
            "purchase recorded"
        );

        Ok(PurchaseReceipt {
            success: true,
            purchase_id: purchase.id,
            order_id: purchase.order_id,
            amount: purchase.amount,
            currency: purchase.currency,
            amount_usd: purchase.amount_usd,
            commission,
            attribution,
            created_at: purchase.created_at,
        })
    }

    /// Commission is derived after the purchase is stored, so lookup failures
    /// only drop the commission from the receipt.
    async fn attribute(
        &self,
        purchase: &Purchase,
        story_id: &str,
    ) -> (Option<Commission>, Option<Attribution>) {
        let mut attribution = Attribution {
            referrer_story_id: story_id.to_string(),
            creator_id: None,
        };

        let story = match self.catalog.find_story_with_creator(story_id).await {
            Ok(Some(story)) => story,
            Ok(None) => return (None, Some(attribution)),
            Err(err) => {
                warn!(purchase_id = %purchase.id, story_id, "referrer lookup failed: {err}");
                return (None, Some(attribution));
            }
        };

        attribution.creator_id = Some(story.creator.id.clone());
        match compute_commission(purchase.amount, purchase.currency, &story.creator, &self.rates) {
            Ok(commission) => (Some(commission), Some(attribution)),
            Err(err) => {
                warn!(purchase_id = %purchase.id, story_id, "commission not computed: {err}");
                (None, Some(attribution))
            }
        }
    }

    pub async fn record_refund(&self, input: RefundInput) -> Result<RefundReceipt, TrackingError> {
        let currency = input.currency;
        let amount = round_to_minor_unit(input.amount, currency);
        let amount_usd = convert_to_base_currency(amount, currency, &self.rates)?;

        // Stored purchase ids are UUIDs, so anything else cannot match.
        let purchase = match Uuid::parse_str(&input.purchase_id) {
            Ok(id) => self.commerce.find_purchase_by_id(id).await?,
            Err(_) => None,
        };
        let purchase = purchase.ok_or(TrackingError::PurchaseNotFound(input.purchase_id))?;

        let refund = self
            .commerce
            .create_refund(Refund {
                id: Uuid::new_v4(),
                purchase_id: purchase.id,
                amount,
                currency,
                amount_usd,
                reason: input.reason,
                user_id: input.user_id.or(purchase.user_id),
                created_at: Utc::now(),
            })
            .await?;

        info!(
            refund_id = %refund.id,
            purchase_id = %refund.purchase_id,
            amount = %refund.amount,
            currency = %refund.currency,
            "refund recorded"
        );

        Ok(RefundReceipt {
            success: true,
            refund_id: refund.id,
            purchase_id: refund.purchase_id,
            amount: refund.amount,
            currency: refund.currency,
            amount_usd: refund.amount_usd,
            reason: refund.reason,
            created_at: refund.created_at,
        })
    }

    pub async fn dashboard(&self) -> Result<DashboardSummary, TrackingError> {
        let totals = self.commerce.commerce_totals().await?;
        let click_through_rate = if totals.impressions > 0 {
            (Decimal::from(totals.ctas) / Decimal::from(totals.impressions))
                .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
                .normalize()
        } else {
            Decimal::ZERO
        };

        Ok(DashboardSummary {
            impressions: totals.impressions,
            ctas: totals.ctas,
            purchases: totals.purchases,
            refunds: totals.refunds,
            gross_revenue_usd: totals.gross_usd,
            refunded_usd: totals.refunded_usd,
            net_revenue_usd: totals.gross_usd - totals.refunded_usd,
            click_through_rate,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use async_trait::async_trait;
    use storyfront_core::{CommerceTotals, Creator, CreatorTier, Story};
    use storyfront_memstore::InMemoryStore;

    use super::*;

    fn dec(raw: &str) -> Decimal {
        Decimal::from_str(raw).expect("decimal literal")
    }

    async fn seeded_store(tier: CreatorTier) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store
            .insert_creator(Creator {
                id: "c1".to_string(),
                handle: "maya".to_string(),
                display_name: "Maya".to_string(),
                tier,
                created_at: Utc::now(),
            })
            .await;
        store
            .insert_story(Story {
                id: "s1".to_string(),
                creator_id: "c1".to_string(),
                title: "Spring drop".to_string(),
                media_url: None,
                created_at: Utc::now(),
            })
            .await
            .expect("seed story");
        store
    }

    fn tracker(store: Arc<InMemoryStore>) -> CommerceTracker {
        CommerceTracker::new(store.clone(), store, RateTable::default())
    }

    fn purchase_input(order_id: &str, amount: &str, currency: Currency) -> PurchaseInput {
        PurchaseInput {
            order_id: order_id.to_string(),
            product_id: "p1".to_string(),
            amount: dec(amount),
            currency,
            user_id: Some("u1".to_string()),
            referrer_story_id: None,
        }
    }

    #[tokio::test]
    async fn purchase_is_rounded_and_converted() {
        let store = seeded_store(CreatorTier::Gold).await;
        let tracker = tracker(store.clone());

        let mut input = purchase_input("o1", "99.999", Currency::Eur);
        input.referrer_story_id = Some("s1".to_string());
        let receipt = tracker.record_purchase(input).await.expect("purchase recorded");

        assert_eq!(receipt.amount.to_string(), "100.00");
        assert_eq!(receipt.currency, Currency::Eur);
        assert_eq!(receipt.amount_usd.to_string(), "108.00");

        let commission = receipt.commission.expect("gold creator earns commission");
        assert_eq!(commission.rate, dec("0.12"));
        assert_eq!(commission.amount.to_string(), "12.00");
        assert_eq!(commission.amount_usd.to_string(), "12.96");
        assert_eq!(
            receipt.attribution,
            Some(Attribution {
                referrer_story_id: "s1".to_string(),
                creator_id: Some("c1".to_string()),
            })
        );

        let stored = store
            .find_purchase_by_order_id("o1")
            .await
            .expect("lookup")
            .expect("stored purchase");
        assert_eq!(stored.amount, dec("100.00"));
        assert_eq!(stored.amount_usd, dec("108.00"));
    }

    #[tokio::test]
    async fn unknown_referrer_keeps_attribution_without_commission() {
        let store = seeded_store(CreatorTier::Blue).await;
        let tracker = tracker(store);

        let mut input = purchase_input("o1", "20", Currency::Usd);
        input.referrer_story_id = Some("missing".to_string());
        let receipt = tracker.record_purchase(input).await.expect("purchase recorded");

        assert_eq!(receipt.commission, None);
        assert_eq!(
            receipt.attribution.and_then(|attribution| attribution.creator_id),
            None
        );
    }

    #[tokio::test]
    async fn duplicate_order_is_a_conflict() {
        let store = seeded_store(CreatorTier::Gold).await;
        let tracker = tracker(store.clone());

        let first = tracker
            .record_purchase(purchase_input("o1", "10", Currency::Usd))
            .await
            .expect("first purchase");
        let err = tracker
            .record_purchase(purchase_input("o1", "12", Currency::Gbp))
            .await
            .expect_err("second purchase");

        match err {
            TrackingError::DuplicateOrder {
                order_id,
                purchase_id,
            } => {
                assert_eq!(order_id, "o1");
                assert_eq!(purchase_id, Some(first.purchase_id));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(store.commerce_totals().await.expect("totals").purchases, 1);
    }

    /// Store whose lookup never sees the earlier insert, as when two requests
    /// race between lookup and create.
    struct RacingStore {
        inner: InMemoryStore,
    }

    #[async_trait]
    impl CommerceStore for RacingStore {
        async fn create_impression(&self, impression: Impression) -> Result<Impression, StoreError> {
            self.inner.create_impression(impression).await
        }

        async fn create_cta(&self, cta: Cta) -> Result<Cta, StoreError> {
            self.inner.create_cta(cta).await
        }

        async fn find_purchase_by_order_id(
            &self,
            _order_id: &str,
        ) -> Result<Option<Purchase>, StoreError> {
            Ok(None)
        }

        async fn create_purchase(&self, purchase: Purchase) -> Result<Purchase, StoreError> {
            self.inner.create_purchase(purchase).await
        }

        async fn find_purchase_by_id(&self, id: Uuid) -> Result<Option<Purchase>, StoreError> {
            self.inner.find_purchase_by_id(id).await
        }

        async fn create_refund(&self, refund: Refund) -> Result<Refund, StoreError> {
            self.inner.create_refund(refund).await
        }

        async fn commerce_totals(&self) -> Result<CommerceTotals, StoreError> {
            self.inner.commerce_totals().await
        }
    }

    #[tokio::test]
    async fn storage_constraint_closes_the_race() {
        let store = Arc::new(RacingStore {
            inner: InMemoryStore::new(),
        });
        let catalog = Arc::new(InMemoryStore::new());
        let tracker = CommerceTracker::new(store.clone(), catalog, RateTable::default());

        tracker
            .record_purchase(purchase_input("o1", "10", Currency::Usd))
            .await
            .expect("first purchase");
        let err = tracker
            .record_purchase(purchase_input("o1", "10", Currency::Usd))
            .await
            .expect_err("raced purchase");

        assert!(matches!(err, TrackingError::DuplicateOrder { .. }));
        assert_eq!(store.commerce_totals().await.expect("totals").purchases, 1);
    }

    #[tokio::test]
    async fn strict_rates_fail_before_storage() {
        let store = Arc::new(InMemoryStore::new());
        let tracker = CommerceTracker::new(store.clone(), store.clone(), RateTable::strict());

        let err = tracker
            .record_purchase(purchase_input("o1", "10", Currency::Jpy))
            .await
            .expect_err("no JPY rate");
        assert!(matches!(
            err,
            TrackingError::Currency(CurrencyError::RateUnavailable { .. })
        ));
        assert_eq!(store.commerce_totals().await.expect("totals").purchases, 0);
    }

    #[tokio::test]
    async fn refund_requires_existing_purchase() {
        let store = Arc::new(InMemoryStore::new());
        let tracker = tracker(store.clone());
        let missing = Uuid::new_v4().to_string();

        for purchase_id in [missing.as_str(), "purchase-404"] {
            let err = tracker
                .record_refund(RefundInput {
                    purchase_id: purchase_id.to_string(),
                    amount: dec("5"),
                    currency: Currency::Usd,
                    reason: "damaged".to_string(),
                    user_id: None,
                })
                .await
                .expect_err("missing purchase");

            assert!(matches!(err, TrackingError::PurchaseNotFound(ref id) if id == purchase_id));
        }
        assert_eq!(store.commerce_totals().await.expect("totals").refunds, 0);
    }

    #[tokio::test]
    async fn refund_defaults_to_purchaser() {
        let store = Arc::new(InMemoryStore::new());
        let tracker = tracker(store.clone());
        let purchase = tracker
            .record_purchase(purchase_input("o1", "3000", Currency::Jpy))
            .await
            .expect("purchase");

        let refund = tracker
            .record_refund(RefundInput {
                purchase_id: purchase.purchase_id.to_string(),
                amount: dec("1000.6"),
                currency: Currency::Jpy,
                reason: "late delivery".to_string(),
                user_id: None,
            })
            .await
            .expect("refund recorded");

        assert_eq!(refund.amount.to_string(), "1001");
        assert_eq!(refund.amount_usd, dec("6.71"));
        assert_eq!(refund.reason, "late delivery");

        let summary = tracker.dashboard().await.expect("dashboard");
        assert_eq!(summary.purchases, 1);
        assert_eq!(summary.refunds, 1);
        assert_eq!(summary.net_revenue_usd, summary.gross_revenue_usd - dec("6.71"));
    }

    #[tokio::test]
    async fn dashboard_reports_click_through_rate() {
        let store = Arc::new(InMemoryStore::new());
        let tracker = tracker(store);

        for _ in 0..3 {
            tracker
                .record_impression(ImpressionInput {
                    story_id: "s1".to_string(),
                    user_id: None,
                })
                .await
                .expect("impression");
        }
        let receipt = tracker
            .record_cta(CtaInput {
                story_id: "s1".to_string(),
                product_id: Some("p1".to_string()),
                user_id: None,
            })
            .await
            .expect("cta");
        assert!(receipt.success);

        let summary = tracker.dashboard().await.expect("dashboard");
        assert_eq!(summary.impressions, 3);
        assert_eq!(summary.ctas, 1);
        assert_eq!(summary.click_through_rate.to_string(), "0.3333");

        let json = serde_json::to_value(&summary).expect("serialize");
        assert!(json.get("grossRevenueUSD").is_some());
    }

    #[tokio::test]
    async fn click_through_rate_drops_trailing_zeros() {
        let tracker = tracker(Arc::new(InMemoryStore::new()));

        for story_id in ["s1", "s2"] {
            tracker
                .record_impression(ImpressionInput {
                    story_id: story_id.to_string(),
                    user_id: None,
                })
                .await
                .expect("impression");
        }
        tracker
            .record_cta(CtaInput {
                story_id: "s1".to_string(),
                product_id: None,
                user_id: None,
            })
            .await
            .expect("cta");

        let summary = tracker.dashboard().await.expect("dashboard");
        assert_eq!(summary.click_through_rate.to_string(), "0.5");

        let json = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(json["clickThroughRate"], "0.5");
    }
}
