use rust_decimal::Decimal;
use serde::Serialize;
use storyfront_core::{Creator, CreatorTier};
use storyfront_currency::{
    Currency, CurrencyError, RateTable, convert_to_base_currency, round_to_minor_unit,
};

/// Rate paid to creators without a recognised tier.
pub fn default_commission_rate() -> Decimal {
    Decimal::new(5, 2)
}

pub fn commission_rate(tier: CreatorTier) -> Decimal {
    match tier {
        CreatorTier::Gold => Decimal::new(12, 2),
        CreatorTier::Blue => Decimal::new(10, 2),
        CreatorTier::Grey => Decimal::new(7, 2),
        CreatorTier::Unverified => default_commission_rate(),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Commission {
    pub creator_id: String,
    pub tier: CreatorTier,
    pub rate: Decimal,
    pub amount: Decimal,
    pub currency: Currency,
    #[serde(rename = "amountUSD")]
    pub amount_usd: Decimal,
}

/// `amount` must already be rounded to `currency`.
pub fn compute_commission(
    amount: Decimal,
    currency: Currency,
    creator: &Creator,
    rates: &RateTable,
) -> Result<Commission, CurrencyError> {
    let rate = commission_rate(creator.tier);
    let commission = round_to_minor_unit(amount * rate, currency);
    let amount_usd = convert_to_base_currency(commission, currency, rates)?;

    Ok(Commission {
        creator_id: creator.id.clone(),
        tier: creator.tier,
        rate,
        amount: commission,
        currency,
        amount_usd,
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::Utc;

    use super::*;

    fn creator(tier: CreatorTier) -> Creator {
        Creator {
            id: "c1".to_string(),
            handle: "maya".to_string(),
            display_name: "Maya".to_string(),
            tier,
            created_at: Utc::now(),
        }
    }

    fn dec(raw: &str) -> Decimal {
        Decimal::from_str(raw).expect("decimal literal")
    }

    #[test]
    fn tiers_map_to_rates() {
        assert_eq!(commission_rate(CreatorTier::Gold), dec("0.12"));
        assert_eq!(commission_rate(CreatorTier::Blue), dec("0.10"));
        assert_eq!(commission_rate(CreatorTier::Grey), dec("0.07"));
        assert_eq!(commission_rate(CreatorTier::Unverified), dec("0.05"));
    }

    #[test]
    fn gold_and_unverified_commissions_on_one_hundred_usd() {
        let rates = RateTable::default();
        let gold = compute_commission(dec("100.00"), Currency::Usd, &creator(CreatorTier::Gold), &rates)
            .expect("gold commission");
        assert_eq!(gold.amount.to_string(), "12.00");
        assert_eq!(gold.amount_usd, dec("12.00"));

        let unverified = compute_commission(
            dec("100.00"),
            Currency::Usd,
            &creator(CreatorTier::Unverified),
            &rates,
        )
        .expect("unverified commission");
        assert_eq!(unverified.amount.to_string(), "5.00");
        assert_eq!(unverified.rate, default_commission_rate());
    }

    #[test]
    fn foreign_commissions_are_rounded_then_converted() {
        let rates = RateTable::default();
        let commission =
            compute_commission(dec("100.00"), Currency::Eur, &creator(CreatorTier::Gold), &rates)
                .expect("eur commission");
        assert_eq!(commission.amount.to_string(), "12.00");
        assert_eq!(commission.amount_usd.to_string(), "12.96");

        let commission =
            compute_commission(dec("999"), Currency::Jpy, &creator(CreatorTier::Grey), &rates)
                .expect("jpy commission");
        assert_eq!(commission.amount.to_string(), "70");
    }
}
