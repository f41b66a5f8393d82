use std::{collections::HashMap, str::FromStr};

use rust_decimal::Decimal;

use crate::{BASE_CURRENCY, Currency, CurrencyError, parse_amount, round_to_minor_unit};

/// Approximate USD value of one unit of `currency`.
pub fn default_rate(currency: Currency) -> Option<Decimal> {
    match currency {
        Currency::Usd => Some(Decimal::ONE),
        Currency::Eur => Some(Decimal::new(108, 2)),
        Currency::Gbp => Some(Decimal::new(127, 2)),
        Currency::Jpy => Some(Decimal::new(67, 4)),
    }
}

/// Caller supplied conversion rates into the base currency, layered over the
/// built-in approximations unless the table is strict.
#[derive(Debug, Clone)]
pub struct RateTable {
    overrides: HashMap<Currency, Decimal>,
    use_defaults: bool,
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            overrides: HashMap::new(),
            use_defaults: true,
        }
    }
}

impl RateTable {
    /// A table that only knows the rates explicitly added to it.
    pub fn strict() -> Self {
        Self {
            overrides: HashMap::new(),
            use_defaults: false,
        }
    }

    pub fn with_rate(mut self, currency: Currency, rate: Decimal) -> Self {
        self.overrides.insert(currency, rate);
        self
    }

    pub fn is_strict(&self) -> bool {
        !self.use_defaults
    }

    pub fn rate_for(&self, currency: Currency) -> Option<Decimal> {
        self.overrides.get(&currency).copied().or_else(|| {
            if self.use_defaults {
                default_rate(currency)
            } else {
                None
            }
        })
    }

    /// Parses `EUR=1.09,GBP=1.26` into overrides on top of `self`.
    pub fn merge_spec(mut self, spec: &str) -> Result<Self, CurrencyError> {
        for entry in spec.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            let (code, rate) = entry
                .split_once('=')
                .ok_or_else(|| CurrencyError::InvalidRateTable(entry.to_string()))?;
            let currency = Currency::from_str(code)?;
            let rate = parse_amount(rate)
                .map_err(|_| CurrencyError::InvalidRateTable(entry.to_string()))?;
            if rate <= Decimal::ZERO {
                return Err(CurrencyError::InvalidRateTable(entry.to_string()));
            }
            self.overrides.insert(currency, rate);
        }

        Ok(self)
    }
}

impl FromStr for RateTable {
    type Err = CurrencyError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        RateTable::default().merge_spec(spec)
    }
}

/// Converts `amount` into [`BASE_CURRENCY`], rounded to its minor unit.
/// Base-currency amounts are returned unchanged.
pub fn convert_to_base_currency(
    amount: Decimal,
    from: Currency,
    rates: &RateTable,
) -> Result<Decimal, CurrencyError> {
    if from == BASE_CURRENCY {
        return Ok(amount);
    }

    let rate = rates
        .rate_for(from)
        .ok_or(CurrencyError::RateUnavailable { from })?;
    let converted = amount
        .checked_mul(rate)
        .ok_or_else(|| CurrencyError::InvalidAmount(amount.to_string()))?;

    Ok(round_to_minor_unit(converted, BASE_CURRENCY))
}
