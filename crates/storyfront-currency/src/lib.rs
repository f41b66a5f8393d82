//! Currency rounding, validation, conversion and display for commerce amounts.
//!
//! Every function here is pure. Amounts are `Decimal`s and currencies are the
//! closed [`Currency`] set, so rounding never has to guess a precision for an
//! unknown code.

mod rates;

use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};
use rusty_money::{Money, iso};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use rates::{RateTable, convert_to_base_currency, default_rate};

/// Currency every purchase and refund is normalized into for reporting.
pub const BASE_CURRENCY: Currency = Currency::Usd;

/// Upper bound, in major units, for a single purchase or refund amount.
pub const MAX_AMOUNT_MAJOR_UNITS: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
}

impl Currency {
    pub const ALL: [Currency; 4] = [Currency::Usd, Currency::Eur, Currency::Gbp, Currency::Jpy];

    pub fn code(self) -> &'static str {
        self.iso().iso_alpha_code
    }

    /// Number of fractional digits the currency is settled in.
    pub fn minor_units(self) -> u32 {
        self.iso().exponent
    }

    fn iso(self) -> &'static iso::Currency {
        match self {
            Currency::Usd => iso::USD,
            Currency::Eur => iso::EUR,
            Currency::Gbp => iso::GBP,
            Currency::Jpy => iso::JPY,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        assert_supported_currency(Some(code))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurrencyError {
    #[error("Currency code is required")]
    InvalidCurrency,
    #[error("Unsupported currency: {code}. Supported currencies: {supported}", supported = supported_codes())]
    UnsupportedCurrency { code: String },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("No conversion rate available from {from} to {to}", to = BASE_CURRENCY)]
    RateUnavailable { from: Currency },
    #[error("Invalid rate table entry: {0}")]
    InvalidRateTable(String),
}

/// Comma separated list of the supported codes, e.g. `USD, EUR, GBP, JPY`.
pub fn supported_codes() -> String {
    Currency::ALL
        .iter()
        .map(|currency| currency.code())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Normalizes a client supplied code to a supported [`Currency`].
pub fn assert_supported_currency(code: Option<&str>) -> Result<Currency, CurrencyError> {
    let code = code
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(CurrencyError::InvalidCurrency)?;
    let normalized = code.to_ascii_uppercase();

    Currency::ALL
        .iter()
        .copied()
        .find(|currency| currency.code() == normalized)
        .ok_or(CurrencyError::UnsupportedCurrency { code: normalized })
}

/// Rounds half away from zero to the currency's minor unit and pins the scale
/// to exactly that many digits, so `100` EUR becomes `100.00`.
pub fn round_to_minor_unit(amount: Decimal, currency: Currency) -> Decimal {
    let digits = currency.minor_units();
    let mut rounded = amount.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(digits);
    rounded
}

/// String-code variant of [`round_to_minor_unit`]. Unknown codes are an error.
pub fn round_code_to_minor_unit(amount: Decimal, code: &str) -> Result<Decimal, CurrencyError> {
    let currency = assert_supported_currency(Some(code))?;
    Ok(round_to_minor_unit(amount, currency))
}

pub fn parse_amount(raw: &str) -> Result<Decimal, CurrencyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CurrencyError::InvalidAmount(raw.to_string()));
    }

    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| CurrencyError::InvalidAmount(raw.to_string()))
}

/// Accepts a JSON number or a numeric string.
pub fn coerce_amount(value: &Value) -> Result<Decimal, CurrencyError> {
    match value {
        Value::Number(number) => parse_amount(&number.to_string()),
        Value::String(raw) => parse_amount(raw),
        other => Err(CurrencyError::InvalidAmount(other.to_string())),
    }
}

/// Renders the rounded amount with the currency's symbol, grouping and exactly
/// its minor-unit digit count.
pub fn format_for_display(amount: Decimal, currency: Currency) -> String {
    let rounded = round_to_minor_unit(amount, currency);
    Money::from_decimal(rounded, currency.iso()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(raw: &str) -> Decimal {
        Decimal::from_str(raw).expect("decimal literal")
    }

    #[test]
    fn rounding_is_idempotent_for_every_currency() {
        let samples = ["0.004", "10.005", "99.999", "572000.4", "1234.5678", "-2.5"];
        for currency in Currency::ALL {
            for sample in samples {
                let once = round_to_minor_unit(dec(sample), currency);
                let twice = round_to_minor_unit(once, currency);
                assert_eq!(once, twice, "{sample} {currency}");
                assert_eq!(once.scale(), twice.scale(), "{sample} {currency}");
            }
        }
    }

    #[test]
    fn jpy_rounds_to_whole_units() {
        let rounded = round_to_minor_unit(dec("572000.4"), Currency::Jpy);
        assert_eq!(rounded, dec("572000"));
        assert_eq!(rounded.to_string(), "572000");

        let formatted = format_for_display(dec("572000.4"), Currency::Jpy);
        assert!(!formatted.contains('.'), "{formatted}");
        assert!(formatted.contains("572"), "{formatted}");
    }

    #[test]
    fn two_digit_currencies_round_ties_away_from_zero() {
        // Decimal input is exact, so the .005 tie is a real tie and rounds up.
        assert_eq!(round_to_minor_unit(dec("10.005"), Currency::Usd), dec("10.01"));
        assert_eq!(round_to_minor_unit(dec("10.004"), Currency::Usd), dec("10.00"));
        assert_eq!(round_to_minor_unit(dec("-10.005"), Currency::Eur), dec("-10.01"));
        assert_eq!(round_to_minor_unit(dec("99.999"), Currency::Gbp).to_string(), "100.00");
    }

    #[test]
    fn rounding_pads_scale_to_minor_units() {
        assert_eq!(round_to_minor_unit(dec("100"), Currency::Eur).to_string(), "100.00");
        assert_eq!(round_to_minor_unit(dec("12.5"), Currency::Usd).to_string(), "12.50");
    }

    #[test]
    fn code_rounding_rejects_unknown_codes() {
        assert_eq!(round_code_to_minor_unit(dec("1.234"), "gbp"), Ok(dec("1.23")));
        assert_eq!(
            round_code_to_minor_unit(dec("1.234"), "CHF"),
            Err(CurrencyError::UnsupportedCurrency {
                code: "CHF".to_string()
            })
        );
    }

    #[test]
    fn currency_lookup_is_case_insensitive() {
        assert_eq!(assert_supported_currency(Some("usd")), Ok(Currency::Usd));
        assert_eq!(assert_supported_currency(Some(" Jpy ")), Ok(Currency::Jpy));
        assert_eq!("eur".parse::<Currency>(), Ok(Currency::Eur));
    }

    #[test]
    fn unsupported_currency_lists_supported_set() {
        let err = assert_supported_currency(Some("xyz")).expect_err("XYZ is not supported");
        assert_eq!(
            err,
            CurrencyError::UnsupportedCurrency {
                code: "XYZ".to_string()
            }
        );
        assert!(err.to_string().contains("USD, EUR, GBP, JPY"), "{err}");
    }

    #[test]
    fn missing_currency_is_invalid() {
        assert_eq!(assert_supported_currency(None), Err(CurrencyError::InvalidCurrency));
        assert_eq!(assert_supported_currency(Some("  ")), Err(CurrencyError::InvalidCurrency));
    }

    #[test]
    fn amounts_coerce_from_numbers_and_strings() {
        assert_eq!(coerce_amount(&serde_json::json!(99.999)), Ok(dec("99.999")));
        assert_eq!(coerce_amount(&serde_json::json!(100)), Ok(dec("100")));
        assert_eq!(coerce_amount(&serde_json::json!("42.10")), Ok(dec("42.10")));
        assert_eq!(coerce_amount(&serde_json::json!("1e2")), Ok(dec("100")));
        assert!(coerce_amount(&serde_json::json!("ten")).is_err());
        assert!(coerce_amount(&serde_json::json!(true)).is_err());
        assert!(coerce_amount(&serde_json::json!(null)).is_err());
    }

    #[test]
    fn display_keeps_trailing_zeros() {
        assert_eq!(format_for_display(dec("2000"), Currency::Usd), "$2,000.00");
        assert_eq!(format_for_display(dec("10.5"), Currency::Usd), "$10.50");
    }
}
