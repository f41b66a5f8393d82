//! Structural validation of commerce event payloads.
//!
//! Validators read a raw `serde_json::Value`, collect every field problem
//! instead of stopping at the first one, and hand back typed inputs. Currency
//! codes are checked here as well as in the currency engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use storyfront_currency::{
    Currency, MAX_AMOUNT_MAJOR_UNITS, assert_supported_currency, coerce_amount,
    round_to_minor_unit,
};
use thiserror::Error;

use crate::events::{CtaInput, ImpressionInput, PurchaseInput, RefundInput};

const MAX_IDENTIFIER_LEN: usize = 255;
const MAX_REASON_LEN: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed on {} field(s)", .issues.len())]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        Self {
            issues: vec![FieldIssue::new(field, message)],
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }
}

pub fn validate_impression(body: &Value) -> Result<ImpressionInput, ValidationError> {
    let mut fields = FieldReader::new(body)?;
    let story_id = fields.required_string("storyId", MAX_IDENTIFIER_LEN);
    let user_id = fields.optional_string("userId");

    fields.finish()?;
    Ok(ImpressionInput {
        story_id: story_id.unwrap_or_default(),
        user_id,
    })
}

pub fn validate_cta(body: &Value) -> Result<CtaInput, ValidationError> {
    let mut fields = FieldReader::new(body)?;
    let story_id = fields.required_string("storyId", MAX_IDENTIFIER_LEN);
    let product_id = fields.optional_string("productId");
    let user_id = fields.optional_string("userId");

    fields.finish()?;
    Ok(CtaInput {
        story_id: story_id.unwrap_or_default(),
        product_id,
        user_id,
    })
}

pub fn validate_purchase(body: &Value) -> Result<PurchaseInput, ValidationError> {
    let mut fields = FieldReader::new(body)?;
    let order_id = fields.required_string("orderId", MAX_IDENTIFIER_LEN);
    let product_id = fields.required_string("productId", MAX_IDENTIFIER_LEN);
    let amount = fields.amount("amount");
    let currency = fields.currency("currency");
    let amount = fields.settled_amount("amount", amount, currency);
    let user_id = fields.optional_string("userId");
    let referrer_story_id = fields.optional_string("referrerStoryId");

    fields.finish()?;
    match (order_id, product_id, amount, currency) {
        (Some(order_id), Some(product_id), Some(amount), Some(currency)) => Ok(PurchaseInput {
            order_id,
            product_id,
            amount,
            currency,
            user_id,
            referrer_story_id,
        }),
        _ => Err(ValidationError::single("body", "incomplete purchase payload")),
    }
}

pub fn validate_refund(body: &Value) -> Result<RefundInput, ValidationError> {
    let mut fields = FieldReader::new(body)?;
    let purchase_id = fields.required_string("purchaseId", MAX_IDENTIFIER_LEN);
    let amount = fields.amount("amount");
    let currency = fields.currency("currency");
    let amount = fields.settled_amount("amount", amount, currency);
    let reason = fields.required_string("reason", MAX_REASON_LEN);
    let user_id = fields.optional_string("userId");

    fields.finish()?;
    match (purchase_id, amount, currency, reason) {
        (Some(purchase_id), Some(amount), Some(currency), Some(reason)) => Ok(RefundInput {
            purchase_id,
            amount,
            currency,
            reason,
            user_id,
        }),
        _ => Err(ValidationError::single("body", "incomplete refund payload")),
    }
}

struct FieldReader<'a> {
    object: &'a Map<String, Value>,
    issues: Vec<FieldIssue>,
}

impl<'a> FieldReader<'a> {
    fn new(body: &'a Value) -> Result<Self, ValidationError> {
        let object = body
            .as_object()
            .ok_or_else(|| ValidationError::single("body", "must be a JSON object"))?;

        Ok(Self {
            object,
            issues: Vec::new(),
        })
    }

    fn present(&self, field: &str) -> Option<&'a Value> {
        self.object.get(field).filter(|value| !value.is_null())
    }

    fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.issues.push(FieldIssue::new(field, message));
    }

    fn required_string(&mut self, field: &str, max_len: usize) -> Option<String> {
        let Some(value) = self.present(field) else {
            self.reject(field, "is required");
            return None;
        };
        let Some(raw) = value.as_str() else {
            self.reject(field, "must be a string");
            return None;
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.reject(field, "must not be empty");
            return None;
        }
        if trimmed.chars().count() > max_len {
            self.reject(field, format!("must be at most {max_len} characters"));
            return None;
        }

        Some(trimmed.to_string())
    }

    /// Empty strings count as absent.
    fn optional_string(&mut self, field: &str) -> Option<String> {
        let value = self.present(field)?;
        let Some(raw) = value.as_str() else {
            self.reject(field, "must be a string");
            return None;
        };

        let trimmed = raw.trim();
        if trimmed.chars().count() > MAX_IDENTIFIER_LEN {
            self.reject(
                field,
                format!("must be at most {MAX_IDENTIFIER_LEN} characters"),
            );
            return None;
        }

        Some(trimmed.to_string()).filter(|value| !value.is_empty())
    }

    fn amount(&mut self, field: &str) -> Option<Decimal> {
        let Some(value) = self.present(field) else {
            self.reject(field, "is required");
            return None;
        };
        let Ok(amount) = coerce_amount(value) else {
            self.reject(field, "must be a number");
            return None;
        };

        if amount <= Decimal::ZERO {
            self.reject(field, "must be greater than 0");
            return None;
        }
        if amount > Decimal::from(MAX_AMOUNT_MAJOR_UNITS) {
            self.reject(field, format!("must be at most {MAX_AMOUNT_MAJOR_UNITS}"));
            return None;
        }

        Some(amount)
    }

    fn currency(&mut self, field: &str) -> Option<Currency> {
        let Some(value) = self.present(field) else {
            self.reject(field, "is required");
            return None;
        };
        let Some(code) = value.as_str() else {
            self.reject(field, "must be a string");
            return None;
        };

        match assert_supported_currency(Some(code)) {
            Ok(currency) => Some(currency),
            Err(err) => {
                self.reject(field, err.to_string());
                None
            }
        }
    }

    /// Rejects amounts that round to zero in their currency, such as 0.001 USD.
    fn settled_amount(
        &mut self,
        field: &str,
        amount: Option<Decimal>,
        currency: Option<Currency>,
    ) -> Option<Decimal> {
        let (amount, currency) = match (amount, currency) {
            (Some(amount), Some(currency)) => (amount, currency),
            (amount, _) => return amount,
        };

        if round_to_minor_unit(amount, currency).is_zero() {
            self.reject(field, "must be greater than 0");
            return None;
        }

        Some(amount)
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                issues: self.issues,
            })
        }
    }
}
