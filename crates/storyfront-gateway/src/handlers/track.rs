use axum::{Json, body::Bytes, extract::State};
use serde_json::Value;
use storyfront_core::schemas::{
    validate_cta, validate_impression, validate_purchase, validate_refund,
};
use storyfront_tracking::{EventReceipt, PurchaseReceipt, RefundReceipt};

use crate::{AppState, error::ApiError};

// Handlers take raw bytes so the guards and the schema see the same body.
fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body)
        .map_err(|err| ApiError::BadRequest(format!("Malformed JSON body: {err}")))
}

pub async fn track_impression(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<EventReceipt>, ApiError> {
    let input = validate_impression(&parse_body(&body)?)?;
    let receipt = state.tracker.record_impression(input).await?;
    Ok(Json(receipt))
}

pub async fn track_cta(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<EventReceipt>, ApiError> {
    let input = validate_cta(&parse_body(&body)?)?;
    let receipt = state.tracker.record_cta(input).await?;
    Ok(Json(receipt))
}

pub async fn track_purchase(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<PurchaseReceipt>, ApiError> {
    let input = validate_purchase(&parse_body(&body)?)?;
    let receipt = state.tracker.record_purchase(input).await?;
    Ok(Json(receipt))
}

pub async fn track_refund(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RefundReceipt>, ApiError> {
    let input = validate_refund(&parse_body(&body)?)?;
    let receipt = state.tracker.record_refund(input).await?;
    Ok(Json(receipt))
}
