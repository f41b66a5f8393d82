//! Replay protection for write endpoints.
//!
//! A request carrying an `Idempotency-Key` header runs at most once per key
//! while the stored entry is live. Later requests with the same key get the
//! original response back inside a 409 envelope instead of running the handler
//! again. Storage failures degrade to "no protection" rather than failing the
//! request.

use axum::{
    Json,
    body::{Body, Bytes, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::Value;
use sha2::{Digest, Sha256};
use storyfront_core::{IdempotencyRecord, StoreError};
use storyfront_platform::IdempotentReplayBody;
use tracing::{info, warn};

use super::MAX_BODY_BYTES;
use crate::{AppState, error::ApiError};

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";
pub const MAX_KEY_LEN: usize = 255;

/// Attached to the request extensions while a keyed request is in flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdempotencyContext {
    pub key: String,
    pub method: String,
    pub path: String,
    pub request_hash: String,
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("Idempotency-Key must be visible ASCII".to_string()))?
        .trim();

    if key.is_empty() {
        return Ok(None);
    }
    if key.chars().count() > MAX_KEY_LEN {
        return Err(ApiError::BadRequest(format!(
            "Idempotency-Key must be at most {MAX_KEY_LEN} characters"
        )));
    }

    Ok(Some(key.to_string()))
}

pub fn hash_body(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

fn replay(context: &IdempotencyContext, record: IdempotencyRecord) -> Response {
    if record.request_hash != context.request_hash {
        warn!(
            key = %context.key,
            path = %context.path,
            "idempotency key reused with a different body; serving the cached response"
        );
    } else {
        info!(key = %context.key, path = %context.path, "replaying cached response");
    }

    let original_response = serde_json::from_str(&record.response_body)
        .unwrap_or(Value::String(record.response_body));

    let body = IdempotentReplayBody {
        error: "Duplicate request".to_string(),
        idempotency_key: record.key,
        original_response,
        original_status: record.status_code,
        original_timestamp: record.created_at,
    };

    (StatusCode::CONFLICT, Json(body)).into_response()
}

async fn persist(state: &AppState, context: IdempotencyContext, status: StatusCode, body: &Bytes) {
    let record = IdempotencyRecord::new(
        context.key,
        context.method,
        context.path,
        context.request_hash,
        status.as_u16(),
        String::from_utf8_lossy(body).into_owned(),
        Utc::now(),
    );
    let key = record.key.clone();

    match state.idempotency.create_idempotency_key(record).await {
        Ok(()) => {}
        Err(StoreError::Duplicate(_)) => {
            warn!(%key, "idempotency key stored concurrently by another request");
        }
        Err(err) => warn!(%key, "failed to store idempotency key: {err}"),
    }
}

pub async fn idempotency_guard(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let key = match idempotency_key(req.headers()) {
        Ok(Some(key)) => key,
        Ok(None) => return next.run(req).await,
        Err(err) => return err.into_response(),
    };

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return ApiError::BadRequest(format!("Request body could not be read: {err}"))
                .into_response();
        }
    };

    let context = IdempotencyContext {
        key,
        method: parts.method.to_string(),
        path: parts.uri.path().to_string(),
        request_hash: hash_body(&bytes),
    };

    match state
        .idempotency
        .find_idempotency_key(&context.key, Utc::now())
        .await
    {
        Ok(Some(record)) => return replay(&context, record),
        Ok(None) => {}
        Err(err) => warn!(key = %context.key, "idempotency lookup failed: {err}"),
    }

    let mut req = Request::from_parts(parts, Body::from(bytes));
    req.extensions_mut().insert(context.clone());
    let response = next.run(req).await;

    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return ApiError::Internal(format!("response body could not be buffered: {err}"))
                .into_response();
        }
    };

    persist(&state, context, parts.status, &bytes).await;
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers_with(key: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(IDEMPOTENCY_HEADER, HeaderValue::from_str(key).expect("header"));
        headers
    }

    #[test]
    fn blank_keys_are_ignored() {
        assert_eq!(idempotency_key(&HeaderMap::new()).expect("no header"), None);
        assert_eq!(idempotency_key(&headers_with("   ")).expect("blank"), None);
        assert_eq!(
            idempotency_key(&headers_with(" abc-123 ")).expect("key"),
            Some("abc-123".to_string())
        );
    }

    #[test]
    fn oversized_keys_are_rejected() {
        assert!(idempotency_key(&headers_with(&"k".repeat(MAX_KEY_LEN))).is_ok());

        let err = idempotency_key(&headers_with(&"k".repeat(MAX_KEY_LEN + 1)))
            .expect_err("too long");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn body_hash_is_sha256_hex() {
        assert_eq!(
            hash_body(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(hash_body(b"{\"a\":1}"), hash_body(b"{\"a\":2}"));
    }
}
