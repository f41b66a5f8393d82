use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use storyfront_platform::DEFAULT_HMAC_MAX_SKEW_SECS;
use tracing::debug;

use super::MAX_BODY_BYTES;
use crate::{AppState, error::ApiError};

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
const SIGNATURE_PREFIX: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug)]
pub struct AuthSettings {
    /// `None` skips verification entirely.
    pub secret: Option<String>,
    pub max_skew_secs: i64,
}

impl AuthSettings {
    pub fn disabled() -> Self {
        Self {
            secret: None,
            max_skew_secs: DEFAULT_HMAC_MAX_SKEW_SECS,
        }
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: Some(secret.into()),
            max_skew_secs: DEFAULT_HMAC_MAX_SKEW_SECS,
        }
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{body}"`, the value clients send in
/// `X-Signature` (optionally prefixed with `sha256=`).
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> Option<String> {
    let mac = signing_mac(secret, timestamp, body)?;
    Some(hex::encode(mac.finalize().into_bytes()))
}

fn signing_mac(secret: &str, timestamp: i64, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Some(mac)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Checks the signature headers against the raw body. The error is the reason
/// for the rejection, which is only ever logged.
pub fn verify_request(
    settings: &AuthSettings,
    headers: &HeaderMap,
    body: &[u8],
    now: i64,
) -> Result<(), &'static str> {
    let Some(secret) = settings.secret.as_deref() else {
        return Ok(());
    };

    let signature = header_value(headers, SIGNATURE_HEADER).ok_or("missing signature header")?;
    let timestamp = header_value(headers, TIMESTAMP_HEADER).ok_or("missing timestamp header")?;
    let timestamp: i64 = timestamp.parse().map_err(|_| "timestamp is not an integer")?;

    if now.abs_diff(timestamp) > settings.max_skew_secs.unsigned_abs() {
        return Err("timestamp outside allowed skew");
    }

    let signature = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
    let expected = hex::decode(signature).map_err(|_| "signature is not hex")?;

    signing_mac(secret, timestamp, body)
        .ok_or("secret is not a usable hmac key")?
        .verify_slice(&expected)
        .map_err(|_| "signature mismatch")
}

pub async fn authenticity_guard(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if state.auth.secret.is_none() {
        return next.run(req).await;
    }

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(path = %parts.uri.path(), "unreadable body on signed route: {err}");
            return ApiError::Unauthorized.into_response();
        }
    };

    if let Err(reason) = verify_request(&state.auth, &parts.headers, &bytes, Utc::now().timestamp())
    {
        debug!(path = %parts.uri.path(), reason, "request signature rejected");
        return ApiError::Unauthorized.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
