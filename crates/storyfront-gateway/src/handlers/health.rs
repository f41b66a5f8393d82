use axum::{Json, extract::State};
use chrono::Utc;
use storyfront_platform::{HealthFeatures, HealthResponse};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        features: HealthFeatures {
            hmac: state.auth.secret.is_some(),
            idempotency: true,
            storage: state.storage.to_string(),
        },
    })
}
