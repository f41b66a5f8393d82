use axum::{Json, extract::State};
use storyfront_tracking::DashboardSummary;

use crate::{AppState, error::ApiError};

pub async fn dashboard(State(state): State<AppState>) -> Result<Json<DashboardSummary>, ApiError> {
    let summary = state.tracker.dashboard().await?;
    Ok(Json(summary))
}
