pub mod analytics;
pub mod catalog;
pub mod health;
pub mod track;

use axum::http::Uri;

use crate::error::ApiError;

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route {} not found", uri.path()))
}
