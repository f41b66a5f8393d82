use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storyfront_core::{StoreError, ValidationError};
use storyfront_currency::CurrencyError;
use storyfront_platform::ErrorBody;
use storyfront_tracking::TrackingError;
use tracing::error;
use uuid::Uuid;

/// Failure of a request. The variant picked at the failure site decides the
/// status code.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(ValidationError),
    Unprocessable(String),
    Unauthorized,
    NotFound(String),
    DuplicateOrder { existing_purchase_id: Option<Uuid> },
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Validation(_) | ApiError::Unprocessable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::DuplicateOrder { .. } => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(message)
            | ApiError::Unprocessable(message)
            | ApiError::NotFound(message) => ErrorBody::new(message),
            ApiError::Validation(err) => ErrorBody {
                details: Some(err.issues),
                ..ErrorBody::new("Validation failed")
            },
            ApiError::Unauthorized => ErrorBody::new("Unauthorized"),
            ApiError::DuplicateOrder {
                existing_purchase_id,
            } => ErrorBody {
                existing_purchase_id,
                ..ErrorBody::new("Purchase already recorded for this order")
            },
            ApiError::Internal(detail) => {
                error!("request failed: {detail}");
                ErrorBody::new("Internal server error")
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::Validation(err)
    }
}

impl From<CurrencyError> for ApiError {
    fn from(err: CurrencyError) -> Self {
        match err {
            CurrencyError::RateUnavailable { .. } | CurrencyError::InvalidRateTable(_) => {
                ApiError::Internal(err.to_string())
            }
            CurrencyError::InvalidCurrency
            | CurrencyError::UnsupportedCurrency { .. }
            | CurrencyError::InvalidAmount(_) => ApiError::Unprocessable(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownCursor(cursor) => {
                ApiError::BadRequest(format!("cursor {cursor} does not match a story"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<TrackingError> for ApiError {
    fn from(err: TrackingError) -> Self {
        match err {
            TrackingError::Currency(err) => err.into(),
            TrackingError::DuplicateOrder { purchase_id, .. } => ApiError::DuplicateOrder {
                existing_purchase_id: purchase_id,
            },
            TrackingError::PurchaseNotFound(id) => {
                ApiError::NotFound(format!("Purchase {id} not found"))
            }
            TrackingError::Storage(err) => err.into(),
        }
    }
}
