//! HTTP surface of the commerce backend: routing, request guards and the
//! shared application state.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod shutdown;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use storyfront_core::{CatalogStore, CommerceStore, IdempotencyStore};
use storyfront_currency::RateTable;
use storyfront_tracking::CommerceTracker;

pub use error::ApiError;
pub use middleware::authenticity::AuthSettings;

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<CommerceTracker>,
    pub catalog: Arc<dyn CatalogStore>,
    pub idempotency: Arc<dyn IdempotencyStore>,
    pub auth: AuthSettings,
    /// Reported by the health endpoint, e.g. `postgres` or `memory`.
    pub storage: &'static str,
}

impl AppState {
    /// Wires every storage interface to the same backend.
    pub fn new<S>(store: Arc<S>, rates: RateTable, auth: AuthSettings, storage: &'static str) -> Self
    where
        S: CommerceStore + CatalogStore + IdempotencyStore + 'static,
    {
        let tracker = CommerceTracker::new(store.clone(), store.clone(), rates);

        Self {
            tracker: Arc::new(tracker),
            catalog: store.clone(),
            idempotency: store,
            auth,
            storage,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let track = Router::new()
        .route("/api/track/purchase", post(handlers::track::track_purchase))
        .route("/api/track/refund", post(handlers::track::track_refund))
        .route_layer(from_fn_with_state(
            state.clone(),
            middleware::authenticity::authenticity_guard,
        ))
        .route(
            "/api/track/impression",
            post(handlers::track::track_impression),
        )
        .route("/api/track/cta", post(handlers::track::track_cta))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::idempotency::idempotency_guard,
        ));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/creators", get(handlers::catalog::list_creators))
        .route("/api/stories", get(handlers::catalog::list_stories))
        .route(
            "/api/analytics/dashboard",
            get(handlers::analytics::dashboard),
        )
        .merge(track)
        .fallback(handlers::not_found)
        .with_state(state)
}
