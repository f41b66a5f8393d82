pub mod config;
pub mod contracts;
pub mod db;
pub mod pg_store;

pub use config::{DEFAULT_HMAC_MAX_SKEW_SECS, RuntimeMode, ServiceConfig};
pub use contracts::{
    CreatorListResponse, ErrorBody, HealthFeatures, HealthResponse, IdempotentReplayBody,
};
pub use db::{connect_database, ensure_schema};
pub use pg_store::PgStore;
