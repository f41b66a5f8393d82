use std::{net::SocketAddr, sync::Arc};

use anyhow::Result as AnyResult;
use storyfront_gateway::{AppState, AuthSettings, build_router, shutdown};
use storyfront_memstore::InMemoryStore;
use storyfront_platform::{PgStore, ServiceConfig, connect_database, ensure_schema};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "storyfront_gateway=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env("0.0.0.0:3000")?;
    let auth = AuthSettings {
        secret: config.hmac_secret.clone(),
        max_skew_secs: config.hmac_max_skew_secs,
    };
    if auth.secret.is_none() {
        warn!("HMAC_SECRET is not set; purchase and refund signatures are not verified");
    }

    let (state, pool) = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = connect_database(database_url).await?;
            ensure_schema(&pool).await?;
            let store = Arc::new(PgStore::new(pool.clone()));
            let state = AppState::new(store, config.fx_rates.clone(), auth, "postgres");
            (state, Some(pool))
        }
        None => {
            warn!("DATABASE_URL is not set; events are kept in memory only");
            let store = Arc::new(InMemoryStore::new());
            let state = AppState::new(store, config.fx_rates.clone(), auth, "memory");
            (state, None)
        }
    };

    let router = build_router(state);
    let addr: SocketAddr = config.http_addr.parse()?;
    info!(mode = ?config.mode, "gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(err) = shutdown::wait_for_signal().await {
                error!("shutdown signal handler failed: {err}");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    if let Some(pool) = pool {
        pool.close().await;
    }
    info!("gateway stopped");

    Ok(())
}
