//! medconsult server

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medconsult::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db,
};

/// Expired sessions and stale login attempts are swept this often
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "medconsult=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting medconsult {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let cache = create_cache(&config.cache);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let admin = config.admin.clone();
    let state = AppState::new(pool, config, cache);

    if let Some(user) = state.user_service.ensure_admin(&admin).await? {
        tracing::info!("Bootstrap admin {} created", user.email);
    }

    {
        let user_service = state.user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                match user_service.cleanup_expired_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!("Removed {} expired session(s)", removed),
                    Err(e) => tracing::warn!("Session sweep failed: {}", e),
                }
                user_service.rate_limiter().cleanup().await;
            }
        });
    }

    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
