//! Betting-trends query service.
//!
//! Architecture:
//! - Tokio async runtime, axum HTTP front end
//! - ClickHouse HTTP client with rate limiting and retries
//! - Typed query dispatchers over a team-perspective view of game results
//! - In-process TTL cache in front of every query

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use trend_engine::api::{ClickHouseClient, ClickHouseConfig, QueryExecutor};
use trend_engine::auth::ClickHouseAuth;
use trend_engine::config::Settings;
use trend_engine::data::schema::ensure_schema;
use trend_engine::query::service::{QueryService, ServiceLimits};
use trend_engine::server::{build_router, AppState};
use trend_engine::state::QueryCache;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration.
    let settings = Settings::from_env();

    // Initialize logging.
    init_logging(&settings);

    info!("=== Trend Engine ===");
    info!(
        clickhouse_url = %settings.clickhouse_url,
        database = %settings.clickhouse_database,
        cache_ttl_secs = settings.query_cache_ttl_secs,
        "Configuration loaded"
    );

    // Validate settings.
    if let Err(errors) = settings.validate() {
        for e in &errors {
            error!(error = %e, "Configuration error");
        }
        anyhow::bail!("Configuration validation failed");
    }

    // Initialize auth and client.
    let auth = ClickHouseAuth::new(
        &settings.clickhouse_user,
        &settings.clickhouse_password,
        settings.auth_scheme(),
    )?;
    info!(user = %auth.user(), scheme = ?settings.auth_scheme(), "Authentication initialized");

    let client = ClickHouseClient::new(auth, &ClickHouseConfig::from_settings(&settings))?;
    let executor: Arc<dyn QueryExecutor> = Arc::new(client);

    match executor.ping().await {
        Ok(()) => info!("ClickHouse reachable"),
        Err(e) => warn!(error = %e, "ClickHouse ping failed; serving degraded"),
    }

    if settings.init_schema {
        ensure_schema(executor.as_ref()).await?;
    }

    // =========================================================================
    // Query service + HTTP server
    // =========================================================================
    let cache = QueryCache::new(settings.cache_ttl(), settings.query_cache_max_entries);
    let service = Arc::new(QueryService::new(
        executor,
        cache,
        ServiceLimits::from_settings(&settings),
    ));
    let app = build_router(AppState::new(service, &settings.api_token));

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, auth = !settings.api_token.is_empty(), "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

/// Initialize tracing subscriber with env filter and optional JSON output.
fn init_logging(settings: &Settings) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    if settings.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
