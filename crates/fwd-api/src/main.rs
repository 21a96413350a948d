//! # fwd-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the financial core.
//! Binds to configurable port (default 8080).

use metrics_exporter_prometheus::PrometheusBuilder;

use fwd_api::state::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    // Build configuration from environment.
    let config = AppConfig::from_env();
    tracing::info!(?config, "configuration loaded");
    let port = config.port;

    // Install the Prometheus recorder before any metric is touched.
    let metrics_handle = if config.metrics_enabled {
        Some(PrometheusBuilder::new().install_recorder().map_err(|e| {
            tracing::error!("Metrics recorder installation failed: {e}");
            e
        })?)
    } else {
        None
    };

    // Initialize database pool (absent means in-memory only).
    let db_pool = fwd_api::db::init_pool(config.database_url.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("Database initialization failed: {e}");
            e
        })?;

    let mut state = AppState::with_config(config, db_pool);
    if let Some(handle) = metrics_handle {
        state = state.with_metrics(handle);
    }

    // Hydrate in-memory stores from database (if connected).
    state.hydrate_from_db().await.map_err(|e| {
        tracing::error!("Database hydration failed: {e}");
        e
    })?;

    let app = fwd_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("fwd-api listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
