//! # fwd-api: Axum API Service for the Freight Back Office Financial Core
//!
//! ## API Surface
//!
//! | Prefix                   | Module                    | Domain                      |
//! |--------------------------|---------------------------|-----------------------------|
//! | `/v1/shipments/*`        | [`routes::shipments`]     | Shipments + invoice rollup  |
//! | `/v1/invoices/*`         | [`routes::invoices`]      | Invoices, totals, TDS       |
//! | `/v1/payments/*`         | [`routes::payments`]      | Payment ledger              |
//! | `/v1/compliance/tasks/*` | [`routes::compliance`]    | Compliance review           |
//! | `/v1/audit/*`            | [`routes::audit`]         | Audit log (MANAGER+)        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! ## Write Path
//!
//! Payment and invoice writes run through [`reconcile::run_cascade`]: the
//! shipment is locked, the cascade (payment → invoice status → shipment
//! rollup) runs on a snapshot, and the resulting change set is committed to
//! Postgres together with its audit entries before it becomes visible.
//!
//! ## OpenAPI
//!
//! Auto-generated OpenAPI 3.1 spec via utoipa derive macros at `/openapi.json`.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod reconcile;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes (`/health/*`) and `/metrics` are mounted outside the auth
/// middleware so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        signer: state.signer.clone(),
    };

    // Authenticated API routes.
    let api = Router::new()
        .merge(routes::shipments::router())
        .merge(routes::invoices::router())
        .merge(routes::payments::router())
        .merge(routes::compliance::router())
        .merge(routes::audit::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    // Unauthenticated probes and scrape endpoint.
    let mut public = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness));
    if state.config.metrics_enabled && state.metrics.is_some() {
        public = public.route("/metrics", get(render_metrics));
    }

    Router::new().merge(public.with_state(state)).merge(api)
}

/// Liveness probe. Always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe. Returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}

/// GET /metrics: Prometheus text exposition.
async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
