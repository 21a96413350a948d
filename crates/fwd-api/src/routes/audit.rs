//! # Audit Log API
//!
//! Read-only access to the hash-chained audit trail. Both endpoints require
//! the `MANAGER` role.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::IntoParams;

use fwd_core::{AuditEntry, ChainIntegrity, Role};

use crate::auth::{require_role, CallerIdentity};
use crate::error::AppError;
use crate::extractors::extract_query;
use crate::state::AppState;

/// Entries returned when no limit is given.
pub const DEFAULT_LIMIT: usize = 100;
/// Upper bound on `limit`.
pub const MAX_LIMIT: usize = 1000;

/// Filters for the audit listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct AuditQuery {
    /// e.g. `invoice`, `payment`, `shipment`, `customer`.
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    /// Defaults to 100, capped at 1000.
    pub limit: Option<usize>,
}

/// Build the audit router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/audit", get(list_entries))
        .route("/v1/audit/verify", get(verify_chain))
}

/// GET /v1/audit: Audit entries, newest first.
#[utoipa::path(
    get,
    path = "/v1/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries", body = serde_json::Value),
        (status = 403, description = "MANAGER role required", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
pub async fn list_entries(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> Result<Json<Vec<AuditEntry>>, AppError> {
    require_role(&caller, Role::Manager)?;
    let query = extract_query(query)?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let trail = state.audit.lock().await;
    let entries = trail
        .entries_for(query.entity_type.as_deref(), query.entity_id.as_deref(), limit)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(entries))
}

/// GET /v1/audit/verify: Walk the chain and report broken links.
#[utoipa::path(
    get,
    path = "/v1/audit/verify",
    responses(
        (status = 200, description = "Chain integrity report", body = serde_json::Value),
        (status = 403, description = "MANAGER role required", body = crate::error::ErrorBody),
    ),
    tag = "audit"
)]
pub async fn verify_chain(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<ChainIntegrity>, AppError> {
    require_role(&caller, Role::Manager)?;
    let report = state.audit.lock().await.verify_chain();
    if !report.chain_valid {
        tracing::error!(
            broken_links = report.broken_links,
            first_broken = ?report.first_broken,
            "audit chain verification failed"
        );
    }
    Ok(Json(report))
}
