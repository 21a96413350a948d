//! # Shipment API
//!
//! Shipments are owned by operations; this service registers the minimum it
//! needs to validate references and owns only `invoiceStatus`, the rollup of
//! the shipment's invoices.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use fwd_core::{AuditAction, NewAuditEntry, ShipmentId, Timestamp, ValidationError};
use fwd_ledger::{Invoice, NewShipment, PaidStatusSummary, Shipment};
use fwd_state::InvoiceStatus;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::reconcile::{commit_audited, run_cascade, PendingWrite};
use crate::state::AppState;

/// Request to register a shipment.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateShipmentRequest {
    /// Booking or job number.
    pub reference: String,
    #[serde(default)]
    pub customer_name: Option<String>,
}

impl Validate for CreateShipmentRequest {
    type Output = NewShipment;

    fn validate(self) -> Result<NewShipment, ValidationError> {
        Ok(NewShipment {
            reference: self.reference,
            customer_name: self.customer_name,
        })
    }
}

/// A shipment with its invoices (effective status).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentDetail {
    #[serde(flatten)]
    pub shipment: Shipment,
    pub invoices: Vec<Invoice>,
}

/// Result of an on-demand rollup refresh.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecalculateResponse {
    pub shipment_id: Uuid,
    /// The rollup after the refresh.
    #[schema(value_type = String)]
    pub invoice_status: InvoiceStatus,
    /// Per-invoice resolver output.
    #[schema(value_type = Vec<Object>)]
    pub invoices: Vec<PaidStatusSummary>,
}

/// Build the shipments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/shipments", post(create_shipment).get(list_shipments))
        .route("/v1/shipments/{id}", get(get_shipment))
        .route("/v1/shipments/{id}/invoices", get(list_shipment_invoices))
        .route("/v1/shipments/{id}/recalculate", post(recalculate))
}

fn find_shipment(state: &AppState, id: Uuid) -> Result<Shipment, AppError> {
    state
        .shipments
        .get(&ShipmentId::from_uuid(id))
        .ok_or_else(|| AppError::NotFound(format!("shipment {id}")))
}

fn invoices_of(state: &AppState, shipment_id: ShipmentId, now: Timestamp) -> Vec<Invoice> {
    let mut invoices: Vec<Invoice> = state
        .invoices
        .list_where(|i| i.shipment_id == shipment_id)
        .iter()
        .map(|i| i.with_effective_status(now))
        .collect();
    invoices.sort_by(|a, b| {
        a.issue_date
            .cmp(&b.issue_date)
            .then(a.created_at.cmp(&b.created_at))
    });
    invoices
}

/// POST /v1/shipments: Register a shipment.
#[utoipa::path(
    post,
    path = "/v1/shipments",
    request_body = CreateShipmentRequest,
    responses(
        (status = 201, description = "Shipment registered", body = serde_json::Value),
        (status = 400, description = "Invalid input", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
pub async fn create_shipment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateShipmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Shipment>), AppError> {
    let new = extract_validated_json(body)?;
    let now = Timestamp::now();
    let shipment = Shipment::create(new, now)?;

    let entry = NewAuditEntry::new(
        caller.actor,
        AuditAction::Create,
        "shipment",
        format!("Registered shipment {}", shipment.reference),
    )
    .entity_id(shipment.id)
    .entity_ref(shipment.reference.clone())
    .meta(json!({ "customerName": shipment.customer_name }));
    commit_audited(&state, vec![entry], now, PendingWrite::Shipment(&shipment)).await?;
    state.shipments.insert(shipment.id, shipment.clone());

    tracing::info!(shipment_id = %shipment.id, reference = %shipment.reference, "shipment registered");
    Ok((StatusCode::CREATED, Json(shipment)))
}

/// GET /v1/shipments: List shipments, newest first.
#[utoipa::path(
    get,
    path = "/v1/shipments",
    responses((status = 200, description = "Shipments", body = serde_json::Value)),
    tag = "shipments"
)]
pub async fn list_shipments(State(state): State<AppState>) -> Json<Vec<Shipment>> {
    let mut shipments = state.shipments.list();
    shipments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(shipments)
}

/// GET /v1/shipments/{id}: A shipment with its invoices.
#[utoipa::path(
    get,
    path = "/v1/shipments/{id}",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment with its invoices", body = serde_json::Value),
        (status = 404, description = "Shipment not found", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
pub async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ShipmentDetail>, AppError> {
    let shipment = find_shipment(&state, id)?;
    let invoices = invoices_of(&state, shipment.id, Timestamp::now());
    Ok(Json(ShipmentDetail { shipment, invoices }))
}

/// GET /v1/shipments/{id}/invoices: Invoices of a shipment.
#[utoipa::path(
    get,
    path = "/v1/shipments/{id}/invoices",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Invoices with effective status", body = serde_json::Value),
        (status = 404, description = "Shipment not found", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
pub async fn list_shipment_invoices(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let shipment = find_shipment(&state, id)?;
    Ok(Json(invoices_of(&state, shipment.id, Timestamp::now())))
}

/// POST /v1/shipments/{id}/recalculate: Re-resolve every invoice and
/// refresh the rollup.
///
/// OVERDUE depends on the clock; this is how a rollup catches up with due
/// dates that have passed since the last write.
#[utoipa::path(
    post,
    path = "/v1/shipments/{id}/recalculate",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Rollup refreshed", body = RecalculateResponse),
        (status = 404, description = "Shipment not found", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
pub async fn recalculate(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RecalculateResponse>, AppError> {
    let shipment = find_shipment(&state, id)?;
    let (invoice_status, invoices) = run_cascade(&state, shipment.id, |ledger, now| {
        let ids: Vec<_> = ledger.invoices().map(|i| i.id).collect();
        let summaries = ids
            .into_iter()
            .filter_map(|invoice_id| ledger.recalc_invoice_paid_status(invoice_id, now))
            .collect::<Vec<_>>();
        Ok((ledger.recalc_shipment_invoice_status(now), summaries))
    })
    .await?;

    Ok(Json(RecalculateResponse {
        shipment_id: id,
        invoice_status,
        invoices,
    }))
}
