//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI 3.1 spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Freight Back Office API",
        version = "0.1.0",
        description = "Invoices, payments, shipment invoice rollups, compliance review and the hash-chained audit log."
    ),
    paths(
        // Shipments
        crate::routes::shipments::create_shipment,
        crate::routes::shipments::list_shipments,
        crate::routes::shipments::get_shipment,
        crate::routes::shipments::list_shipment_invoices,
        crate::routes::shipments::recalculate,
        // Invoices
        crate::routes::invoices::create_invoice,
        crate::routes::invoices::list_invoices,
        crate::routes::invoices::get_invoice,
        crate::routes::invoices::update_invoice,
        crate::routes::invoices::delete_invoice,
        crate::routes::invoices::preview_totals,
        // Payments
        crate::routes::payments::create_payment,
        crate::routes::payments::list_payments,
        crate::routes::payments::get_payment,
        crate::routes::payments::update_payment,
        crate::routes::payments::delete_payment,
        // Compliance
        crate::routes::compliance::create_task,
        crate::routes::compliance::list_tasks,
        crate::routes::compliance::get_task,
        crate::routes::compliance::decide_task,
        // Audit
        crate::routes::audit::list_entries,
        crate::routes::audit::verify_chain,
    ),
    components(schemas(
        // Error types
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        // Shipment DTOs
        crate::routes::shipments::CreateShipmentRequest,
        crate::routes::shipments::RecalculateResponse,
        // Invoice DTOs
        crate::routes::invoices::CreateInvoiceRequest,
        crate::routes::invoices::UpdateInvoiceRequest,
        crate::routes::invoices::TotalsRequest,
        // Payment DTOs
        crate::routes::payments::CreatePaymentRequest,
        crate::routes::payments::UpdatePaymentRequest,
        crate::routes::payments::PaymentCreated,
        // Compliance DTOs
        crate::routes::compliance::CreateTaskRequest,
        crate::routes::compliance::DecisionRequest,
        crate::routes::compliance::DecisionResponse,
    )),
    tags(
        (name = "shipments", description = "Shipment registry and invoice status rollup"),
        (name = "invoices", description = "Invoices, totals and TDS"),
        (name = "payments", description = "Payment ledger"),
        (name = "compliance", description = "Compliance review tasks"),
        (name = "audit", description = "Audit log"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
