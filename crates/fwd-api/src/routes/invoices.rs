//! # Invoice API
//!
//! Every write goes through [`run_cascade`]: the invoice is validated, its
//! totals computed, the paid-status resolver and the shipment rollup run,
//! and the whole change set is committed at once.
//!
//! Reads always present the effective status (OVERDUE derived from the due
//! date at request time), never the stored one.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use fwd_core::{parse_calendar_date, InvoiceId, ShipmentId, Timestamp, ValidationError};
use fwd_ledger::{
    calculate, validate_line_items, validate_tds_rate, Invoice, InvoiceDetail, InvoicePatch, InvoiceTotals, LineItem,
    NewInvoice,
};
use fwd_state::InvoiceStatus;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{
    double_option, extract_json, extract_query, extract_validated_json, parse_opt, Validate,
};
use crate::reconcile::run_cascade;
use crate::state::AppState;

// -- DTOs ---------------------------------------------------------------------

/// Request to create an invoice.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub shipment_id: Uuid,
    /// Generated from the issue date when omitted.
    #[serde(default)]
    pub invoice_number: Option<String>,
    /// Three-letter code; defaults to INR.
    #[serde(default)]
    pub currency: Option<String>,
    /// `YYYY-MM-DD`; defaults to today (UTC).
    #[serde(default)]
    pub issue_date: Option<String>,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<LineItem>,
    /// TDS percentage, `>= 0`.
    #[serde(default)]
    pub tds_rate: Option<Decimal>,
    /// `DRAFT` (default) or `SENT`.
    #[serde(default)]
    pub status: Option<String>,
}

impl Validate for CreateInvoiceRequest {
    type Output = NewInvoice;

    fn validate(self) -> Result<NewInvoice, ValidationError> {
        let issue_date = match self.issue_date.as_deref() {
            Some(raw) => parse_calendar_date(raw)?,
            None => Timestamp::now().date(),
        };
        Ok(NewInvoice {
            shipment_id: ShipmentId::from_uuid(self.shipment_id),
            invoice_number: self.invoice_number,
            currency: self.currency,
            issue_date,
            due_date: self.due_date.as_deref().map(parse_calendar_date).transpose()?,
            items: self.items,
            tds_rate: self.tds_rate.unwrap_or_default(),
            status: parse_opt(self.status.as_deref())?,
        })
    }
}

/// Request to edit an invoice. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInvoiceRequest {
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub issue_date: Option<String>,
    /// `null` clears the due date.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub due_date: Option<Option<String>>,
    #[serde(default)]
    #[schema(value_type = Option<Vec<Object>>)]
    pub items: Option<Vec<LineItem>>,
    #[serde(default)]
    pub tds_rate: Option<Decimal>,
    /// `DRAFT` or `SENT`; `PAID` and `OVERDUE` are derived.
    #[serde(default)]
    pub status: Option<String>,
}

impl Validate for UpdateInvoiceRequest {
    type Output = InvoicePatch;

    fn validate(self) -> Result<InvoicePatch, ValidationError> {
        let due_date = match self.due_date {
            None => None,
            Some(None) => Some(None),
            Some(Some(raw)) => Some(Some(parse_calendar_date(&raw)?)),
        };
        Ok(InvoicePatch {
            invoice_number: self.invoice_number,
            currency: self.currency,
            issue_date: self.issue_date.as_deref().map(parse_calendar_date).transpose()?,
            due_date,
            items: self.items,
            tds_rate: self.tds_rate,
            status: parse_opt(self.status.as_deref())?,
        })
    }
}

/// Request to preview invoice totals without saving anything.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TotalsRequest {
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub tds_rate: Decimal,
}

/// Filters for the invoice list.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct InvoiceListQuery {
    /// Only invoices of this shipment.
    pub shipment_id: Option<Uuid>,
    /// Only invoices whose effective status matches.
    pub status: Option<String>,
}

// -- Router -------------------------------------------------------------------

/// Build the invoices router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/invoices", post(create_invoice).get(list_invoices))
        .route("/v1/invoices/totals", post(preview_totals))
        .route(
            "/v1/invoices/{id}",
            get(get_invoice).patch(update_invoice).delete(delete_invoice),
        )
}

fn find_invoice(state: &AppState, id: Uuid) -> Result<Invoice, AppError> {
    state
        .invoices
        .get(&InvoiceId::from_uuid(id))
        .ok_or_else(|| AppError::NotFound(format!("invoice {id}")))
}

// -- Handlers -----------------------------------------------------------------

/// POST /v1/invoices: Create an invoice and run the cascade.
#[utoipa::path(
    post,
    path = "/v1/invoices",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created", body = serde_json::Value),
        (status = 400, description = "Invalid input or unknown shipment", body = crate::error::ErrorBody),
    ),
    tag = "invoices"
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateInvoiceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Invoice>), AppError> {
    let new = extract_validated_json(body)?;
    let shipment_id = new.shipment_id;
    let actor = caller.actor;
    let invoice = run_cascade(&state, shipment_id, move |ledger, now| {
        ledger.add_invoice(new, &actor, now)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// GET /v1/invoices: List invoices, newest issue date first.
#[utoipa::path(
    get,
    path = "/v1/invoices",
    params(InvoiceListQuery),
    responses(
        (status = 200, description = "Invoices with effective status", body = serde_json::Value),
        (status = 400, description = "Unknown status filter", body = crate::error::ErrorBody),
    ),
    tag = "invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    query: Result<Query<InvoiceListQuery>, QueryRejection>,
) -> Result<Json<Vec<Invoice>>, AppError> {
    let query = extract_query(query)?;
    let status: Option<InvoiceStatus> = parse_opt(query.status.as_deref())?;
    let shipment_id = query.shipment_id.map(ShipmentId::from_uuid);
    let now = Timestamp::now();

    let mut invoices: Vec<Invoice> = state
        .invoices
        .list_where(|i| shipment_id.map_or(true, |s| i.shipment_id == s))
        .iter()
        .map(|i| i.with_effective_status(now))
        .filter(|i| status.map_or(true, |s| i.status == s))
        .collect();
    invoices.sort_by(|a, b| {
        b.issue_date
            .cmp(&a.issue_date)
            .then(b.created_at.cmp(&a.created_at))
    });
    Ok(Json(invoices))
}

/// GET /v1/invoices/{id}: Invoice detail with paid and balance amounts.
#[utoipa::path(
    get,
    path = "/v1/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 200, description = "Invoice detail", body = serde_json::Value),
        (status = 404, description = "Invoice not found", body = crate::error::ErrorBody),
    ),
    tag = "invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceDetail>, AppError> {
    let invoice = find_invoice(&state, id)?;
    let shipment_ref = state
        .shipments
        .get(&invoice.shipment_id)
        .map(|s| s.reference);
    let payments = state
        .payments
        .list_where(|p| p.invoice_id == Some(invoice.id));
    Ok(Json(InvoiceDetail::build(
        &invoice,
        shipment_ref,
        payments,
        Timestamp::now(),
    )))
}

/// PATCH /v1/invoices/{id}: Edit an invoice and run the cascade.
#[utoipa::path(
    patch,
    path = "/v1/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    request_body = UpdateInvoiceRequest,
    responses(
        (status = 200, description = "Invoice updated", body = serde_json::Value),
        (status = 400, description = "Invalid input", body = crate::error::ErrorBody),
        (status = 404, description = "Invoice not found", body = crate::error::ErrorBody),
    ),
    tag = "invoices"
)]
pub async fn update_invoice(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateInvoiceRequest>, JsonRejection>,
) -> Result<Json<Invoice>, AppError> {
    let patch = extract_validated_json(body)?;
    let existing = find_invoice(&state, id)?;
    let actor = caller.actor;
    let invoice = run_cascade(&state, existing.shipment_id, move |ledger, now| {
        ledger.update_invoice(existing.id, patch, &actor, now)
    })
    .await?;
    Ok(Json(invoice))
}

/// DELETE /v1/invoices/{id}: Delete an invoice that has no payments.
#[utoipa::path(
    delete,
    path = "/v1/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice ID")),
    responses(
        (status = 204, description = "Invoice deleted"),
        (status = 404, description = "Invoice not found", body = crate::error::ErrorBody),
        (status = 409, description = "Payments reference the invoice", body = crate::error::ErrorBody),
    ),
    tag = "invoices"
)]
pub async fn delete_invoice(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let existing = find_invoice(&state, id)?;
    let actor = caller.actor;
    run_cascade(&state, existing.shipment_id, move |ledger, now| {
        ledger.delete_invoice(existing.id, &actor, now)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/invoices/totals: Compute totals for a draft set of items.
#[utoipa::path(
    post,
    path = "/v1/invoices/totals",
    request_body = TotalsRequest,
    responses(
        (status = 200, description = "Computed totals", body = serde_json::Value),
        (status = 400, description = "Invalid TDS rate or out-of-range item", body = crate::error::ErrorBody),
    ),
    tag = "invoices"
)]
pub async fn preview_totals(
    body: Result<Json<TotalsRequest>, JsonRejection>,
) -> Result<Json<InvoiceTotals>, AppError> {
    let req = extract_json(body)?;
    let tds_rate = validate_tds_rate(req.tds_rate)?;
    validate_line_items(&req.items)?;
    Ok(Json(calculate(&req.items, tds_rate)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_defaults() {
        let req: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "shipmentId": Uuid::nil(),
            "issueDate": "2026-03-01",
            "items": [{ "quantity": 2, "rate": 100, "taxRate": 10 }]
        }))
        .unwrap();
        let new = req.validate().unwrap();
        assert_eq!(new.tds_rate, Decimal::ZERO);
        assert_eq!(new.status, None);
        assert_eq!(new.due_date, None);
        assert_eq!(new.items.len(), 1);
    }

    #[test]
    fn test_create_request_rejects_bad_date_and_status() {
        let bad_date: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "shipmentId": Uuid::nil(),
            "issueDate": "01/03/2026"
        }))
        .unwrap();
        assert!(matches!(
            bad_date.validate(),
            Err(ValidationError::InvalidDate(_))
        ));

        let bad_status: CreateInvoiceRequest = serde_json::from_value(serde_json::json!({
            "shipmentId": Uuid::nil(),
            "status": "VOID"
        }))
        .unwrap();
        assert!(matches!(
            bad_status.validate(),
            Err(ValidationError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_update_request_null_clears_due_date() {
        let req: UpdateInvoiceRequest =
            serde_json::from_value(serde_json::json!({ "dueDate": null })).unwrap();
        assert_eq!(req.validate().unwrap().due_date, Some(None));

        let req: UpdateInvoiceRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(req.validate().unwrap(), InvoicePatch::default());
    }

    #[test]
    fn test_totals_request_keeps_decimal_digits() {
        let req: TotalsRequest = serde_json::from_value(serde_json::json!({
            "items": [{ "quantity": 3, "rate": 0.1, "taxRate": 0 }],
            "tdsRate": 1.5
        }))
        .unwrap();
        assert_eq!(req.tds_rate, Decimal::new(15, 1));
        assert_eq!(calculate(&req.items, Decimal::ZERO).subtotal, Decimal::new(3, 1));
    }
}
