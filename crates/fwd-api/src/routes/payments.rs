//! # Payment API
//!
//! Recording, editing or deleting a payment runs the cascade for the
//! payment's invoice and then its shipment before the response is sent.
//! The shipment/invoice association of a payment is fixed at creation.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use fwd_core::{parse_calendar_date, InvoiceId, PaymentId, ShipmentId, ValidationError};
use fwd_ledger::{NewPayment, Payment, PaymentPatch};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_query, extract_validated_json, parse_opt, Validate};
use crate::reconcile::run_cascade;
use crate::state::AppState;

/// Request to record a payment.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub shipment_id: Uuid,
    /// Invoice this payment settles, if any. Must belong to the shipment.
    #[serde(default)]
    pub invoice_id: Option<Uuid>,
    /// Must be greater than 0.
    pub amount: Decimal,
    /// Defaults to the invoice's currency, else INR.
    #[serde(default)]
    pub currency: Option<String>,
    /// `UPI | CASH | ACCOUNT | CHEQUE | OTHER`.
    pub method: String,
    /// `PENDING | COMPLETED | FAILED`; defaults to `COMPLETED`.
    #[serde(default)]
    pub status: Option<String>,
    /// `YYYY-MM-DD`; defaults to today (UTC).
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub transaction_num: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for CreatePaymentRequest {
    type Output = NewPayment;

    fn validate(self) -> Result<NewPayment, ValidationError> {
        Ok(NewPayment {
            shipment_id: ShipmentId::from_uuid(self.shipment_id),
            invoice_id: self.invoice_id.map(InvoiceId::from_uuid),
            amount: self.amount,
            currency: self.currency,
            method: self.method.parse()?,
            status: parse_opt(self.status.as_deref())?,
            date: self.date.as_deref().map(parse_calendar_date).transpose()?,
            transaction_num: self.transaction_num,
            notes: self.notes,
        })
    }
}

/// Request to edit a payment. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub transaction_num: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for UpdatePaymentRequest {
    type Output = PaymentPatch;

    fn validate(self) -> Result<PaymentPatch, ValidationError> {
        Ok(PaymentPatch {
            amount: self.amount,
            currency: self.currency,
            method: parse_opt(self.method.as_deref())?,
            status: parse_opt(self.status.as_deref())?,
            date: self.date.as_deref().map(parse_calendar_date).transpose()?,
            transaction_num: self.transaction_num,
            notes: self.notes,
        })
    }
}

/// Response to a recorded payment.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentCreated {
    pub id: Uuid,
}

/// Filters for the payment list.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PaymentListQuery {
    pub shipment_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
}

/// Build the payments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/payments", post(create_payment).get(list_payments))
        .route(
            "/v1/payments/{id}",
            get(get_payment).patch(update_payment).delete(delete_payment),
        )
}

fn find_payment(state: &AppState, id: Uuid) -> Result<Payment, AppError> {
    state
        .payments
        .get(&PaymentId::from_uuid(id))
        .ok_or_else(|| AppError::NotFound(format!("payment {id}")))
}

fn count_recorded(payment: &Payment) {
    metrics::counter!("fwd_payments_recorded_total", "status" => payment.status.as_str())
        .increment(1);
}

/// POST /v1/payments: Record a payment and run the cascade.
#[utoipa::path(
    post,
    path = "/v1/payments",
    request_body = CreatePaymentRequest,
    responses(
        (status = 201, description = "Payment recorded", body = PaymentCreated),
        (status = 400, description = "Invalid input, unknown shipment or invoice of another shipment", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub async fn create_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentCreated>), AppError> {
    let new = extract_validated_json(body)?;
    let actor = caller.actor;
    let payment = run_cascade(&state, new.shipment_id, move |ledger, now| {
        ledger.record_payment(new, &actor, now)
    })
    .await?;
    count_recorded(&payment);
    tracing::info!(
        payment_id = %payment.id,
        shipment_id = %payment.shipment_id,
        invoice_id = ?payment.invoice_id,
        amount = %payment.amount,
        status = payment.status.as_str(),
        "payment recorded"
    );
    Ok((
        StatusCode::CREATED,
        Json(PaymentCreated {
            id: payment.id.as_uuid(),
        }),
    ))
}

/// GET /v1/payments: List payments, newest payment date first.
#[utoipa::path(
    get,
    path = "/v1/payments",
    params(PaymentListQuery),
    responses((status = 200, description = "Payments", body = serde_json::Value)),
    tag = "payments"
)]
pub async fn list_payments(
    State(state): State<AppState>,
    query: Result<Query<PaymentListQuery>, QueryRejection>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let query = extract_query(query)?;
    let shipment_id = query.shipment_id.map(ShipmentId::from_uuid);
    let invoice_id = query.invoice_id.map(InvoiceId::from_uuid);

    let mut payments = state.payments.list_where(|p| {
        shipment_id.map_or(true, |s| p.shipment_id == s)
            && invoice_id.map_or(true, |i| p.invoice_id == Some(i))
    });
    payments.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
    Ok(Json(payments))
}

/// GET /v1/payments/{id}: Get a payment.
#[utoipa::path(
    get,
    path = "/v1/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 200, description = "Payment", body = serde_json::Value),
        (status = 404, description = "Payment not found", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Payment>, AppError> {
    Ok(Json(find_payment(&state, id)?))
}

/// PATCH /v1/payments/{id}: Edit a payment and run the cascade.
#[utoipa::path(
    patch,
    path = "/v1/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment ID")),
    request_body = UpdatePaymentRequest,
    responses(
        (status = 200, description = "Payment updated", body = serde_json::Value),
        (status = 400, description = "Invalid input", body = crate::error::ErrorBody),
        (status = 404, description = "Payment not found", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub async fn update_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdatePaymentRequest>, JsonRejection>,
) -> Result<Json<Payment>, AppError> {
    let patch = extract_validated_json(body)?;
    let existing = find_payment(&state, id)?;
    let actor = caller.actor;
    let payment = run_cascade(&state, existing.shipment_id, move |ledger, now| {
        ledger.update_payment(existing.id, patch, &actor, now)
    })
    .await?;
    Ok(Json(payment))
}

/// DELETE /v1/payments/{id}: Delete a payment and run the cascade.
#[utoipa::path(
    delete,
    path = "/v1/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment ID")),
    responses(
        (status = 204, description = "Payment deleted"),
        (status = 404, description = "Payment not found", body = crate::error::ErrorBody),
    ),
    tag = "payments"
)]
pub async fn delete_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let existing = find_payment(&state, id)?;
    let actor = caller.actor;
    run_cascade(&state, existing.shipment_id, move |ledger, now| {
        ledger.delete_payment(existing.id, &actor, now)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
