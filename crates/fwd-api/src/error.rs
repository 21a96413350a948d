//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from fwd-core, fwd-state and fwd-ledger to HTTP status
//! codes with a JSON body `{ "error": { "code", "message" } }`. Storage
//! failures are logged and never echoed to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use fwd_core::{SessionError, ValidationError};
use fwd_ledger::LedgerError;
use fwd_state::ComplianceError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Input failed a business rule (400).
    #[error("{0}")]
    Validation(String),

    /// Request body or query could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing, invalid or expired session token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but lacking the required role (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    pub(crate) fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// The message safe to show a client.
    pub(crate) fn public_message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }

    fn log_if_internal(&self) {
        if matches!(self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        self.log_if_internal();

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.public_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// An [`AppError`] rendered as a `text/plain` body.
///
/// Used by endpoints whose clients display the error text verbatim.
#[derive(Debug)]
pub struct PlainTextError(pub AppError);

impl From<AppError> for PlainTextError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<ComplianceError> for PlainTextError {
    fn from(err: ComplianceError) -> Self {
        Self(err.into())
    }
}

impl From<sqlx::Error> for PlainTextError {
    fn from(err: sqlx::Error) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for PlainTextError {
    fn into_response(self) -> Response {
        let (status, _) = self.0.status_and_code();
        self.0.log_if_internal();
        (status, self.0.public_message()).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(e) => e.into(),
            LedgerError::InvoiceNotFound(_) | LedgerError::PaymentNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            LedgerError::InvoiceHasPayments { .. } => Self::Conflict(err.to_string()),
        }
    }
}

impl From<ComplianceError> for AppError {
    fn from(err: ComplianceError) -> Self {
        match err {
            ComplianceError::AlreadyDecided { .. } => Self::Conflict(err.to_string()),
            ComplianceError::MissingActor => Self::Unauthorized(err.to_string()),
            ComplianceError::Validation(e) => e.into(),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        Self::Unauthorized(err.to_string())
    }
}

/// Storage failures surface as 500.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("storage: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fwd_core::{InvoiceId, PaymentId};
    use fwd_state::TaskStatus;
    use http_body_util::BodyExt;
    use rust_decimal::Decimal;

    #[test]
    fn not_found_status_code() {
        let err = AppError::NotFound("missing invoice".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn validation_status_code() {
        let err = AppError::Validation("bad field".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn bad_request_status_code() {
        let err = AppError::BadRequest("malformed JSON".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn unauthorized_status_code() {
        let err = AppError::Unauthorized("no token".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(code, "UNAUTHORIZED");
    }

    #[test]
    fn forbidden_status_code() {
        let err = AppError::Forbidden("manager role required".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "FORBIDDEN");
    }

    #[test]
    fn conflict_status_code() {
        let err = AppError::Conflict("invoice has payments".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "CONFLICT");
    }

    #[test]
    fn internal_status_code() {
        let err = AppError::Internal("db connection failed".to_string());
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(code, "INTERNAL_ERROR");
    }

    #[test]
    fn ledger_errors_map_to_taxonomy() {
        let invoice_id = InvoiceId::new();
        assert!(matches!(
            AppError::from(LedgerError::InvoiceNotFound(invoice_id)),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(LedgerError::PaymentNotFound(PaymentId::new())),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(LedgerError::InvoiceHasPayments {
                invoice_id,
                count: 2
            }),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(LedgerError::Validation(ValidationError::NonPositiveAmount(Decimal::ZERO))),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn compliance_errors_map_to_taxonomy() {
        let err = AppError::from(ComplianceError::AlreadyDecided {
            task_id: "t-1".to_string(),
            status: TaskStatus::Approved,
        });
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(matches!(
            AppError::from(ComplianceError::MissingActor),
            AppError::Unauthorized(_)
        ));
    }

    #[test]
    fn validation_message_is_verbatim() {
        let err = AppError::from(ValidationError::EmptyField("reference"));
        assert_eq!(err.public_message(), ValidationError::EmptyField("reference").to_string());
    }

    #[tokio::test]
    async fn into_response_hides_internal_message() {
        let response = AppError::Internal("password=hunter2".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[tokio::test]
    async fn into_response_json_body() {
        let response = AppError::Conflict("already decided".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "CONFLICT");
        assert!(body.error.message.contains("already decided"));
    }

    #[tokio::test]
    async fn plain_text_error_body() {
        let response =
            PlainTextError(AppError::NotFound("compliance task x".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let content_type = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/plain"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"not found: compliance task x");
    }
}
