//! # Error Hierarchy
//!
//! Structured error types shared by the whole stack, built with `thiserror`.
//! No `Box<dyn Error>`, no `.unwrap()` outside tests.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level error type for the foundational layer.
#[derive(Error, Debug)]
pub enum FwdError {
    /// Input validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Session token failure.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Malformed or out-of-range input.
///
/// Each variant carries the offending value so the message can be shown to
/// an operator verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A monetary amount that must be strictly positive was not.
    #[error("amount must be greater than 0, got {0}")]
    NonPositiveAmount(Decimal),

    /// A percentage rate was negative.
    #[error("{field} must be >= 0, got {value}")]
    InvalidRate {
        /// The field that carried the rate.
        field: &'static str,
        /// The rejected value.
        value: Decimal,
    },

    /// A number exceeded the accepted magnitude.
    #[error("{field} must be between -{max} and {max}, got {value}")]
    OutOfRange {
        /// The offending field.
        field: &'static str,
        /// The rejected value.
        value: Decimal,
        /// Largest accepted magnitude.
        max: Decimal,
    },

    /// An invoice carried more line items than accepted.
    #[error("an invoice may carry at most {0} line items")]
    TooManyItems(usize),

    /// A string did not match any member of a closed enumeration.
    #[error("unknown {kind} \"{value}\" (expected one of: {allowed})")]
    UnknownVariant {
        /// The enumeration name (e.g. "payment method").
        kind: &'static str,
        /// The rejected input.
        value: String,
        /// Comma-separated list of accepted values.
        allowed: &'static str,
    },

    /// A calendar date was not `YYYY-MM-DD`.
    #[error("invalid date \"{0}\" (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// A required text field was empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A text field exceeded its length limit.
    #[error("{field} must not exceed {max} characters")]
    TooLong {
        /// The field name.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
    },

    /// A payment referenced an invoice that belongs to a different shipment.
    #[error("invoice {invoice_id} does not belong to shipment {shipment_id}")]
    InvoiceShipmentMismatch {
        /// The referenced invoice.
        invoice_id: String,
        /// The shipment named by the payment.
        shipment_id: String,
    },

    /// A referenced shipment does not exist.
    #[error("shipment {0} does not exist")]
    UnknownShipment(String),

    /// Any other rule violation, described in full.
    #[error("{0}")]
    Rule(String),
}

/// Errors issuing or verifying a signed session token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The token is not in `v1.<claims>.<signature>` form.
    #[error("malformed session token")]
    Malformed,

    /// The signature does not verify against the configured secret.
    #[error("invalid session token signature")]
    BadSignature,

    /// The token's `exp` is in the past.
    #[error("session token expired")]
    Expired,

    /// The claims could not be encoded.
    #[error("session claims could not be encoded: {0}")]
    Encoding(String),
}
