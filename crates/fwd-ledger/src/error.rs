//! Ledger error type.

use thiserror::Error;

use fwd_core::{InvoiceId, PaymentId, ValidationError};

/// Errors from ledger mutations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Malformed or out-of-range input.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The invoice is not part of this shipment (or no longer exists).
    #[error("invoice {0} not found")]
    InvoiceNotFound(InvoiceId),

    /// The payment is not part of this shipment (or no longer exists).
    #[error("payment {0} not found")]
    PaymentNotFound(PaymentId),

    /// An invoice cannot be deleted while payments reference it.
    #[error("invoice {invoice_id} has {count} payment(s) recorded against it")]
    InvoiceHasPayments {
        /// The invoice.
        invoice_id: InvoiceId,
        /// Number of referencing payments.
        count: usize,
    },
}
