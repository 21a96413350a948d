//! # Invoice Status
//!
//! ```text
//!   DRAFT ──(explicit edit)──▶ SENT ──(fully paid)──▶ PAID
//!                               ▲                       │
//!                               └──(payment removed)────┘
//!
//!   OVERDUE is never stored by the resolver; it is derived at read time
//!   from the due date by `effective_status`.
//! ```
//!
//! A `DRAFT` invoice is not billed yet, so payment changes never move it.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use rust_decimal::Decimal;

use fwd_core::{approx_gte, Timestamp, ValidationError};

/// Lifecycle status of an invoice (and of a shipment's invoice rollup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Not yet issued to the customer.
    #[default]
    Draft,
    /// Issued and awaiting payment.
    Sent,
    /// Completed payments cover the amount.
    Paid,
    /// Unpaid past its due date.
    Overdue,
}

impl InvoiceStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Sent => "SENT",
            Self::Paid => "PAID",
            Self::Overdue => "OVERDUE",
        }
    }

    /// Whether an operator may set this status directly.
    ///
    /// `PAID` and `OVERDUE` are derived by the system.
    pub fn is_user_settable(&self) -> bool {
        matches!(self, Self::Draft | Self::Sent)
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "SENT" => Ok(Self::Sent),
            "PAID" => Ok(Self::Paid),
            "OVERDUE" => Ok(Self::Overdue),
            _ => Err(ValidationError::UnknownVariant {
                kind: "invoice status",
                value: s.to_string(),
                allowed: "DRAFT, SENT, PAID, OVERDUE",
            }),
        }
    }
}

/// A status change applied by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    /// Status before the change.
    pub from: InvoiceStatus,
    /// Status after the change.
    pub to: InvoiceStatus,
}

/// The status an invoice presents at `now`.
///
/// A non-PAID invoice with a positive amount whose due date is strictly
/// before the current UTC calendar day is `OVERDUE`. The comparison is by
/// calendar day, not by instant: a due date is not read as midnight of that
/// day, so an invoice stays payable through the whole of its due date and
/// turns `OVERDUE` at 00:00 UTC of the following day. The stored value is
/// never modified.
pub fn effective_status(
    stored: InvoiceStatus,
    amount: Decimal,
    due_date: Option<NaiveDate>,
    now: Timestamp,
) -> InvoiceStatus {
    match due_date {
        Some(due) if stored != InvoiceStatus::Paid && amount > Decimal::ZERO && due < now.date() => {
            InvoiceStatus::Overdue
        }
        _ => stored,
    }
}

/// Decide the stored status after the completed-payment total changed.
///
/// Returns the transition to apply, or `None` when the status stays put.
/// `DRAFT` is never touched.
pub fn resolve_paid_status(
    current: InvoiceStatus,
    amount: Decimal,
    total_paid: Decimal,
) -> Option<StatusTransition> {
    if current == InvoiceStatus::Draft {
        return None;
    }
    let fully_paid = amount > Decimal::ZERO && approx_gte(total_paid, amount);
    let to = match (fully_paid, current) {
        (true, InvoiceStatus::Paid) => return None,
        (true, _) => InvoiceStatus::Paid,
        (false, InvoiceStatus::Paid) => InvoiceStatus::Sent,
        (false, _) => return None,
    };
    Some(StatusTransition { from: current, to })
}
