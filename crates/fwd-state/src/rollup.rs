//! # Shipment Invoice Rollup
//!
//! Precedence, highest first:
//!
//! 1. no invoices → `DRAFT`
//! 2. every invoice `PAID` → `PAID`
//! 3. any invoice `OVERDUE` → `OVERDUE`
//! 4. any invoice `SENT` or `PAID` → `SENT`
//! 5. otherwise → `DRAFT`
//!
//! Inputs are effective statuses (see [`crate::effective_status`]).

use crate::invoice::InvoiceStatus;

/// Combine the effective statuses of a shipment's invoices.
pub fn rollup_status<I>(statuses: I) -> InvoiceStatus
where
    I: IntoIterator<Item = InvoiceStatus>,
{
    let mut seen_any = false;
    let mut all_paid = true;
    let mut any_overdue = false;
    let mut any_billed = false;

    for status in statuses {
        seen_any = true;
        all_paid &= status == InvoiceStatus::Paid;
        any_overdue |= status == InvoiceStatus::Overdue;
        any_billed |= matches!(status, InvoiceStatus::Sent | InvoiceStatus::Paid);
    }

    if !seen_any {
        InvoiceStatus::Draft
    } else if all_paid {
        InvoiceStatus::Paid
    } else if any_overdue {
        InvoiceStatus::Overdue
    } else if any_billed {
        InvoiceStatus::Sent
    } else {
        InvoiceStatus::Draft
    }
}
