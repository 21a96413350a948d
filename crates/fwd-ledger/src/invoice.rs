//! # Invoices
//!
//! Totals are always derived from the line items and TDS rate by
//! [`crate::totals::calculate`]; callers never set them directly.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fwd_core::{approx_gte, round_money, InvoiceId, ShipmentId, Timestamp, ValidationError};
use fwd_state::{effective_status, InvoiceStatus};

use crate::payment::{clean_text, normalize_currency, Payment};
use crate::totals::{calculate, validate_line_items, validate_tds_rate, LineItem};
use crate::DEFAULT_CURRENCY;

const MAX_NUMBER_LEN: usize = 40;

/// An invoice as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// Invoice id.
    pub id: InvoiceId,
    /// Human-facing invoice number.
    pub invoice_number: String,
    /// Owning shipment.
    pub shipment_id: ShipmentId,
    /// Currency code.
    pub currency: String,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date, if any.
    pub due_date: Option<NaiveDate>,
    /// Stored status (refreshed by the resolver).
    pub status: InvoiceStatus,
    /// Line items in entry order.
    pub items: Vec<LineItem>,
    /// Sum of taxable values.
    pub subtotal: Decimal,
    /// Sum of item taxes.
    pub total_tax: Decimal,
    /// TDS percentage.
    pub tds_rate: Decimal,
    /// TDS withheld.
    pub tds_amount: Decimal,
    /// Net payable.
    pub amount: Decimal,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

/// Input for creating an invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvoice {
    /// Owning shipment.
    pub shipment_id: ShipmentId,
    /// Generated when `None`.
    pub invoice_number: Option<String>,
    /// Defaults to the ledger default currency.
    pub currency: Option<String>,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Line items.
    pub items: Vec<LineItem>,
    /// TDS percentage, `>= 0`.
    pub tds_rate: Decimal,
    /// `DRAFT` (default) or `SENT`.
    pub status: Option<InvoiceStatus>,
}

/// Editable invoice fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvoicePatch {
    /// New invoice number.
    pub invoice_number: Option<String>,
    /// New currency.
    pub currency: Option<String>,
    /// New issue date.
    pub issue_date: Option<NaiveDate>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<NaiveDate>>,
    /// Replacement line items.
    pub items: Option<Vec<LineItem>>,
    /// New TDS percentage.
    pub tds_rate: Option<Decimal>,
    /// `DRAFT` or `SENT` only.
    pub status: Option<InvoiceStatus>,
}

impl Invoice {
    /// Build an invoice and compute its totals.
    pub fn create(new: NewInvoice, now: Timestamp) -> Result<Self, ValidationError> {
        let id = InvoiceId::new();
        let invoice_number = match clean_text("invoiceNumber", new.invoice_number)? {
            Some(n) => check_number(n)?,
            None => generate_number(id, new.issue_date),
        };
        let status = new.status.unwrap_or_default();
        check_settable(status)?;
        check_dates(new.issue_date, new.due_date)?;
        validate_line_items(&new.items)?;

        let mut invoice = Self {
            id,
            invoice_number,
            shipment_id: new.shipment_id,
            currency: match new.currency {
                Some(c) => normalize_currency(&c)?,
                None => DEFAULT_CURRENCY.to_string(),
            },
            issue_date: new.issue_date,
            due_date: new.due_date,
            status,
            items: new.items,
            subtotal: Decimal::ZERO,
            total_tax: Decimal::ZERO,
            tds_rate: validate_tds_rate(new.tds_rate)?,
            tds_amount: Decimal::ZERO,
            amount: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        };
        invoice.recompute_totals();
        Ok(invoice)
    }

    /// Apply an edit. Totals are recomputed when items or the TDS rate change.
    pub fn apply_patch(&mut self, patch: InvoicePatch, now: Timestamp) -> Result<(), ValidationError> {
        if let Some(status) = patch.status {
            check_settable(status)?;
        }
        let issue_date = patch.issue_date.unwrap_or(self.issue_date);
        let due_date = patch.due_date.unwrap_or(self.due_date);
        check_dates(issue_date, due_date)?;
        let invoice_number = match patch.invoice_number {
            Some(n) => Some(check_number(
                clean_text("invoiceNumber", Some(n))?
                    .ok_or(ValidationError::EmptyField("invoiceNumber"))?,
            )?),
            None => None,
        };
        let currency = patch.currency.as_deref().map(normalize_currency).transpose()?;
        let tds_rate = patch.tds_rate.map(validate_tds_rate).transpose()?;
        if let Some(items) = &patch.items {
            validate_line_items(items)?;
        }

        if let Some(n) = invoice_number {
            self.invoice_number = n;
        }
        if let Some(c) = currency {
            self.currency = c;
        }
        self.issue_date = issue_date;
        self.due_date = due_date;
        if let Some(status) = patch.status {
            self.status = status;
        }
        let financial = patch.items.is_some() || tds_rate.is_some();
        if let Some(items) = patch.items {
            self.items = items;
        }
        if let Some(rate) = tds_rate {
            self.tds_rate = rate;
        }
        if financial {
            self.recompute_totals();
        }
        self.updated_at = now;
        Ok(())
    }

    /// Status as presented at `now`.
    pub fn effective_status(&self, now: Timestamp) -> InvoiceStatus {
        effective_status(self.status, self.amount, self.due_date, now)
    }

    /// A copy carrying the effective status, for list views.
    pub fn with_effective_status(&self, now: Timestamp) -> Self {
        Self {
            status: self.effective_status(now),
            ..self.clone()
        }
    }

    fn recompute_totals(&mut self) {
        let totals = calculate(&self.items, self.tds_rate);
        self.subtotal = totals.subtotal;
        self.total_tax = totals.total_tax;
        self.tds_amount = totals.tds_amount;
        self.amount = totals.amount;
    }
}

fn check_settable(status: InvoiceStatus) -> Result<(), ValidationError> {
    if status.is_user_settable() {
        Ok(())
    } else {
        Err(ValidationError::Rule(format!(
            "status {status} is derived from payments and due dates and cannot be set directly"
        )))
    }
}

fn check_dates(issue: NaiveDate, due: Option<NaiveDate>) -> Result<(), ValidationError> {
    match due {
        Some(due) if due < issue => Err(ValidationError::Rule(format!(
            "dueDate {due} is before issueDate {issue}"
        ))),
        _ => Ok(()),
    }
}

fn check_number(number: String) -> Result<String, ValidationError> {
    if number.len() > MAX_NUMBER_LEN {
        return Err(ValidationError::TooLong {
            field: "invoiceNumber",
            max: MAX_NUMBER_LEN,
        });
    }
    Ok(number)
}

/// `INV-<issue date>-<first 8 hex digits of the id>`.
fn generate_number(id: InvoiceId, issue_date: NaiveDate) -> String {
    let suffix: String = id.as_uuid().simple().to_string().chars().take(8).collect();
    format!("INV-{}-{}", issue_date.format("%Y%m%d"), suffix.to_ascii_uppercase())
}

/// The detail view of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDetail {
    /// Invoice id.
    pub id: InvoiceId,
    /// Invoice number.
    pub invoice_number: String,
    /// Owning shipment.
    pub shipment_id: ShipmentId,
    /// Shipment reference.
    pub shipment_ref: Option<String>,
    /// Currency code.
    pub currency: String,
    /// Issue date.
    pub issue_date: NaiveDate,
    /// Due date.
    pub due_date: Option<NaiveDate>,
    /// Effective status at read time.
    pub status: InvoiceStatus,
    /// Line items.
    pub items: Vec<LineItem>,
    /// Sum of taxable values.
    pub subtotal: Decimal,
    /// Sum of item taxes.
    pub total_tax: Decimal,
    /// TDS percentage.
    pub tds_rate: Decimal,
    /// TDS withheld.
    pub tds_amount: Decimal,
    /// Net payable.
    pub amount: Decimal,
    /// Sum of completed payments.
    pub paid_amount: Decimal,
    /// `max(0, amount - paidAmount)`.
    pub balance_amount: Decimal,
    /// Every payment against this invoice, any status.
    pub payments: Vec<Payment>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

impl InvoiceDetail {
    /// Assemble the view. Payments for other invoices are ignored.
    pub fn build(
        invoice: &Invoice,
        shipment_ref: Option<String>,
        payments: impl IntoIterator<Item = Payment>,
        now: Timestamp,
    ) -> Self {
        let mut payments: Vec<Payment> = payments
            .into_iter()
            .filter(|p| p.invoice_id == Some(invoice.id))
            .collect();
        payments.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        let paid_amount = round_money(
            payments
                .iter()
                .filter(|p| p.is_completed())
                .map(|p| p.amount)
                .sum(),
        );
        let balance_amount = outstanding(invoice.amount, paid_amount);

        Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number.clone(),
            shipment_id: invoice.shipment_id,
            shipment_ref,
            currency: invoice.currency.clone(),
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            status: invoice.effective_status(now),
            items: invoice.items.clone(),
            subtotal: invoice.subtotal,
            total_tax: invoice.total_tax,
            tds_rate: invoice.tds_rate,
            tds_amount: invoice.tds_amount,
            amount: invoice.amount,
            paid_amount,
            balance_amount,
            payments,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

/// `max(0, amount - paid)`, zero when within tolerance.
pub(crate) fn outstanding(amount: Decimal, paid: Decimal) -> Decimal {
    if approx_gte(paid, amount) {
        Decimal::ZERO
    } else {
        round_money((amount - paid).max(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{PaymentMethod, PaymentStatus};
    use fwd_core::PaymentId;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_invoice() -> NewInvoice {
        NewInvoice {
            shipment_id: ShipmentId::new(),
            invoice_number: None,
            currency: None,
            issue_date: date(2026, 3, 1),
            due_date: Some(date(2026, 3, 31)),
            items: vec![LineItem::new(dec!(2), dec!(100), dec!(10))],
            tds_rate: Decimal::ZERO,
            status: None,
        }
    }

    fn payment(invoice: &Invoice, amount: Decimal, status: PaymentStatus) -> Payment {
        Payment {
            id: PaymentId::new(),
            shipment_id: invoice.shipment_id,
            invoice_id: Some(invoice.id),
            amount,
            currency: "INR".to_string(),
            method: PaymentMethod::Upi,
            status,
            date: date(2026, 3, 5),
            transaction_num: None,
            notes: None,
            created_at: Timestamp::now(),
            updated_at: Timestamp::now(),
        }
    }

    #[test]
    fn create_computes_totals_and_defaults() {
        let inv = Invoice::create(new_invoice(), Timestamp::now()).unwrap();
        assert_eq!(inv.amount, dec!(220));
        assert_eq!(inv.status, InvoiceStatus::Draft);
        assert_eq!(inv.currency, "INR");
        assert!(inv.invoice_number.starts_with("INV-20260301-"));
        assert_eq!(inv.invoice_number.len(), "INV-20260301-".len() + 8);
    }

    #[test]
    fn create_rejects_derived_status() {
        let mut n = new_invoice();
        n.status = Some(InvoiceStatus::Paid);
        assert!(matches!(
            Invoice::create(n, Timestamp::now()),
            Err(ValidationError::Rule(_))
        ));
    }

    #[test]
    fn create_rejects_due_before_issue() {
        let mut n = new_invoice();
        n.due_date = Some(date(2026, 2, 1));
        assert!(Invoice::create(n, Timestamp::now()).is_err());
    }

    #[test]
    fn patch_recomputes_totals() {
        let mut inv = Invoice::create(new_invoice(), Timestamp::now()).unwrap();
        inv.apply_patch(
            InvoicePatch {
                tds_rate: Some(dec!(10)),
                ..Default::default()
            },
            Timestamp::now(),
        )
        .unwrap();
        assert_eq!(inv.tds_amount, dec!(22));
        assert_eq!(inv.amount, dec!(198));
    }

    #[test]
    fn patch_rejects_overdue_and_leaves_invoice_untouched() {
        let mut inv = Invoice::create(new_invoice(), Timestamp::now()).unwrap();
        let before = inv.clone();
        let err = inv
            .apply_patch(
                InvoicePatch {
                    status: Some(InvoiceStatus::Overdue),
                    items: Some(vec![]),
                    ..Default::default()
                },
                Timestamp::now(),
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::Rule(_)));
        assert_eq!(inv, before);
    }

    #[test]
    fn patch_clears_due_date() {
        let mut inv = Invoice::create(new_invoice(), Timestamp::now()).unwrap();
        inv.apply_patch(
            InvoicePatch {
                due_date: Some(None),
                ..Default::default()
            },
            Timestamp::now(),
        )
        .unwrap();
        assert_eq!(inv.due_date, None);
    }

    #[test]
    fn detail_counts_only_completed_payments() {
        let inv = Invoice::create(new_invoice(), Timestamp::now()).unwrap();
        let payments = vec![
            payment(&inv, dec!(100), PaymentStatus::Completed),
            payment(&inv, dec!(50), PaymentStatus::Pending),
            payment(&inv, dec!(70), PaymentStatus::Failed),
        ];
        let detail = InvoiceDetail::build(&inv, Some("SHP-1".to_string()), payments, Timestamp::now());
        assert_eq!(detail.paid_amount, dec!(100));
        assert_eq!(detail.balance_amount, dec!(120));
        assert_eq!(detail.payments.len(), 3);
    }

    #[test]
    fn detail_shows_computed_overdue() {
        let mut n = new_invoice();
        n.status = Some(InvoiceStatus::Sent);
        let inv = Invoice::create(n, Timestamp::now()).unwrap();
        let later = Timestamp::from_datetime(
            date(2026, 4, 2).and_hms_opt(0, 0, 0).unwrap().and_utc(),
        );
        let detail = InvoiceDetail::build(&inv, None, Vec::new(), later);
        assert_eq!(detail.status, InvoiceStatus::Overdue);
        assert_eq!(inv.status, InvoiceStatus::Sent);
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["status"], "OVERDUE");
        assert_eq!(json["issueDate"], "2026-03-01");
        assert_eq!(json["balanceAmount"], 220.0);
    }

    #[test]
    fn outstanding_never_negative() {
        assert_eq!(outstanding(dec!(100), dec!(150)), Decimal::ZERO);
        assert_eq!(outstanding(dec!(100), dec!(99.9999999)), Decimal::ZERO);
        assert_eq!(outstanding(dec!(100), dec!(40)), dec!(60));
    }

    #[test]
    fn create_rejects_oversized_line_items() {
        let mut n = new_invoice();
        n.items = vec![LineItem::new(dec!(1), dec!(5000000000000), dec!(0))];
        let err = Invoice::create(n, Timestamp::now()).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { field: "rate", .. }));
    }
}
