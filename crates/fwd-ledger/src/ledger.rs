//! # Shipment Ledger and Reconciliation Cascade
//!
//! A [`ShipmentLedger`] is a working copy of one shipment with all of its
//! invoices and payments. Mutations validate, apply, and then run the
//! cascade before returning:
//!
//! ```text
//! payment/invoice write
//!   └─▶ recalc_invoice_paid_status(invoice)     (PAID ⇄ SENT)
//!         └─▶ recalc_shipment_invoice_status()  (rollup)
//! ```
//!
//! Every row written and every audit entry produced is accumulated in a
//! [`ChangeSet`]. The caller persists the change set and applies it to its
//! stores; nothing here performs I/O.
//!
//! A failed mutation leaves the ledger exactly as it was.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use fwd_core::{
    round_money, Actor, AuditAction, InvoiceId, NewAuditEntry, PaymentId, ShipmentId,
    Timestamp, ValidationError,
};
use fwd_state::{resolve_paid_status, rollup_status, InvoiceStatus, StatusTransition};

use crate::error::LedgerError;
use crate::invoice::{outstanding, Invoice, InvoicePatch, NewInvoice};
use crate::payment::{
    clean_text, normalize_currency, validate_amount, NewPayment, Payment, PaymentPatch,
};
use crate::shipment::Shipment;
use crate::DEFAULT_CURRENCY;

/// Result of re-resolving one invoice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidStatusSummary {
    /// The invoice.
    pub invoice_id: InvoiceId,
    /// Its shipment.
    pub shipment_id: ShipmentId,
    /// Sum of completed payments.
    pub total_paid: Decimal,
    /// `max(0, amount - totalPaid)`.
    pub outstanding: Decimal,
}

/// Everything a sequence of ledger mutations changed.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// The shipment row, when its rollup changed.
    pub shipment: Option<Shipment>,
    /// Invoices created or modified.
    pub invoice_upserts: BTreeMap<InvoiceId, Invoice>,
    /// Invoices removed.
    pub invoice_deletes: BTreeSet<InvoiceId>,
    /// Payments created or modified.
    pub payment_upserts: BTreeMap<PaymentId, Payment>,
    /// Payments removed.
    pub payment_deletes: BTreeSet<PaymentId>,
    /// Status changes the resolver applied, in order.
    pub invoice_transitions: Vec<(InvoiceId, StatusTransition)>,
    /// The rollup change, if any.
    pub shipment_transition: Option<StatusTransition>,
    /// Audit entries in the order they were produced.
    pub audit: Vec<NewAuditEntry>,
}

impl ChangeSet {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.shipment.is_none()
            && self.invoice_upserts.is_empty()
            && self.invoice_deletes.is_empty()
            && self.payment_upserts.is_empty()
            && self.payment_deletes.is_empty()
            && self.audit.is_empty()
    }
}

/// Working copy of one shipment's financial rows.
#[derive(Debug, Clone)]
pub struct ShipmentLedger {
    shipment: Shipment,
    invoices: BTreeMap<InvoiceId, Invoice>,
    payments: BTreeMap<PaymentId, Payment>,
    changes: ChangeSet,
}

impl ShipmentLedger {
    /// Load a snapshot. Rows belonging to other shipments are ignored.
    pub fn new(
        shipment: Shipment,
        invoices: impl IntoIterator<Item = Invoice>,
        payments: impl IntoIterator<Item = Payment>,
    ) -> Self {
        let id = shipment.id;
        Self {
            invoices: invoices
                .into_iter()
                .filter(|i| i.shipment_id == id)
                .map(|i| (i.id, i))
                .collect(),
            payments: payments
                .into_iter()
                .filter(|p| p.shipment_id == id)
                .map(|p| (p.id, p))
                .collect(),
            shipment,
            changes: ChangeSet::default(),
        }
    }

    /// The shipment as currently held.
    pub fn shipment(&self) -> &Shipment {
        &self.shipment
    }

    /// One invoice.
    pub fn invoice(&self, id: InvoiceId) -> Option<&Invoice> {
        self.invoices.get(&id)
    }

    /// All invoices.
    pub fn invoices(&self) -> impl Iterator<Item = &Invoice> {
        self.invoices.values()
    }

    /// One payment.
    pub fn payment(&self, id: PaymentId) -> Option<&Payment> {
        self.payments.get(&id)
    }

    /// All payments.
    pub fn payments(&self) -> impl Iterator<Item = &Payment> {
        self.payments.values()
    }

    /// Changes accumulated so far.
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Consume the ledger, yielding its change set.
    pub fn into_changes(self) -> ChangeSet {
        self.changes
    }

    // ─── Payments ────────────────────────────────────────────────────

    /// Record a payment, then run the cascade.
    pub fn record_payment(
        &mut self,
        new: NewPayment,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Payment, LedgerError> {
        if new.shipment_id != self.shipment.id {
            return Err(ValidationError::UnknownShipment(new.shipment_id.to_string()).into());
        }
        let amount = validate_amount(new.amount)?;
        let invoice_currency = match new.invoice_id {
            Some(invoice_id) => Some(self.owned_invoice(invoice_id)?.currency.clone()),
            None => None,
        };
        let currency = match new.currency {
            Some(c) => normalize_currency(&c)?,
            None => invoice_currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        };

        let payment = Payment {
            id: PaymentId::new(),
            shipment_id: self.shipment.id,
            invoice_id: new.invoice_id,
            amount,
            currency,
            method: new.method,
            status: new.status.unwrap_or_default(),
            date: new.date.unwrap_or_else(|| now.date()),
            transaction_num: clean_text("transactionNum", new.transaction_num)?,
            notes: clean_text("notes", new.notes)?,
            created_at: now,
            updated_at: now,
        };

        tracing::info!(
            payment_id = %payment.id,
            shipment_id = %payment.shipment_id,
            invoice_id = ?payment.invoice_id,
            amount = %payment.amount,
            status = payment.status.as_str(),
            "payment recorded"
        );
        self.audit(
            NewAuditEntry::new(
                actor.clone(),
                AuditAction::Create,
                "payment",
                format!(
                    "Recorded {} {:.2} {} payment",
                    payment.currency,
                    payment.amount,
                    payment.method.as_str()
                ),
            )
            .entity_id(payment.id)
            .entity_ref(self.shipment.reference.clone())
            .meta(payment_meta(&payment)),
        );
        self.upsert_payment(payment.clone());
        self.cascade(payment.invoice_id, now);
        Ok(payment)
    }

    /// Edit a payment, then run the cascade for its existing association.
    pub fn update_payment(
        &mut self,
        id: PaymentId,
        patch: PaymentPatch,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Payment, LedgerError> {
        let mut payment = self
            .payments
            .get(&id)
            .cloned()
            .ok_or(LedgerError::PaymentNotFound(id))?;
        let before = payment.clone();

        if let Some(amount) = patch.amount {
            payment.amount = validate_amount(amount)?;
        }
        if let Some(currency) = &patch.currency {
            payment.currency = normalize_currency(currency)?;
        }
        if let Some(method) = patch.method {
            payment.method = method;
        }
        if let Some(status) = patch.status {
            payment.status = status;
        }
        if let Some(date) = patch.date {
            payment.date = date;
        }
        if patch.transaction_num.is_some() {
            payment.transaction_num = clean_text("transactionNum", patch.transaction_num)?;
        }
        if patch.notes.is_some() {
            payment.notes = clean_text("notes", patch.notes)?;
        }
        payment.updated_at = now;

        tracing::info!(
            payment_id = %id,
            shipment_id = %payment.shipment_id,
            from_status = before.status.as_str(),
            to_status = payment.status.as_str(),
            "payment updated"
        );
        self.audit(
            NewAuditEntry::new(actor.clone(), AuditAction::Update, "payment", "Updated payment")
                .entity_id(id)
                .entity_ref(self.shipment.reference.clone())
                .meta(json!({
                    "before": payment_meta(&before),
                    "after": payment_meta(&payment),
                })),
        );
        let invoice_id = payment.invoice_id;
        self.upsert_payment(payment.clone());
        self.cascade(invoice_id, now);
        Ok(payment)
    }

    /// Delete a payment, then run the cascade for its former association.
    pub fn delete_payment(
        &mut self,
        id: PaymentId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Payment, LedgerError> {
        let payment = self
            .payments
            .remove(&id)
            .ok_or(LedgerError::PaymentNotFound(id))?;
        self.changes.payment_upserts.remove(&id);
        self.changes.payment_deletes.insert(id);

        tracing::info!(payment_id = %id, shipment_id = %payment.shipment_id, "payment deleted");
        self.audit(
            NewAuditEntry::new(actor.clone(), AuditAction::Delete, "payment", "Deleted payment")
                .entity_id(id)
                .entity_ref(self.shipment.reference.clone())
                .meta(payment_meta(&payment)),
        );
        self.cascade(payment.invoice_id, now);
        Ok(payment)
    }

    /// Sum of `COMPLETED` payments against `invoice_id`.
    pub fn sum_completed(&self, invoice_id: InvoiceId) -> Decimal {
        round_money(
            self.payments
                .values()
                .filter(|p| p.invoice_id == Some(invoice_id) && p.is_completed())
                .map(|p| p.amount)
                .sum(),
        )
    }

    // ─── Invoices ────────────────────────────────────────────────────

    /// Create an invoice, then run the cascade.
    pub fn add_invoice(
        &mut self,
        new: NewInvoice,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Invoice, LedgerError> {
        if new.shipment_id != self.shipment.id {
            return Err(ValidationError::UnknownShipment(new.shipment_id.to_string()).into());
        }
        let invoice = Invoice::create(new, now)?;

        tracing::info!(
            invoice_id = %invoice.id,
            shipment_id = %invoice.shipment_id,
            amount = %invoice.amount,
            "invoice created"
        );
        self.audit(
            NewAuditEntry::new(
                actor.clone(),
                AuditAction::Create,
                "invoice",
                format!("Created invoice {}", invoice.invoice_number),
            )
            .entity_id(invoice.id)
            .entity_ref(invoice.invoice_number.clone())
            .meta(invoice_meta(&invoice)),
        );
        let id = invoice.id;
        self.upsert_invoice(invoice);
        self.cascade(Some(id), now);
        self.owned_invoice(id).cloned()
    }

    /// Edit an invoice, then run the cascade.
    pub fn update_invoice(
        &mut self,
        id: InvoiceId,
        patch: InvoicePatch,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Invoice, LedgerError> {
        let mut invoice = self.owned_invoice(id)?.clone();
        let before = invoice.clone();
        invoice.apply_patch(patch, now)?;

        tracing::info!(invoice_id = %id, shipment_id = %invoice.shipment_id, "invoice updated");
        self.audit(
            NewAuditEntry::new(
                actor.clone(),
                AuditAction::Update,
                "invoice",
                format!("Updated invoice {}", invoice.invoice_number),
            )
            .entity_id(id)
            .entity_ref(invoice.invoice_number.clone())
            .meta(json!({
                "before": invoice_meta(&before),
                "after": invoice_meta(&invoice),
            })),
        );
        self.upsert_invoice(invoice);
        self.cascade(Some(id), now);
        self.owned_invoice(id).cloned()
    }

    /// Delete an invoice with no payments, then re-aggregate the shipment.
    pub fn delete_invoice(
        &mut self,
        id: InvoiceId,
        actor: &Actor,
        now: Timestamp,
    ) -> Result<Invoice, LedgerError> {
        self.owned_invoice(id)?;
        let count = self
            .payments
            .values()
            .filter(|p| p.invoice_id == Some(id))
            .count();
        if count > 0 {
            return Err(LedgerError::InvoiceHasPayments {
                invoice_id: id,
                count,
            });
        }
        let invoice = self
            .invoices
            .remove(&id)
            .ok_or(LedgerError::InvoiceNotFound(id))?;
        self.changes.invoice_upserts.remove(&id);
        self.changes.invoice_deletes.insert(id);

        tracing::info!(invoice_id = %id, shipment_id = %invoice.shipment_id, "invoice deleted");
        self.audit(
            NewAuditEntry::new(
                actor.clone(),
                AuditAction::Delete,
                "invoice",
                format!("Deleted invoice {}", invoice.invoice_number),
            )
            .entity_id(id)
            .entity_ref(invoice.invoice_number.clone())
            .meta(invoice_meta(&invoice)),
        );
        self.recalc_shipment_invoice_status(now);
        Ok(invoice)
    }

    // ─── Cascade ─────────────────────────────────────────────────────

    /// Resolve the invoice (if any), then the shipment rollup.
    fn cascade(&mut self, invoice_id: Option<InvoiceId>, now: Timestamp) {
        if let Some(invoice_id) = invoice_id {
            self.recalc_invoice_paid_status(invoice_id, now);
        }
        self.recalc_shipment_invoice_status(now);
    }

    /// Promote the invoice to `PAID` or revert it to `SENT` according to
    /// its completed payments.
    ///
    /// Returns `None` when the invoice no longer exists.
    pub fn recalc_invoice_paid_status(
        &mut self,
        invoice_id: InvoiceId,
        now: Timestamp,
    ) -> Option<PaidStatusSummary> {
        let total_paid = self.sum_completed(invoice_id);
        let invoice = self.invoices.get_mut(&invoice_id)?;
        let summary = PaidStatusSummary {
            invoice_id,
            shipment_id: invoice.shipment_id,
            total_paid,
            outstanding: outstanding(invoice.amount, total_paid),
        };

        if let Some(transition) = resolve_paid_status(invoice.status, invoice.amount, total_paid) {
            invoice.status = transition.to;
            invoice.updated_at = now;
            let updated = invoice.clone();
            tracing::info!(
                invoice_id = %invoice_id,
                shipment_id = %updated.shipment_id,
                from = transition.from.as_str(),
                to = transition.to.as_str(),
                total_paid = %total_paid,
                "invoice status changed"
            );
            self.audit(
                NewAuditEntry::new(
                    Actor::system(),
                    AuditAction::StatusChange,
                    "invoice",
                    format!(
                        "Invoice {} moved from {} to {}",
                        updated.invoice_number, transition.from, transition.to
                    ),
                )
                .entity_id(invoice_id)
                .entity_ref(updated.invoice_number.clone())
                .meta(json!({
                    "from": transition.from,
                    "to": transition.to,
                    "amount": updated.amount,
                    "totalPaid": total_paid,
                })),
            );
            self.changes.invoice_transitions.push((invoice_id, transition));
            self.upsert_invoice(updated);
        }
        Some(summary)
    }

    /// Recompute and store the shipment rollup from every invoice's
    /// effective status at `now`.
    pub fn recalc_shipment_invoice_status(&mut self, now: Timestamp) -> InvoiceStatus {
        let status = rollup_status(self.invoices.values().map(|i| i.effective_status(now)));
        let previous = self.shipment.invoice_status;
        if status != previous {
            let transition = StatusTransition {
                from: previous,
                to: status,
            };
            self.shipment.invoice_status = status;
            self.shipment.updated_at = now;
            tracing::info!(
                shipment_id = %self.shipment.id,
                from = previous.as_str(),
                to = status.as_str(),
                "shipment invoice status changed"
            );
            self.audit(
                NewAuditEntry::new(
                    Actor::system(),
                    AuditAction::StatusChange,
                    "shipment",
                    format!(
                        "Shipment {} invoice status moved from {previous} to {status}",
                        self.shipment.reference
                    ),
                )
                .entity_id(self.shipment.id)
                .entity_ref(self.shipment.reference.clone())
                .meta(json!({
                    "from": previous,
                    "to": status,
                    "invoiceCount": self.invoices.len(),
                })),
            );
            self.changes.shipment_transition = Some(match self.changes.shipment_transition {
                Some(earlier) => StatusTransition {
                    from: earlier.from,
                    to: status,
                },
                None => transition,
            });
            self.changes.shipment = Some(self.shipment.clone());
        }
        status
    }

    // ─── Internals ───────────────────────────────────────────────────

    /// The invoice, if it belongs to this shipment.
    fn owned_invoice(&self, id: InvoiceId) -> Result<&Invoice, LedgerError> {
        self.invoices.get(&id).ok_or_else(|| {
            LedgerError::Validation(ValidationError::InvoiceShipmentMismatch {
                invoice_id: id.to_string(),
                shipment_id: self.shipment.id.to_string(),
            })
        })
    }

    fn upsert_invoice(&mut self, invoice: Invoice) {
        self.changes.invoice_upserts.insert(invoice.id, invoice.clone());
        self.invoices.insert(invoice.id, invoice);
    }

    fn upsert_payment(&mut self, payment: Payment) {
        self.changes.payment_upserts.insert(payment.id, payment.clone());
        self.payments.insert(payment.id, payment);
    }

    fn audit(&mut self, entry: NewAuditEntry) {
        self.changes.audit.push(entry);
    }
}

fn payment_meta(p: &Payment) -> serde_json::Value {
    json!({
        "shipmentId": p.shipment_id,
        "invoiceId": p.invoice_id,
        "amount": p.amount,
        "currency": p.currency,
        "method": p.method,
        "status": p.status,
        "date": p.date,
        "transactionNum": p.transaction_num,
    })
}

fn invoice_meta(i: &Invoice) -> serde_json::Value {
    json!({
        "shipmentId": i.shipment_id,
        "invoiceNumber": i.invoice_number,
        "status": i.status,
        "subtotal": i.subtotal,
        "totalTax": i.total_tax,
        "tdsRate": i.tds_rate,
        "tdsAmount": i.tds_amount,
        "amount": i.amount,
        "dueDate": i.due_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::{PaymentMethod, PaymentStatus};
    use crate::shipment::NewShipment;
    use crate::totals::LineItem;
    use chrono::{NaiveDate, TimeZone, Utc};
    use fwd_core::{Role, UserId};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn now() -> Timestamp {
        Timestamp::from_datetime(Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn staff() -> Actor {
        Actor::user(UserId::new(), "Ravi", Role::Staff)
    }

    fn ledger() -> ShipmentLedger {
        let shipment = Shipment::create(
            NewShipment {
                reference: "SHP-2001".to_string(),
                customer_name: None,
            },
            now(),
        )
        .unwrap();
        ShipmentLedger::new(shipment, Vec::new(), Vec::new())
    }

    fn sent_invoice(l: &mut ShipmentLedger, due: NaiveDate) -> Invoice {
        l.add_invoice(
            NewInvoice {
                shipment_id: l.shipment().id,
                invoice_number: None,
                currency: Some("INR".to_string()),
                issue_date: date(2026, 3, 1),
                due_date: Some(due),
                items: vec![LineItem::new(dec!(2), dec!(100), dec!(10))],
                tds_rate: Decimal::ZERO,
                status: Some(InvoiceStatus::Sent),
            },
            &staff(),
            now(),
        )
        .unwrap()
    }

    fn pay(
        l: &mut ShipmentLedger,
        invoice: Option<InvoiceId>,
        amount: Decimal,
    ) -> Result<Payment, LedgerError> {
        l.record_payment(
            NewPayment {
                shipment_id: l.shipment().id,
                invoice_id: invoice,
                amount,
                currency: None,
                method: PaymentMethod::Upi,
                status: None,
                date: None,
                transaction_num: None,
                notes: None,
            },
            &staff(),
            now(),
        )
    }

    #[test]
    fn full_payment_marks_invoice_and_shipment_paid() {
        let mut l = ledger();
        let inv = sent_invoice(&mut l, date(2026, 3, 31));
        assert_eq!(l.shipment().invoice_status, InvoiceStatus::Sent);

        let p = pay(&mut l, Some(inv.id), dec!(220)).unwrap();
        assert_eq!(p.status, PaymentStatus::Completed);
        assert_eq!(p.currency, "INR");
        assert_eq!(p.date, now().date());
        assert_eq!(l.invoice(inv.id).unwrap().status, InvoiceStatus::Paid);
        assert_eq!(l.shipment().invoice_status, InvoiceStatus::Paid);

        let summary = l.recalc_invoice_paid_status(inv.id, now()).unwrap();
        assert_eq!(summary.total_paid, dec!(220));
        assert_eq!(summary.outstanding, Decimal::ZERO);
    }

    #[test]
    fn deleting_only_payment_reverts_to_sent() {
        let mut l = ledger();
        let inv = sent_invoice(&mut l, date(2026, 3, 31));
        let p = pay(&mut l, Some(inv.id), dec!(220)).unwrap();
        l.delete_payment(p.id, &staff(), now()).unwrap();
        assert_eq!(l.invoice(inv.id).unwrap().status, InvoiceStatus::Sent);
        assert_eq!(l.shipment().invoice_status, InvoiceStatus::Sent);
        assert!(l.changes().payment_deletes.contains(&p.id));
        assert!(!l.changes().payment_upserts.contains_key(&p.id));
    }

    #[test]
    fn failing_a_payment_reverts_paid_invoice() {
        let mut l = ledger();
        let inv = sent_invoice(&mut l, date(2026, 3, 31));
        let p = pay(&mut l, Some(inv.id), dec!(220)).unwrap();
        l.update_payment(
            p.id,
            PaymentPatch {
                status: Some(PaymentStatus::Failed),
                ..Default::default()
            },
            &staff(),
            now(),
        )
        .unwrap();
        assert_eq!(l.invoice(inv.id).unwrap().status, InvoiceStatus::Sent);
        assert_eq!(l.sum_completed(inv.id), Decimal::ZERO);
    }

    #[test]
    fn partial_payments_accumulate() {
        let mut l = ledger();
        let inv = sent_invoice(&mut l, date(2026, 3, 31));
        pay(&mut l, Some(inv.id), dec!(100)).unwrap();
        assert_eq!(l.invoice(inv.id).unwrap().status, InvoiceStatus::Sent);
        pay(&mut l, Some(inv.id), dec!(120)).unwrap();
        assert_eq!(l.invoice(inv.id).unwrap().status, InvoiceStatus::Paid);
    }

    #[test]
    fn pending_payments_do_not_count() {
        let mut l = ledger();
        let inv = sent_invoice(&mut l, date(2026, 3, 31));
        l.record_payment(
            NewPayment {
                shipment_id: l.shipment().id,
                invoice_id: Some(inv.id),
                amount: dec!(220),
                currency: None,
                method: PaymentMethod::Cheque,
                status: Some(PaymentStatus::Pending),
                date: None,
                transaction_num: Some("CHQ-77".to_string()),
                notes: None,
            },
            &staff(),
            now(),
        )
        .unwrap();
        assert_eq!(l.sum_completed(inv.id), Decimal::ZERO);
        assert_eq!(l.invoice(inv.id).unwrap().status, InvoiceStatus::Sent);
    }

    #[test]
    fn draft_invoice_not_promoted_by_payment() {
        let mut l = ledger();
        let inv = l
            .add_invoice(
                NewInvoice {
                    shipment_id: l.shipment().id,
                    invoice_number: Some("INV-DRAFT".to_string()),
                    currency: None,
                    issue_date: date(2026, 3, 1),
                    due_date: None,
                    items: vec![LineItem::new(dec!(1), dec!(50), Decimal::ZERO)],
                    tds_rate: Decimal::ZERO,
                    status: None,
                },
                &staff(),
                now(),
            )
            .unwrap();
        pay(&mut l, Some(inv.id), dec!(50)).unwrap();
        assert_eq!(l.invoice(inv.id).unwrap().status, InvoiceStatus::Draft);
        assert_eq!(l.shipment().invoice_status, InvoiceStatus::Draft);
    }

    #[test]
    fn overdue_dominates_paid_in_rollup() {
        let mut l = ledger();
        let overdue = sent_invoice(&mut l, date(2026, 3, 9));
        let settled = sent_invoice(&mut l, date(2026, 3, 31));
        pay(&mut l, Some(settled.id), dec!(220)).unwrap();
        assert_eq!(l.invoice(overdue.id).unwrap().status, InvoiceStatus::Sent);
        assert_eq!(l.shipment().invoice_status, InvoiceStatus::Overdue);
    }

    #[test]
    fn zero_invoices_rollup_is_draft() {
        let mut l = ledger();
        assert_eq!(l.recalc_shipment_invoice_status(now()), InvoiceStatus::Draft);
        assert!(l.changes().is_empty());
    }

    #[test]
    fn rejects_non_positive_amount() {
        let mut l = ledger();
        let inv = sent_invoice(&mut l, date(2026, 3, 31));
        let before = l.changes().audit.len();
        let err = pay(&mut l, Some(inv.id), dec!(0)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::NonPositiveAmount(_))
        ));
        assert_eq!(l.changes().audit.len(), before);
        assert_eq!(l.payments().count(), 0);
    }

    #[test]
    fn rejects_invoice_from_other_shipment() {
        let mut l = ledger();
        let err = pay(&mut l, Some(InvoiceId::new()), dec!(10)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::InvoiceShipmentMismatch { .. })
        ));
    }

    #[test]
    fn rejects_payment_for_other_shipment() {
        let mut l = ledger();
        let err = l
            .record_payment(
                NewPayment {
                    shipment_id: ShipmentId::new(),
                    invoice_id: None,
                    amount: dec!(10),
                    currency: None,
                    method: PaymentMethod::Cash,
                    status: None,
                    date: None,
                    transaction_num: None,
                    notes: None,
                },
                &staff(),
                now(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::UnknownShipment(_))
        ));
    }

    #[test]
    fn update_keeps_association() {
        let mut l = ledger();
        let inv = sent_invoice(&mut l, date(2026, 3, 31));
        let p = pay(&mut l, Some(inv.id), dec!(100)).unwrap();
        let updated = l
            .update_payment(
                p.id,
                PaymentPatch {
                    amount: Some(dec!(220)),
                    ..Default::default()
                },
                &staff(),
                now(),
            )
            .unwrap();
        assert_eq!(updated.invoice_id, Some(inv.id));
        assert_eq!(l.invoice(inv.id).unwrap().status, InvoiceStatus::Paid);
    }

    #[test]
    fn unknown_payment_is_not_found() {
        let mut l = ledger();
        let id = PaymentId::new();
        assert_eq!(
            l.delete_payment(id, &staff(), now()).unwrap_err(),
            LedgerError::PaymentNotFound(id)
        );
    }

    #[test]
    fn invoice_with_payments_cannot_be_deleted() {
        let mut l = ledger();
        let inv = sent_invoice(&mut l, date(2026, 3, 31));
        pay(&mut l, Some(inv.id), dec!(10)).unwrap();
        assert!(matches!(
            l.delete_invoice(inv.id, &staff(), now()),
            Err(LedgerError::InvoiceHasPayments { count: 1, .. })
        ));
    }

    #[test]
    fn deleting_last_invoice_returns_rollup_to_draft() {
        let mut l = ledger();
        let inv = sent_invoice(&mut l, date(2026, 3, 31));
        l.delete_invoice(inv.id, &staff(), now()).unwrap();
        assert_eq!(l.shipment().invoice_status, InvoiceStatus::Draft);
        assert!(l.changes().invoice_deletes.contains(&inv.id));
        assert!(!l.changes().invoice_upserts.contains_key(&inv.id));
    }

    #[test]
    fn recalc_of_vanished_invoice_is_none() {
        let mut l = ledger();
        assert!(l.recalc_invoice_paid_status(InvoiceId::new(), now()).is_none());
    }

    #[test]
    fn status_changes_are_audited_as_system() {
        let mut l = ledger();
        let inv = sent_invoice(&mut l, date(2026, 3, 31));
        pay(&mut l, Some(inv.id), dec!(220)).unwrap();
        let changes = l.into_changes();
        let system: Vec<_> = changes
            .audit
            .iter()
            .filter(|e| e.action == AuditAction::StatusChange)
            .collect();
        assert!(system.iter().all(|e| e.actor.is_system()));
        assert!(system.iter().any(|e| e.entity_type == "invoice"));
        assert!(system.iter().any(|e| e.entity_type == "shipment"));
        assert_eq!(changes.invoice_transitions.len(), 1);
        assert_eq!(
            changes.shipment_transition,
            Some(StatusTransition {
                from: InvoiceStatus::Draft,
                to: InvoiceStatus::Paid
            })
        );
    }

    #[test]
    fn recalculation_is_idempotent() {
        let mut l = ledger();
        let inv = sent_invoice(&mut l, date(2026, 3, 31));
        pay(&mut l, Some(inv.id), dec!(220)).unwrap();
        let audit_before = l.changes().audit.len();
        let first = l.recalc_invoice_paid_status(inv.id, now());
        let second = l.recalc_invoice_paid_status(inv.id, now());
        assert_eq!(first, second);
        l.recalc_shipment_invoice_status(now());
        assert_eq!(l.changes().audit.len(), audit_before);
    }

    proptest! {
        #[test]
        fn completed_payments_never_decrease_total(
            amounts in proptest::collection::vec(1u32..50_000, 1..10),
        ) {
            let mut l = ledger();
            let inv = sent_invoice(&mut l, date(2026, 3, 31));
            let mut last = Decimal::ZERO;
            for cents in amounts {
                pay(&mut l, Some(inv.id), Decimal::new(i64::from(cents), 2)).unwrap();
                let total = l.sum_completed(inv.id);
                prop_assert!(total >= last);
                last = total;
                if total >= inv.amount {
                    prop_assert_eq!(l.invoice(inv.id).unwrap().status, InvoiceStatus::Paid);
                }
            }
        }
    }
}
