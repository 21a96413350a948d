//! # Payments
//!
//! A payment belongs to a shipment and optionally to one of its invoices.
//! Only `COMPLETED` payments count toward any monetary total; `PENDING` and
//! `FAILED` rows are excluded entirely.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fwd_core::{
    check_magnitude, InvoiceId, PaymentId, ShipmentId, Timestamp, ValidationError, MONEY_SCALE,
};

const MAX_TEXT_LEN: usize = 500;

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Unified Payments Interface.
    Upi,
    /// Cash.
    Cash,
    /// Bank account transfer.
    Account,
    /// Cheque.
    Cheque,
    /// Anything else.
    Other,
}

impl PaymentMethod {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upi => "UPI",
            Self::Cash => "CASH",
            Self::Account => "ACCOUNT",
            Self::Cheque => "CHEQUE",
            Self::Other => "OTHER",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UPI" => Ok(Self::Upi),
            "CASH" => Ok(Self::Cash),
            "ACCOUNT" => Ok(Self::Account),
            "CHEQUE" => Ok(Self::Cheque),
            "OTHER" => Ok(Self::Other),
            _ => Err(ValidationError::UnknownVariant {
                kind: "payment method",
                value: s.to_string(),
                allowed: "UPI, CASH, ACCOUNT, CHEQUE, OTHER",
            }),
        }
    }
}

/// Settlement state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Initiated, not yet settled.
    Pending,
    /// Settled. The only status that counts toward totals.
    #[default]
    Completed,
    /// Bounced or reversed.
    Failed,
}

impl PaymentStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            _ => Err(ValidationError::UnknownVariant {
                kind: "payment status",
                value: s.to_string(),
                allowed: "PENDING, COMPLETED, FAILED",
            }),
        }
    }
}

/// A payment ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Payment id.
    pub id: PaymentId,
    /// Owning shipment.
    pub shipment_id: ShipmentId,
    /// Settled invoice, if any. Never re-pointed after creation.
    pub invoice_id: Option<InvoiceId>,
    /// Amount, strictly positive, at most two decimal places.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Payment method.
    pub method: PaymentMethod,
    /// Settlement state.
    pub status: PaymentStatus,
    /// Payment date.
    pub date: NaiveDate,
    /// Bank or UPI transaction reference.
    pub transaction_num: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

impl Payment {
    /// Whether this payment counts toward totals.
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// Input for recording a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    /// Owning shipment.
    pub shipment_id: ShipmentId,
    /// Invoice to settle.
    pub invoice_id: Option<InvoiceId>,
    /// Amount, must be `> 0`.
    pub amount: Decimal,
    /// Defaults to the invoice's currency, else the ledger default.
    pub currency: Option<String>,
    /// Payment method.
    pub method: PaymentMethod,
    /// Defaults to `COMPLETED`.
    pub status: Option<PaymentStatus>,
    /// Defaults to today (UTC).
    pub date: Option<NaiveDate>,
    /// Transaction reference.
    pub transaction_num: Option<String>,
    /// Notes.
    pub notes: Option<String>,
}

/// Fields an operator may change on an existing payment.
///
/// The shipment and invoice association is fixed at creation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaymentPatch {
    /// New amount, must be `> 0`.
    pub amount: Option<Decimal>,
    /// New currency.
    pub currency: Option<String>,
    /// New method.
    pub method: Option<PaymentMethod>,
    /// New status.
    pub status: Option<PaymentStatus>,
    /// New date.
    pub date: Option<NaiveDate>,
    /// New transaction reference.
    pub transaction_num: Option<String>,
    /// New notes.
    pub notes: Option<String>,
}

impl PaymentPatch {
    /// Whether the patch changes anything that feeds a monetary total.
    pub fn touches_totals(&self) -> bool {
        self.amount.is_some() || self.status.is_some()
    }
}

/// Accept a strictly positive amount in whole minor units.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount(amount));
    }
    let amount = check_magnitude("amount", amount)?.normalize();
    if amount.scale() > MONEY_SCALE {
        return Err(ValidationError::Rule(format!(
            "amount must not have more than {MONEY_SCALE} decimal places, got {amount}"
        )));
    }
    Ok(amount)
}

/// Normalize a currency code: trimmed, upper-case, three ASCII letters.
pub fn normalize_currency(code: &str) -> Result<String, ValidationError> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(ValidationError::Rule(format!(
            "currency must be a three-letter code, got \"{code}\""
        )))
    }
}

/// Trim optional free text; blank becomes `None`.
pub(crate) fn clean_text(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, ValidationError> {
    let value = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    if value.as_ref().is_some_and(|v| v.len() > MAX_TEXT_LEN) {
        return Err(ValidationError::TooLong {
            field,
            max: MAX_TEXT_LEN,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn method_parses_wire_names() {
        assert_eq!("upi".parse::<PaymentMethod>().unwrap(), PaymentMethod::Upi);
        assert_eq!("CHEQUE".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cheque);
        let err = "BITCOIN".parse::<PaymentMethod>().unwrap_err();
        assert!(err.to_string().contains("UPI, CASH, ACCOUNT, CHEQUE, OTHER"));
    }

    #[test]
    fn status_defaults_to_completed() {
        assert_eq!(PaymentStatus::default(), PaymentStatus::Completed);
        assert!("SETTLED".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn amount_must_be_positive() {
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(dec!(-5)).is_err());
        assert_eq!(validate_amount(dec!(10.50)), Ok(dec!(10.5)));
    }

    #[test]
    fn amount_rejects_fractions_of_a_cent_and_oversize() {
        let err = validate_amount(dec!(10.005)).unwrap_err();
        assert!(err.to_string().contains("decimal places"));
        assert!(validate_amount(dec!(10.0050)).is_err());
        assert!(validate_amount(dec!(2000000000000)).is_err());
        assert_eq!(validate_amount(dec!(100000000001.75)), Ok(dec!(100000000001.75)));
    }

    #[test]
    fn currency_normalized() {
        assert_eq!(normalize_currency(" usd ").unwrap(), "USD");
        assert!(normalize_currency("RUPEES").is_err());
        assert!(normalize_currency("").is_err());
    }

    #[test]
    fn clean_text_drops_blank() {
        assert_eq!(clean_text("notes", Some("  ".to_string())).unwrap(), None);
        assert_eq!(
            clean_text("notes", Some(" ok ".to_string())).unwrap().as_deref(),
            Some("ok")
        );
        assert!(clean_text("notes", Some("x".repeat(501))).is_err());
    }
}
