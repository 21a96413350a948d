//! # Invoice Totals Calculator
//!
//! ```text
//! taxable   = taxableValue ?? quantity * rate        (per item)
//! subtotal  = Σ taxable
//! totalTax  = Σ taxable * taxRate / 100
//! total     = subtotal + totalTax
//! tdsAmount = tdsRate > 0 ? total * tdsRate / 100 : 0
//! amount    = total - tdsAmount
//! ```
//!
//! All arithmetic is [`Decimal`]. Each component is rounded to minor units
//! after summation and `amount` is derived from the rounded components, so
//! `amount == subtotal + totalTax - tdsAmount` holds exactly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fwd_core::{check_magnitude, check_rate, percent_of, round_money, ValidationError, MAX_RATE};

/// Most line items one invoice may carry.
pub const MAX_LINE_ITEMS: usize = 500;

/// One billable line on an invoice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Units billed.
    #[serde(default)]
    pub quantity: Decimal,
    /// Price per unit.
    #[serde(default)]
    pub rate: Decimal,
    /// Tax percentage applied to the taxable value.
    #[serde(default)]
    pub tax_rate: Decimal,
    /// Overrides `quantity * rate` when present.
    #[serde(default)]
    pub taxable_value: Option<Decimal>,
}

impl LineItem {
    /// An item with no description or override.
    pub fn new(quantity: Decimal, rate: Decimal, tax_rate: Decimal) -> Self {
        Self {
            description: None,
            quantity,
            rate,
            tax_rate,
            taxable_value: None,
        }
    }

    /// The override if present, else `quantity * rate`.
    pub fn taxable(&self) -> Decimal {
        self.taxable_value
            .unwrap_or_else(|| self.quantity.saturating_mul(self.rate))
    }

    /// Tax on [`taxable`](Self::taxable).
    pub fn tax(&self) -> Decimal {
        percent_of(self.taxable(), self.tax_rate)
    }

    /// Reject quantities, rates or overrides beyond the accepted magnitude.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_magnitude("quantity", self.quantity)?;
        check_magnitude("rate", self.rate)?;
        check_rate("taxRate", self.tax_rate)?;
        if let Some(taxable) = self.taxable_value {
            check_magnitude("taxableValue", taxable)?;
        }
        Ok(())
    }

    /// A copy with every out-of-range number replaced by zero.
    pub fn sanitized(&self) -> Self {
        let bounded = |field, v| check_magnitude(field, v).unwrap_or(Decimal::ZERO);
        Self {
            description: self.description.clone(),
            quantity: bounded("quantity", self.quantity),
            rate: bounded("rate", self.rate),
            tax_rate: check_rate("taxRate", self.tax_rate).unwrap_or(Decimal::ZERO),
            taxable_value: self.taxable_value.map(|v| bounded("taxableValue", v)),
        }
    }
}

/// Validate every item and the item count.
pub fn validate_line_items(items: &[LineItem]) -> Result<(), ValidationError> {
    if items.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::TooManyItems(MAX_LINE_ITEMS));
    }
    items.iter().try_for_each(LineItem::validate)
}

/// Output of [`calculate`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceTotals {
    /// Sum of taxable values.
    pub subtotal: Decimal,
    /// Sum of item taxes.
    pub total_tax: Decimal,
    /// Tax deducted at source.
    pub tds_amount: Decimal,
    /// Net payable: `subtotal + totalTax - tdsAmount`.
    pub amount: Decimal,
}

/// Compute invoice totals. Pure; order of `items` does not matter.
pub fn calculate(items: &[LineItem], tds_rate: Decimal) -> InvoiceTotals {
    let (subtotal, total_tax) = items.iter().map(LineItem::sanitized).fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(sub, tax), item| (sub.saturating_add(item.taxable()), tax.saturating_add(item.tax())),
    );

    let subtotal = round_money(subtotal);
    let total_tax = round_money(total_tax);
    let invoice_total = subtotal.saturating_add(total_tax);
    let tds_amount = if tds_rate > Decimal::ZERO {
        round_money(percent_of(invoice_total, tds_rate.min(MAX_RATE)))
    } else {
        Decimal::ZERO
    };

    InvoiceTotals {
        subtotal,
        total_tax,
        tds_amount,
        amount: round_money(invoice_total.saturating_sub(tds_amount)),
    }
}

/// Accept a TDS rate with `0 <= rate <= MAX_RATE`.
pub fn validate_tds_rate(rate: Decimal) -> Result<Decimal, ValidationError> {
    if rate < Decimal::ZERO {
        return Err(ValidationError::InvalidRate {
            field: "tdsRate",
            value: rate,
        });
    }
    check_rate("tdsRate", rate)
}
