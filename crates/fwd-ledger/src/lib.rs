//! # fwd-ledger: Invoices, Payments and the Reconciliation Cascade
//!
//! - [`totals`]: the invoice totals calculator (subtotal, tax, TDS, net).
//! - [`invoice`], [`payment`], [`shipment`]: the records the cascade works on.
//! - [`ledger`]: [`ShipmentLedger`], a snapshot of one shipment's invoices
//!   and payments. Every mutation runs the cascade
//!   (payment → invoice status → shipment rollup) synchronously and records
//!   what changed in a [`ChangeSet`] for the caller to persist.
//!
//! ## Cascade ordering
//!
//! Within one mutation the invoice resolver always runs before the shipment
//! aggregator, and the aggregator reads the invoice rows as the resolver
//! left them.

pub mod error;
pub mod invoice;
pub mod ledger;
pub mod payment;
pub mod shipment;
pub mod totals;

pub use error::LedgerError;
pub use invoice::{Invoice, InvoiceDetail, InvoicePatch, NewInvoice};
pub use ledger::{ChangeSet, PaidStatusSummary, ShipmentLedger};
pub use payment::{NewPayment, Payment, PaymentMethod, PaymentPatch, PaymentStatus};
pub use shipment::{NewShipment, Shipment};
pub use totals::{
    calculate, validate_line_items, validate_tds_rate, InvoiceTotals, LineItem, MAX_LINE_ITEMS,
};

/// Currency used when neither the request nor the linked invoice names one.
pub const DEFAULT_CURRENCY: &str = "INR";
