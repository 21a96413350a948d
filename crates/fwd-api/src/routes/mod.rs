//! # API Route Modules
//!
//! - `shipments`: shipment registry, per-shipment invoice views and the
//!   on-demand rollup refresh.
//! - `invoices`: invoice CRUD, the detail view with paid/balance amounts,
//!   and the totals preview.
//! - `payments`: the payment ledger. Every write runs the
//!   payment → invoice → shipment cascade before responding.
//! - `compliance`: compliance review tasks and the approve/reject decision.
//! - `audit`: read-only audit log and chain verification (MANAGER+).

pub mod audit;
pub mod compliance;
pub mod invoices;
pub mod payments;
pub mod shipments;
