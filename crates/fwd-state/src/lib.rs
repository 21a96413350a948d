//! # fwd-state: Status Domains and State Machines
//!
//! Pure decision logic for the financial core. Nothing here performs I/O or
//! reads the clock; callers pass `now` explicitly so every rule is
//! deterministic under test.
//!
//! ## State Machines
//!
//! - **Invoice status** (`invoice.rs`): `DRAFT | SENT | PAID | OVERDUE`.
//!   [`effective_status`] applies the due-date rule at read time and
//!   [`resolve_paid_status`] decides the PAID/SENT transition after a
//!   payment change.
//!
//! - **Shipment rollup** (`rollup.rs`): [`rollup_status`] combines the
//!   effective statuses of a shipment's invoices with fixed precedence.
//!
//! - **Compliance task** (`compliance.rs`): `PENDING → APPROVED` or
//!   `PENDING → REJECTED`, each terminal.

pub mod compliance;
pub mod invoice;
pub mod rollup;

pub use compliance::{
    ComplianceError, ComplianceTask, Decision, EntityRef, NewComplianceTask, Priority,
    StatusFilter, TaskStatus, TaskType,
};
pub use invoice::{effective_status, resolve_paid_status, InvoiceStatus, StatusTransition};
pub use rollup::rollup_status;
