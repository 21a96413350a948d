#![deny(missing_docs)]

//! # fwd-core: Foundational Types for the Freight Back Office
//!
//! Every other crate in the workspace depends on this one. It has no
//! internal crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass a [`PaymentId`]
//!    where an [`InvoiceId`] is expected.
//!
//! 2. **One money module.** Amounts are [`Decimal`]. Rounding, input bounds
//!    and the "fully paid" tolerance ([`MONEY_EPSILON`]) are defined once in
//!    [`money`] and used by every calculation in the stack.
//!
//! 3. **Actors are resolved, never trusted.** An [`Actor`] only exists after a
//!    [`SessionSigner`] has verified a token, or as the explicit system actor.
//!
//! 4. **Append-only audit.** [`AuditTrail`] never updates or removes an entry;
//!    each entry is hash-chained to its predecessor.

pub mod actor;
pub mod audit;
pub mod error;
pub mod identity;
pub mod money;
pub mod session;
pub mod temporal;

pub use actor::{Actor, Role};
pub use audit::{AuditAction, AuditEntry, AuditTrail, ChainIntegrity, NewAuditEntry};
pub use error::{FwdError, SessionError, ValidationError};
pub use identity::{InvoiceId, PaymentId, ShipmentId, TaskId, UserId};
pub use money::{
    approx_gte, check_magnitude, check_rate, percent_of, round_money, MAX_MAGNITUDE, MAX_RATE,
    MONEY_EPSILON, MONEY_SCALE,
};
pub use rust_decimal::Decimal;
pub use session::{SessionClaims, SessionSigner};
pub use temporal::{parse_calendar_date, Timestamp};
