//! # fwd-cli: CLI Tool for the Freight Back Office
//!
//! ## Subcommands
//!
//! - `fwd totals`: compute invoice totals (subtotal, tax, TDS, net) from a
//!   JSON or YAML file of line items.
//! - `fwd token`: issue and verify actor session tokens for the API.
//!
//! ```bash
//! fwd totals items.yaml --tds-rate 2
//! fwd token issue --secret "$SESSION_SECRET" --user-id <uuid> --name Priya --role MANAGER
//! fwd token verify --secret "$SESSION_SECRET" v1.7b22...
//! ```

pub mod token;
pub mod totals;
