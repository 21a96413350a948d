//! # Identifier Newtypes
//!
//! Each identifier is a distinct type wrapping a UUID. They are always valid
//! by construction and serialize as the bare UUID string, so the wire shape
//! is unaffected by the wrapper.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a shipment (the external entity that owns invoices).
    ShipmentId
);
uuid_id!(
    /// Identifier of an invoice.
    InvoiceId
);
uuid_id!(
    /// Identifier of a payment ledger entry.
    PaymentId
);
uuid_id!(
    /// Identifier of a compliance review task.
    TaskId
);
uuid_id!(
    /// Identifier of a back-office user (the subject of a session token).
    UserId
);
