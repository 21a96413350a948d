//! # Actors and Roles
//!
//! An [`Actor`] is the identity a mutation is attributed to. Requests carry
//! one resolved from a verified session token; cascade steps the system
//! performs on its own behalf use [`Actor::system`], whose fields are all
//! `None` and which the audit log stores as a null actor.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::identity::UserId;

/// Back-office roles, ordered by privilege.
///
/// `Ord` follows declaration order (`Staff < Manager < Admin`), so access
/// checks are a single `>=` comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Day-to-day operations: shipments, invoices, payments.
    Staff,
    /// Staff rights plus compliance review and audit access.
    Manager,
    /// Everything.
    Admin,
}

impl Role {
    /// Wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Staff => "STAFF",
            Self::Manager => "MANAGER",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STAFF" => Ok(Self::Staff),
            "MANAGER" => Ok(Self::Manager),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(ValidationError::UnknownVariant {
                kind: "role",
                value: s.to_string(),
                allowed: "STAFF, MANAGER, ADMIN",
            }),
        }
    }
}

/// The identity a mutation is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// The user id; `None` for system or anonymous actions.
    pub id: Option<UserId>,
    /// Display name.
    pub name: Option<String>,
    /// Role at the time of the action.
    pub role: Option<Role>,
}

impl Actor {
    /// A fully resolved user actor.
    pub fn user(id: UserId, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: Some(id),
            name: Some(name.into()),
            role: Some(role),
        }
    }

    /// The system actor used for derived writes (status recalculation).
    pub fn system() -> Self {
        Self::default()
    }

    /// Whether this actor carries no identity at all.
    pub fn is_system(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.role.is_none()
    }

    /// Whether the actor holds at least `minimum`.
    pub fn has_role(&self, minimum: Role) -> bool {
        self.role.is_some_and(|r| r >= minimum)
    }
}
