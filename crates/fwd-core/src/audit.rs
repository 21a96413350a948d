//! # Audit Log
//!
//! Every mutation in the back office appends one or more [`AuditEntry`]
//! values describing who did what to which business object.
//!
//! ## Security Invariant
//!
//! The trail is append-only. Each entry stores the hash of its predecessor
//! and its own SHA-256 hash over that link plus its fields, so editing or
//! removing an entry anywhere in the trail is reported by
//! [`AuditTrail::verify_chain`].
//!
//! ## Two-phase append
//!
//! Callers that persist entries alongside other rows first [`AuditTrail::prepare`]
//! a batch chained from the current head, write it, and only then
//! [`AuditTrail::commit`] it. The caller holds exclusive access to the trail
//! across both calls.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::actor::Actor;
use crate::error::ValidationError;
use crate::temporal::Timestamp;

/// Hash the first entry of a trail links to.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// The kind of mutation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// An entity was created.
    Create,
    /// An entity's fields were edited.
    Update,
    /// An entity was deleted.
    Delete,
    /// A compliance reviewer approved a task.
    Approve,
    /// A compliance reviewer rejected a task.
    Reject,
    /// The system derived a new status for an invoice or shipment.
    StatusChange,
}

impl AuditAction {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::StatusChange => "STATUS_CHANGE",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            "APPROVE" => Ok(Self::Approve),
            "REJECT" => Ok(Self::Reject),
            "STATUS_CHANGE" => Ok(Self::StatusChange),
            _ => Err(ValidationError::UnknownVariant {
                kind: "audit action",
                value: s.to_string(),
                allowed: "CREATE, UPDATE, DELETE, APPROVE, REJECT, STATUS_CHANGE",
            }),
        }
    }
}

/// An audit entry before it has been placed in the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    /// Who performed the action. [`Actor::system`] for derived writes.
    pub actor: Actor,
    /// What kind of mutation.
    pub action: AuditAction,
    /// Type of the business object (e.g. `"invoice"`).
    pub entity_type: String,
    /// Identifier of the business object.
    pub entity_id: Option<String>,
    /// Human-facing reference (invoice number, shipment reference).
    pub entity_ref: Option<String>,
    /// One-line description shown to operators.
    pub description: String,
    /// Free-form structured context.
    pub meta: serde_json::Value,
}

impl NewAuditEntry {
    /// Start an entry with no id, ref or metadata.
    pub fn new(
        actor: Actor,
        action: AuditAction,
        entity_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            actor,
            action,
            entity_type: entity_type.into(),
            entity_id: None,
            entity_ref: None,
            description: description.into(),
            meta: serde_json::Value::Null,
        }
    }

    /// Set the entity id.
    pub fn entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    /// Set the entity display reference.
    pub fn entity_ref(mut self, entity_ref: impl Into<String>) -> Self {
        self.entity_ref = Some(entity_ref.into());
        self
    }

    /// Attach metadata.
    pub fn meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = meta;
        self
    }
}

/// A sealed, chained audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Unique entry id.
    pub id: Uuid,
    /// When the entry was written.
    pub timestamp: Timestamp,
    /// `None` for system or anonymous actions.
    pub actor: Option<Actor>,
    /// What kind of mutation.
    pub action: AuditAction,
    /// Type of the business object.
    pub entity_type: String,
    /// Identifier of the business object.
    pub entity_id: Option<String>,
    /// Human-facing reference.
    pub entity_ref: Option<String>,
    /// One-line description.
    pub description: String,
    /// Structured context with normalized timestamps.
    pub meta: serde_json::Value,
    /// Hash of the preceding entry, or [`GENESIS_HASH`].
    pub prev_hash: String,
    /// SHA-256 over `prev_hash` and this entry's fields.
    pub entry_hash: String,
}

impl AuditEntry {
    /// Seal `new` into the chain after `prev_hash`.
    pub fn seal(new: NewAuditEntry, prev_hash: &str, timestamp: Timestamp) -> Self {
        let actor = if new.actor.is_system() {
            None
        } else {
            Some(new.actor)
        };
        let mut entry = Self {
            id: Uuid::new_v4(),
            timestamp,
            actor,
            action: new.action,
            entity_type: new.entity_type,
            entity_id: new.entity_id,
            entity_ref: new.entity_ref,
            description: new.description,
            meta: normalize_meta(new.meta),
            prev_hash: prev_hash.to_string(),
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.compute_hash();
        entry
    }

    /// Recompute the hash from the stored fields.
    pub fn compute_hash(&self) -> String {
        let actor = self.actor.clone().unwrap_or_default();
        let id = self.id.to_string();
        let timestamp = self.timestamp.to_iso_string();
        let actor_id = actor.id.map(|id| id.to_string()).unwrap_or_default();
        let meta = canonical_json(&self.meta);
        let fields: [&str; 12] = [
            &self.prev_hash,
            &id,
            &timestamp,
            &actor_id,
            actor.name.as_deref().unwrap_or_default(),
            actor.role.map(|r| r.as_str()).unwrap_or_default(),
            self.action.as_str(),
            &self.entity_type,
            self.entity_id.as_deref().unwrap_or_default(),
            self.entity_ref.as_deref().unwrap_or_default(),
            &self.description,
            &meta,
        ];
        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update(field.as_bytes());
            hasher.update([0x1f]);
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// Result of walking the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainIntegrity {
    /// Entries inspected.
    pub total_entries: usize,
    /// Entries whose link or own hash does not verify.
    pub broken_links: usize,
    /// The first offending entry, if any.
    pub first_broken: Option<Uuid>,
    /// `broken_links == 0`.
    pub chain_valid: bool,
}

/// Append-only, hash-chained audit trail.
///
/// Not `Sync` on its own; share it behind a lock.
#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    /// An empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a trail from persisted entries in chain order.
    pub fn from_entries(entries: Vec<AuditEntry>) -> Self {
        Self { entries }
    }

    /// Hash of the newest entry, or [`GENESIS_HASH`].
    pub fn head_hash(&self) -> &str {
        self.entries
            .last()
            .map(|e| e.entry_hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }

    /// Seal a batch chained from the current head without appending it.
    pub fn prepare(&self, batch: Vec<NewAuditEntry>, now: Timestamp) -> Vec<AuditEntry> {
        let mut prev = self.head_hash().to_string();
        batch
            .into_iter()
            .map(|new| {
                let entry = AuditEntry::seal(new, &prev, now);
                prev = entry.entry_hash.clone();
                entry
            })
            .collect()
    }

    /// Append a batch produced by [`prepare`](Self::prepare).
    pub fn commit(&mut self, sealed: Vec<AuditEntry>) {
        if let Some(first) = sealed.first() {
            if first.prev_hash != self.head_hash() {
                tracing::warn!(
                    entry_id = %first.id,
                    "audit batch does not extend the current head; chain will report a broken link"
                );
            }
        }
        self.entries.extend(sealed);
    }

    /// Seal and append a single entry.
    pub fn append(&mut self, new: NewAuditEntry, now: Timestamp) -> AuditEntry {
        let entry = AuditEntry::seal(new, self.head_hash(), now);
        self.entries.push(entry.clone());
        entry
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries matching the filters, newest first, at most `limit`.
    pub fn entries_for(
        &self,
        entity_type: Option<&str>,
        entity_id: Option<&str>,
        limit: usize,
    ) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .rev()
            .filter(|e| entity_type.map_or(true, |t| e.entity_type == t))
            .filter(|e| entity_id.map_or(true, |id| e.entity_id.as_deref() == Some(id)))
            .take(limit)
            .collect()
    }

    /// Walk the chain and check every link and hash.
    pub fn verify_chain(&self) -> ChainIntegrity {
        let mut broken_links = 0;
        let mut first_broken = None;
        let mut expected_prev = GENESIS_HASH;

        for entry in &self.entries {
            if entry.prev_hash != expected_prev || entry.compute_hash() != entry.entry_hash {
                broken_links += 1;
                first_broken.get_or_insert(entry.id);
            }
            expected_prev = entry.entry_hash.as_str();
        }

        ChainIntegrity {
            total_entries: self.entries.len(),
            broken_links,
            first_broken,
            chain_valid: broken_links == 0,
        }
    }
}

/// Rewrite every RFC 3339 timestamp string in `meta` to canonical UTC
/// (`YYYY-MM-DDTHH:MM:SS.sssZ`). Other values pass through unchanged.
pub fn normalize_meta(meta: serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match meta {
        Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(dt) => Value::String(Timestamp::from_datetime(dt.with_timezone(&Utc)).to_iso_string()),
            Err(_) => Value::String(s),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_meta).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, normalize_meta(v)))
                .collect(),
        ),
        other => other,
    }
}

/// JSON text with object keys sorted at every level.
fn canonical_json(value: &serde_json::Value) -> String {
    use serde_json::Value;
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        Value::String(k.clone()),
                        canonical_json(&map[k.as_str()])
                    )
                })
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}
