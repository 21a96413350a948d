//! Audit event persistence: immutable hash chain.
//!
//! Entries arrive already sealed by [`fwd_core::AuditTrail::prepare`]; this
//! module only stores and reloads them. Rows are never updated or deleted.
//! `seq` preserves append order, which is the order the chain is verified in.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use fwd_core::{Actor, AuditAction, AuditEntry, Timestamp};

/// Append sealed entries in order.
pub async fn insert_batch(conn: &mut PgConnection, entries: &[AuditEntry]) -> Result<(), sqlx::Error> {
    for entry in entries {
        let actor = entry
            .actor
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| sqlx::Error::Protocol(format!("failed to serialize audit actor: {e}")))?;

        sqlx::query(
            "INSERT INTO audit_events (id, timestamp, actor, action, entity_type, entity_id,
                 entity_ref, description, meta, prev_hash, entry_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(entry.id)
        .bind(entry.timestamp.as_datetime())
        .bind(&actor)
        .bind(entry.action.as_str())
        .bind(&entry.entity_type)
        .bind(&entry.entity_id)
        .bind(&entry.entity_ref)
        .bind(&entry.description)
        .bind(&entry.meta)
        .bind(&entry.prev_hash)
        .bind(&entry.entry_hash)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Load the full chain in append order.
pub async fn load_all(pool: &PgPool) -> Result<Vec<AuditEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditEventRow>(
        "SELECT id, timestamp, actor, action, entity_type, entity_id, entity_ref,
             description, meta, prev_hash, entry_hash
         FROM audit_events ORDER BY seq ASC",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(AuditEventRow::into_entry).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct AuditEventRow {
    id: Uuid,
    timestamp: DateTime<Utc>,
    actor: Option<serde_json::Value>,
    action: String,
    entity_type: String,
    entity_id: Option<String>,
    entity_ref: Option<String>,
    description: String,
    meta: serde_json::Value,
    prev_hash: String,
    entry_hash: String,
}

impl AuditEventRow {
    fn into_entry(self) -> Result<AuditEntry, sqlx::Error> {
        let actor: Option<Actor> = self
            .actor
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let action: AuditAction = self
            .action
            .parse()
            .map_err(|e: fwd_core::ValidationError| sqlx::Error::Decode(Box::new(e)))?;
        Ok(AuditEntry {
            id: self.id,
            timestamp: Timestamp::from_datetime(self.timestamp),
            actor,
            action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            entity_ref: self.entity_ref,
            description: self.description,
            meta: self.meta,
            prev_hash: self.prev_hash.trim().to_string(),
            entry_hash: self.entry_hash.trim().to_string(),
        })
    }
}
