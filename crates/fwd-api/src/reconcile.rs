//! # Cascade Runner
//!
//! Runs a ledger mutation for one shipment with the full write protocol:
//!
//! ```text
//! lock shipment ─▶ snapshot ShipmentLedger ─▶ mutate + cascade
//!   ─▶ lock audit trail ─▶ seal audit batch
//!   ─▶ Postgres: SERIALIZABLE tx (rows + audit)   [if configured]
//!   ─▶ commit audit batch ─▶ apply change set to stores
//! ```
//!
//! The shipment lock is held for the whole sequence, so concurrent writes
//! against the same shipment are serialized and the rollup always reflects
//! the last committed state. Nothing becomes visible in memory before the
//! database transaction commits; a failed mutation leaves no trace.

use fwd_core::{NewAuditEntry, ShipmentId, Timestamp, ValidationError};
use fwd_ledger::{ChangeSet, LedgerError, Shipment, ShipmentLedger};
use fwd_state::ComplianceTask;

use crate::error::AppError;
use crate::state::AppState;

/// Run `op` against a fresh snapshot of `shipment_id` and commit what it
/// changed.
///
/// An unknown shipment is a validation error: callers reach this with a
/// shipment id taken from the request or from an existing row.
pub async fn run_cascade<T, F>(state: &AppState, shipment_id: ShipmentId, op: F) -> Result<T, AppError>
where
    F: FnOnce(&mut ShipmentLedger, Timestamp) -> Result<T, LedgerError>,
{
    let _guard = state.shipment_locks.lock(shipment_id).await;

    let shipment = state
        .shipments
        .get(&shipment_id)
        .ok_or_else(|| ValidationError::UnknownShipment(shipment_id.to_string()))?;
    let mut ledger = ShipmentLedger::new(
        shipment,
        state.invoices.list_where(|i| i.shipment_id == shipment_id),
        state.payments.list_where(|p| p.shipment_id == shipment_id),
    );

    let now = Timestamp::now();
    let output = op(&mut ledger, now)?;
    let mut changes = ledger.into_changes();
    if changes.is_empty() {
        return Ok(output);
    }

    let audit = std::mem::take(&mut changes.audit);
    commit_audited(state, audit, now, PendingWrite::Changes(&changes)).await?;

    state.apply_changes(&changes);
    record_cascade_metrics(&changes);
    Ok(output)
}

/// Rows to persist alongside an audit batch.
#[derive(Debug, Clone, Copy)]
pub enum PendingWrite<'a> {
    /// A cascade's change set.
    Changes(&'a ChangeSet),
    /// A newly registered shipment.
    Shipment(&'a Shipment),
    /// A created or decided compliance task.
    Task(&'a ComplianceTask),
}

/// Seal `batch` into the audit chain, persist it with `write` when a
/// database is configured, and commit it to the in-memory trail only once
/// the database transaction has committed.
///
/// The trail lock is held across the database write, so chain order in
/// Postgres matches chain order in memory.
pub async fn commit_audited(
    state: &AppState,
    batch: Vec<NewAuditEntry>,
    now: Timestamp,
    write: PendingWrite<'_>,
) -> Result<(), AppError> {
    let mut trail = state.audit.lock().await;
    let sealed = trail.prepare(batch, now);
    if let Some(pool) = &state.db_pool {
        match write {
            PendingWrite::Changes(changes) => {
                crate::db::persist_changes(pool, changes, &sealed).await?
            }
            PendingWrite::Shipment(shipment) => {
                crate::db::persist_shipment(pool, shipment, &sealed).await?
            }
            PendingWrite::Task(task) => crate::db::persist_task(pool, task, &sealed).await?,
        }
    }
    trail.commit(sealed);
    Ok(())
}

fn record_cascade_metrics(changes: &ChangeSet) {
    for (_, transition) in &changes.invoice_transitions {
        metrics::counter!(
            "fwd_invoice_status_transitions_total",
            "from" => transition.from.as_str(),
            "to" => transition.to.as_str()
        )
        .increment(1);
    }
    if let Some(transition) = changes.shipment_transition {
        metrics::counter!(
            "fwd_shipment_rollup_transitions_total",
            "to" => transition.to.as_str()
        )
        .increment(1);
    }
}
