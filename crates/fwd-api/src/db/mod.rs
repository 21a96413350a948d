//! # Database Persistence Layer
//!
//! Postgres persistence for the financial core via SQLx.
//!
//! ## Architecture
//!
//! The database layer is **optional**. When `DATABASE_URL` is set, every
//! write is committed to PostgreSQL before it is applied to the in-memory
//! stores. When absent, the API operates in in-memory-only mode (suitable
//! for development and testing).
//!
//! ## Transactions
//!
//! Each logical mutation is one `SERIALIZABLE` transaction containing both
//! its rows and the audit entries describing it: a cascade's change set
//! (shipment rollup, invoices, payments) or a single compliance task. A
//! mutation is therefore either fully durable with its audit trail or not
//! durable at all.

pub mod audit;
pub mod compliance_tasks;
pub mod invoices;
pub mod payments;
pub mod shipments;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use fwd_core::AuditEntry;
use fwd_ledger::{ChangeSet, Shipment};
use fwd_state::ComplianceTask;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if no database URL is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let url = match database_url {
        Some(url) => url,
        None => {
            tracing::warn!(
                "DATABASE_URL not set: running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

async fn begin_serializable(pool: &PgPool) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Persist a cascade's change set together with its sealed audit entries.
///
/// Parents are written before children and children deleted before
/// parents, so foreign keys hold at every statement.
pub async fn persist_changes(
    pool: &PgPool,
    changes: &ChangeSet,
    audit_entries: &[AuditEntry],
) -> Result<(), sqlx::Error> {
    let mut tx = begin_serializable(pool).await?;

    if let Some(shipment) = &changes.shipment {
        shipments::upsert(&mut tx, shipment).await?;
    }
    for invoice in changes.invoice_upserts.values() {
        invoices::upsert(&mut tx, invoice).await?;
    }
    for payment in changes.payment_upserts.values() {
        payments::upsert(&mut tx, payment).await?;
    }
    for id in &changes.payment_deletes {
        payments::delete(&mut tx, *id).await?;
    }
    for id in &changes.invoice_deletes {
        invoices::delete(&mut tx, *id).await?;
    }
    audit::insert_batch(&mut tx, audit_entries).await?;

    tx.commit().await
}

/// Persist a newly registered shipment with its audit entries.
pub async fn persist_shipment(
    pool: &PgPool,
    shipment: &Shipment,
    audit_entries: &[AuditEntry],
) -> Result<(), sqlx::Error> {
    let mut tx = begin_serializable(pool).await?;
    shipments::upsert(&mut tx, shipment).await?;
    audit::insert_batch(&mut tx, audit_entries).await?;
    tx.commit().await
}

/// Persist a created or decided compliance task with its audit entries.
pub async fn persist_task(
    pool: &PgPool,
    task: &ComplianceTask,
    audit_entries: &[AuditEntry],
) -> Result<(), sqlx::Error> {
    let mut tx = begin_serializable(pool).await?;
    compliance_tasks::upsert(&mut tx, task).await?;
    audit::insert_batch(&mut tx, audit_entries).await?;
    tx.commit().await
}
