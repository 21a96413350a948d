//! Shipment persistence operations.
//!
//! Only the reference data and the `invoice_status` rollup live here; the
//! rollup is written by the cascade inside the caller's transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use fwd_core::{ShipmentId, Timestamp};
use fwd_ledger::Shipment;
use fwd_state::InvoiceStatus;

/// Insert a shipment or overwrite its mutable columns.
pub async fn upsert(conn: &mut PgConnection, record: &Shipment) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO shipments (id, reference, customer_name, invoice_status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (id) DO UPDATE SET
             reference = EXCLUDED.reference,
             customer_name = EXCLUDED.customer_name,
             invoice_status = EXCLUDED.invoice_status,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(record.id.as_uuid())
    .bind(&record.reference)
    .bind(&record.customer_name)
    .bind(record.invoice_status.as_str())
    .bind(record.created_at.as_datetime())
    .bind(record.updated_at.as_datetime())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Load all shipments into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Shipment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ShipmentRow>(
        "SELECT id, reference, customer_name, invoice_status, created_at, updated_at
         FROM shipments ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ShipmentRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ShipmentRow {
    id: Uuid,
    reference: String,
    customer_name: Option<String>,
    invoice_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShipmentRow {
    fn into_record(self) -> Shipment {
        let invoice_status = self.invoice_status.parse().unwrap_or_else(|e| {
            tracing::warn!(
                id = %self.id,
                status = %self.invoice_status,
                error = %e,
                "unknown shipment invoice status in database, defaulting to DRAFT"
            );
            InvoiceStatus::Draft
        });
        Shipment {
            id: ShipmentId::from_uuid(self.id),
            reference: self.reference,
            customer_name: self.customer_name,
            invoice_status,
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
        }
    }
}
