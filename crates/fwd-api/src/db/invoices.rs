//! Invoice persistence operations.
//!
//! Line items are stored as a JSONB array in their wire shape. Totals are
//! stored as computed; they are never recomputed on load.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use fwd_core::{InvoiceId, ShipmentId, Timestamp};
use fwd_ledger::{Invoice, LineItem};
use fwd_state::InvoiceStatus;

/// Insert an invoice or overwrite all of its columns.
pub async fn upsert(conn: &mut PgConnection, record: &Invoice) -> Result<(), sqlx::Error> {
    let items = serde_json::to_value(&record.items)
        .map_err(|e| sqlx::Error::Protocol(format!("failed to serialize invoice items: {e}")))?;

    sqlx::query(
        "INSERT INTO invoices (id, invoice_number, shipment_id, currency, issue_date, due_date,
             status, items, subtotal, total_tax, tds_rate, tds_amount, amount, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
         ON CONFLICT (id) DO UPDATE SET
             invoice_number = EXCLUDED.invoice_number,
             currency = EXCLUDED.currency,
             issue_date = EXCLUDED.issue_date,
             due_date = EXCLUDED.due_date,
             status = EXCLUDED.status,
             items = EXCLUDED.items,
             subtotal = EXCLUDED.subtotal,
             total_tax = EXCLUDED.total_tax,
             tds_rate = EXCLUDED.tds_rate,
             tds_amount = EXCLUDED.tds_amount,
             amount = EXCLUDED.amount,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(record.id.as_uuid())
    .bind(&record.invoice_number)
    .bind(record.shipment_id.as_uuid())
    .bind(&record.currency)
    .bind(record.issue_date)
    .bind(record.due_date)
    .bind(record.status.as_str())
    .bind(&items)
    .bind(record.subtotal)
    .bind(record.total_tax)
    .bind(record.tds_rate)
    .bind(record.tds_amount)
    .bind(record.amount)
    .bind(record.created_at.as_datetime())
    .bind(record.updated_at.as_datetime())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Delete an invoice. Payments must already be gone.
pub async fn delete(conn: &mut PgConnection, id: InvoiceId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
        .bind(id.as_uuid())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all invoices into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Invoice>, sqlx::Error> {
    let rows = sqlx::query_as::<_, InvoiceRow>(
        "SELECT id, invoice_number, shipment_id, currency, issue_date, due_date, status, items,
             subtotal, total_tax, tds_rate, tds_amount, amount, created_at, updated_at
         FROM invoices ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(InvoiceRow::into_record).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    invoice_number: String,
    shipment_id: Uuid,
    currency: String,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
    status: String,
    items: serde_json::Value,
    subtotal: Decimal,
    total_tax: Decimal,
    tds_rate: Decimal,
    tds_amount: Decimal,
    amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InvoiceRow {
    fn into_record(self) -> Result<Invoice, sqlx::Error> {
        let items: Vec<LineItem> = serde_json::from_value(self.items)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let status = self.status.parse().unwrap_or_else(|e| {
            tracing::warn!(
                id = %self.id,
                status = %self.status,
                error = %e,
                "unknown invoice status in database, defaulting to DRAFT"
            );
            InvoiceStatus::Draft
        });
        Ok(Invoice {
            id: InvoiceId::from_uuid(self.id),
            invoice_number: self.invoice_number,
            shipment_id: ShipmentId::from_uuid(self.shipment_id),
            currency: self.currency.trim().to_string(),
            issue_date: self.issue_date,
            due_date: self.due_date,
            status,
            items,
            subtotal: self.subtotal,
            total_tax: self.total_tax,
            tds_rate: self.tds_rate,
            tds_amount: self.tds_amount,
            amount: self.amount,
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
        })
    }
}
