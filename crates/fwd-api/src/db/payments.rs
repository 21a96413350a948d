//! Payment persistence operations.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use fwd_core::{InvoiceId, PaymentId, ShipmentId, Timestamp};
use fwd_ledger::{Payment, PaymentMethod, PaymentStatus};

/// Insert a payment or overwrite its mutable columns.
///
/// `shipment_id` and `invoice_id` are fixed at creation and never updated.
pub async fn upsert(conn: &mut PgConnection, record: &Payment) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO payments (id, shipment_id, invoice_id, amount, currency, method, status,
             date, transaction_num, notes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         ON CONFLICT (id) DO UPDATE SET
             amount = EXCLUDED.amount,
             currency = EXCLUDED.currency,
             method = EXCLUDED.method,
             status = EXCLUDED.status,
             date = EXCLUDED.date,
             transaction_num = EXCLUDED.transaction_num,
             notes = EXCLUDED.notes,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(record.id.as_uuid())
    .bind(record.shipment_id.as_uuid())
    .bind(record.invoice_id.map(|id| id.as_uuid()))
    .bind(record.amount)
    .bind(&record.currency)
    .bind(record.method.as_str())
    .bind(record.status.as_str())
    .bind(record.date)
    .bind(&record.transaction_num)
    .bind(&record.notes)
    .bind(record.created_at.as_datetime())
    .bind(record.updated_at.as_datetime())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Delete a payment.
pub async fn delete(conn: &mut PgConnection, id: PaymentId) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM payments WHERE id = $1")
        .bind(id.as_uuid())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Load all payments into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<Payment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PaymentRow>(
        "SELECT id, shipment_id, invoice_id, amount, currency, method, status, date,
             transaction_num, notes, created_at, updated_at
         FROM payments ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PaymentRow::into_record).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    shipment_id: Uuid,
    invoice_id: Option<Uuid>,
    amount: Decimal,
    currency: String,
    method: String,
    status: String,
    date: NaiveDate,
    transaction_num: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_record(self) -> Result<Payment, sqlx::Error> {
        let method: PaymentMethod = self
            .method
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        // An unreadable status must not silently count toward totals.
        let status = self.status.parse().unwrap_or_else(|e| {
            tracing::warn!(
                id = %self.id,
                status = %self.status,
                error = %e,
                "unknown payment status in database, treating as FAILED"
            );
            PaymentStatus::Failed
        });
        Ok(Payment {
            id: PaymentId::from_uuid(self.id),
            shipment_id: ShipmentId::from_uuid(self.shipment_id),
            invoice_id: self.invoice_id.map(InvoiceId::from_uuid),
            amount: self.amount,
            currency: self.currency.trim().to_string(),
            method,
            status,
            date: self.date,
            transaction_num: self.transaction_num,
            notes: self.notes,
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
        })
    }
}
