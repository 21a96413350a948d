//! Compliance task persistence operations.
//!
//! The PENDING → APPROVED | REJECTED rule is enforced by
//! `fwd_state::ComplianceTask::decide`, not in SQL.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use fwd_core::{TaskId, Timestamp, UserId};
use fwd_state::{ComplianceTask, EntityRef};

/// Insert a task or overwrite its decision columns.
pub async fn upsert(conn: &mut PgConnection, record: &ComplianceTask) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO compliance_tasks (id, task_type, priority, status, entity_type, entity_id,
             entity_ref, description, due_date, assignee, decision_note, decided_at,
             decided_by_user_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
         ON CONFLICT (id) DO UPDATE SET
             status = EXCLUDED.status,
             decision_note = EXCLUDED.decision_note,
             decided_at = EXCLUDED.decided_at,
             decided_by_user_id = EXCLUDED.decided_by_user_id,
             updated_at = EXCLUDED.updated_at",
    )
    .bind(record.id.as_uuid())
    .bind(record.task_type.as_str())
    .bind(record.priority.as_str())
    .bind(record.status.as_str())
    .bind(&record.entity.entity_type)
    .bind(&record.entity.entity_id)
    .bind(&record.entity.entity_ref)
    .bind(&record.description)
    .bind(record.due_date)
    .bind(&record.assignee)
    .bind(&record.decision_note)
    .bind(record.decided_at.map(|t| *t.as_datetime()))
    .bind(record.decided_by_user_id.map(|u| u.as_uuid()))
    .bind(record.created_at.as_datetime())
    .bind(record.updated_at.as_datetime())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Load all tasks into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ComplianceTask>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TaskRow>(
        "SELECT id, task_type, priority, status, entity_type, entity_id, entity_ref, description,
             due_date, assignee, decision_note, decided_at, decided_by_user_id, created_at, updated_at
         FROM compliance_tasks ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(TaskRow::into_record).collect()
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    task_type: String,
    priority: String,
    status: String,
    entity_type: String,
    entity_id: String,
    entity_ref: Option<String>,
    description: String,
    due_date: Option<NaiveDate>,
    assignee: Option<String>,
    decision_note: Option<String>,
    decided_at: Option<DateTime<Utc>>,
    decided_by_user_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TaskRow {
    fn into_record(self) -> Result<ComplianceTask, sqlx::Error> {
        let decode = |e: fwd_core::ValidationError| sqlx::Error::Decode(Box::new(e));
        Ok(ComplianceTask {
            id: TaskId::from_uuid(self.id),
            task_type: self.task_type.parse().map_err(decode)?,
            priority: self.priority.parse().map_err(decode)?,
            status: self.status.parse().map_err(decode)?,
            entity: EntityRef {
                entity_type: self.entity_type,
                entity_id: self.entity_id,
                entity_ref: self.entity_ref,
            },
            description: self.description,
            due_date: self.due_date,
            assignee: self.assignee,
            decision_note: self.decision_note,
            decided_at: self.decided_at.map(Timestamp::from_datetime),
            decided_by_user_id: self.decided_by_user_id.map(UserId::from_uuid),
            created_at: Timestamp::from_datetime(self.created_at),
            updated_at: Timestamp::from_datetime(self.updated_at),
        })
    }
}
