//! # Compliance Task API
//!
//! Reviewers work a queue of `PENDING` tasks and decide each one exactly
//! once. The decision endpoint answers errors as `text/plain` because its
//! clients show the error text verbatim; every other endpoint here uses the
//! JSON error body.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use fwd_core::{
    parse_calendar_date, Actor, AuditAction, NewAuditEntry, Role, TaskId, Timestamp,
    ValidationError,
};
use fwd_state::{ComplianceTask, Decision, EntityRef, NewComplianceTask, StatusFilter};

use crate::auth::CallerIdentity;
use crate::error::{AppError, PlainTextError};
use crate::extractors::{extract_json, extract_query, extract_validated_json, parse_opt, Validate};
use crate::reconcile::{commit_audited, PendingWrite};
use crate::state::AppState;

// -- DTOs ---------------------------------------------------------------------

/// Request to open a compliance task.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    /// `KYC_REVIEW | SANCTIONS_CHECK | DOC_VALIDATION`.
    #[serde(rename = "type")]
    pub task_type: String,
    /// `LOW | MEDIUM | HIGH`; defaults to `MEDIUM`.
    #[serde(default)]
    pub priority: Option<String>,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub entity_ref: Option<String>,
    pub description: String,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
}

impl Validate for CreateTaskRequest {
    type Output = NewComplianceTask;

    fn validate(self) -> Result<NewComplianceTask, ValidationError> {
        Ok(NewComplianceTask {
            task_type: self.task_type.parse()?,
            priority: parse_opt(self.priority.as_deref())?,
            entity: EntityRef {
                entity_type: self.entity_type,
                entity_id: self.entity_id,
                entity_ref: self.entity_ref,
            },
            description: self.description,
            due_date: self.due_date.as_deref().map(parse_calendar_date).transpose()?,
            assignee: self.assignee,
        })
    }
}

/// A reviewer's decision on a task.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    /// `APPROVE | REJECT`.
    pub action: String,
    #[serde(default)]
    pub note: Option<String>,
    /// Display name recorded in the audit entry.
    #[serde(default)]
    pub actor_name: Option<String>,
    /// Display role recorded in the audit entry.
    #[serde(default)]
    pub actor_role: Option<String>,
}

/// Successful decision.
#[derive(Debug, Serialize, ToSchema)]
pub struct DecisionResponse {
    pub ok: bool,
    #[schema(value_type = Object)]
    pub task: ComplianceTask,
}

/// Filters for the task list.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TaskListQuery {
    /// `PENDING` (default), `APPROVED`, `REJECTED` or `ALL`.
    pub status: Option<String>,
}

// -- Router -------------------------------------------------------------------

/// Build the compliance router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/compliance/tasks", post(create_task).get(list_tasks))
        .route("/v1/compliance/tasks/{id}", get(get_task))
        .route("/v1/compliance/tasks/{id}/action", post(decide_task))
}

fn task_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("compliance task {id}"))
}

/// The actor recorded in the decision's audit entry. The id always comes
/// from the verified session; name and role may be overridden for display.
fn audit_actor(caller: &Actor, name: Option<String>, role: Option<Role>) -> Actor {
    Actor {
        id: caller.id,
        name: name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .or_else(|| caller.name.clone()),
        role: role.or(caller.role),
    }
}

// -- Handlers -----------------------------------------------------------------

/// POST /v1/compliance/tasks: Open a review task.
#[utoipa::path(
    post,
    path = "/v1/compliance/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = serde_json::Value),
        (status = 400, description = "Invalid input", body = crate::error::ErrorBody),
    ),
    tag = "compliance"
)]
pub async fn create_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ComplianceTask>), AppError> {
    let new = extract_validated_json(body)?;
    let now = Timestamp::now();
    let task = ComplianceTask::create(new, now)?;

    let mut entry = NewAuditEntry::new(
        caller.actor,
        AuditAction::Create,
        "compliance_task",
        format!(
            "Opened {} for {} {}",
            task.task_type.as_str(),
            task.entity.entity_type,
            task.entity.entity_id
        ),
    )
    .entity_id(task.id)
    .meta(json!({
        "taskType": task.task_type,
        "priority": task.priority,
        "entityType": task.entity.entity_type,
        "entityId": task.entity.entity_id,
    }));
    if let Some(r) = &task.entity.entity_ref {
        entry = entry.entity_ref(r.clone());
    }
    commit_audited(&state, vec![entry], now, PendingWrite::Task(&task)).await?;
    state.compliance_tasks.insert(task.id, task.clone());

    tracing::info!(task_id = %task.id, task_type = task.task_type.as_str(), "compliance task opened");
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /v1/compliance/tasks: The review queue, most recently updated first.
#[utoipa::path(
    get,
    path = "/v1/compliance/tasks",
    params(TaskListQuery),
    responses(
        (status = 200, description = "Tasks", body = serde_json::Value),
        (status = 400, description = "Unknown status filter", body = crate::error::ErrorBody),
    ),
    tag = "compliance"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    query: Result<Query<TaskListQuery>, QueryRejection>,
) -> Result<Json<Vec<ComplianceTask>>, AppError> {
    let query = extract_query(query)?;
    let filter: StatusFilter = parse_opt(query.status.as_deref())?.unwrap_or_default();
    let mut tasks = state
        .compliance_tasks
        .list_where(|t| filter.matches(t.status));
    tasks.sort_by(ComplianceTask::newest_first);
    Ok(Json(tasks))
}

/// GET /v1/compliance/tasks/{id}: Get a task.
#[utoipa::path(
    get,
    path = "/v1/compliance/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = serde_json::Value),
        (status = 404, description = "Task not found", body = crate::error::ErrorBody),
    ),
    tag = "compliance"
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ComplianceTask>, AppError> {
    state
        .compliance_tasks
        .get(&TaskId::from_uuid(id))
        .map(Json)
        .ok_or_else(|| task_not_found(id))
}

/// POST /v1/compliance/tasks/{id}/action: Approve or reject a task.
///
/// The audit trail lock is held from reading the task until the decided
/// task is stored, so two reviewers racing on one task cannot both win.
#[utoipa::path(
    post,
    path = "/v1/compliance/tasks/{id}/action",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Task decided", body = DecisionResponse),
        (status = 400, description = "Invalid action (text/plain)", body = String),
        (status = 404, description = "Task not found (text/plain)", body = String),
        (status = 409, description = "Task already decided (text/plain)", body = String),
    ),
    tag = "compliance"
)]
pub async fn decide_task(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Json<DecisionResponse>, PlainTextError> {
    let req = extract_json(body)?;
    let decision = req.action.parse::<Decision>().map_err(AppError::from)?;
    let role = parse_opt::<Role>(req.actor_role.as_deref()).map_err(AppError::from)?;
    let recorded_actor = audit_actor(&caller.actor, req.actor_name, role);

    let mut trail = state.audit.lock().await;
    let mut task = state
        .compliance_tasks
        .get(&TaskId::from_uuid(id))
        .ok_or_else(|| task_not_found(id))?;

    let now = Timestamp::now();
    task.decide(&caller.actor, decision, req.note, now)?;
    let sealed = trail.prepare(vec![task.decision_audit_entry(recorded_actor, decision)], now);
    if let Some(pool) = &state.db_pool {
        crate::db::persist_task(pool, &task, &sealed).await?;
    }
    trail.commit(sealed);
    state.compliance_tasks.insert(task.id, task.clone());
    drop(trail);

    metrics::counter!(
        "fwd_compliance_decisions_total",
        "decision" => decision.target_status().as_str()
    )
    .increment(1);
    Ok(Json(DecisionResponse { ok: true, task }))
}
