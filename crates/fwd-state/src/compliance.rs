//! # Compliance Task Lifecycle
//!
//! Review tasks (KYC, sanctions screening, document validation) attached to
//! an arbitrary business object.
//!
//! ```text
//! PENDING ──approve──▶ APPROVED (terminal)
//!    │
//!    └─────reject────▶ REJECTED (terminal)
//! ```
//!
//! Deciding a task that is already decided is rejected with
//! [`ComplianceError::AlreadyDecided`]; there is no un-deciding.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fwd_core::{
    Actor, AuditAction, NewAuditEntry, TaskId, Timestamp, UserId, ValidationError,
};

const MAX_DESCRIPTION_LEN: usize = 2_000;
const MAX_NOTE_LEN: usize = 2_000;

// ─── Enumerations ────────────────────────────────────────────────────

/// Kind of compliance review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    /// Know-your-customer review.
    KycReview,
    /// Sanctions list screening.
    SanctionsCheck,
    /// Shipping document validation.
    DocValidation,
}

impl TaskType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KycReview => "KYC_REVIEW",
            Self::SanctionsCheck => "SANCTIONS_CHECK",
            Self::DocValidation => "DOC_VALIDATION",
        }
    }
}

impl FromStr for TaskType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "KYC_REVIEW" => Ok(Self::KycReview),
            "SANCTIONS_CHECK" => Ok(Self::SanctionsCheck),
            "DOC_VALIDATION" => Ok(Self::DocValidation),
            _ => Err(ValidationError::UnknownVariant {
                kind: "task type",
                value: s.to_string(),
                allowed: "KYC_REVIEW, SANCTIONS_CHECK, DOC_VALIDATION",
            }),
        }
    }
}

/// Review priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Low.
    Low,
    /// Medium.
    #[default]
    Medium,
    /// High.
    High,
}

impl Priority {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(ValidationError::UnknownVariant {
                kind: "priority",
                value: s.to_string(),
                allowed: "LOW, MEDIUM, HIGH",
            }),
        }
    }
}

/// Status of a compliance task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Awaiting a decision.
    #[default]
    Pending,
    /// Approved. Terminal.
    Approved,
    /// Rejected. Terminal.
    Rejected,
}

impl TaskStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(ValidationError::UnknownVariant {
                kind: "task status",
                value: s.to_string(),
                allowed: "PENDING, APPROVED, REJECTED",
            }),
        }
    }
}

/// A reviewer's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Approve the task.
    Approve,
    /// Reject the task.
    Reject,
}

impl Decision {
    /// The terminal status this decision leads to.
    pub fn target_status(&self) -> TaskStatus {
        match self {
            Self::Approve => TaskStatus::Approved,
            Self::Reject => TaskStatus::Rejected,
        }
    }

    /// The audit action recorded for this decision.
    pub fn audit_action(&self) -> AuditAction {
        match self {
            Self::Approve => AuditAction::Approve,
            Self::Reject => AuditAction::Reject,
        }
    }
}

impl FromStr for Decision {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPROVE" => Ok(Self::Approve),
            "REJECT" => Ok(Self::Reject),
            _ => Err(ValidationError::UnknownVariant {
                kind: "action",
                value: s.to_string(),
                allowed: "APPROVE, REJECT",
            }),
        }
    }
}

/// Filter for listing tasks: a single status, or `ALL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// No filter.
    All,
    /// Only tasks in this status.
    Only(TaskStatus),
}

impl Default for StatusFilter {
    /// The reviewer's queue: pending tasks.
    fn default() -> Self {
        Self::Only(TaskStatus::Pending)
    }
}

impl StatusFilter {
    /// Whether `status` passes the filter.
    pub fn matches(&self, status: TaskStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(s) => *s == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("ALL") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors from the compliance workflow.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComplianceError {
    /// The task has already been decided.
    #[error("compliance task {task_id} is already {status}")]
    AlreadyDecided {
        /// The task.
        task_id: String,
        /// Its terminal status.
        status: TaskStatus,
    },

    /// A decision was attempted without a resolved actor identity.
    #[error("a decision requires an authenticated reviewer")]
    MissingActor,

    /// Malformed input.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

// ─── Task ────────────────────────────────────────────────────────────

/// The business object a task reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    /// Entity kind (e.g. `"customer"`, `"shipment"`).
    pub entity_type: String,
    /// Entity identifier.
    pub entity_id: String,
    /// Display name or reference.
    pub entity_ref: Option<String>,
}

/// Input for creating a task.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComplianceTask {
    /// Kind of review.
    pub task_type: TaskType,
    /// Defaults to `MEDIUM`.
    pub priority: Option<Priority>,
    /// The object under review.
    pub entity: EntityRef,
    /// What the reviewer should check.
    pub description: String,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Optional assignee name.
    pub assignee: Option<String>,
}

impl NewComplianceTask {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.entity.entity_type.trim().is_empty() {
            return Err(ValidationError::EmptyField("entityType"));
        }
        if self.entity.entity_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("entityId"));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::EmptyField("description"));
        }
        if self.description.len() > MAX_DESCRIPTION_LEN {
            return Err(ValidationError::TooLong {
                field: "description",
                max: MAX_DESCRIPTION_LEN,
            });
        }
        Ok(())
    }
}

/// A compliance review task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceTask {
    /// Task id.
    pub id: TaskId,
    /// Kind of review.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Priority.
    pub priority: Priority,
    /// Current status.
    pub status: TaskStatus,
    /// The object under review.
    #[serde(flatten)]
    pub entity: EntityRef,
    /// What the reviewer should check.
    pub description: String,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Optional assignee.
    pub assignee: Option<String>,
    /// Reviewer's note.
    pub decision_note: Option<String>,
    /// When the decision was made.
    pub decided_at: Option<Timestamp>,
    /// Who decided.
    pub decided_by_user_id: Option<UserId>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
}

impl ComplianceTask {
    /// Create a task in `PENDING`.
    pub fn create(new: NewComplianceTask, now: Timestamp) -> Result<Self, ValidationError> {
        new.validate()?;
        Ok(Self {
            id: TaskId::new(),
            task_type: new.task_type,
            priority: new.priority.unwrap_or_default(),
            status: TaskStatus::Pending,
            entity: new.entity,
            description: new.description.trim().to_string(),
            due_date: new.due_date,
            assignee: new.assignee.filter(|a| !a.trim().is_empty()),
            decision_note: None,
            decided_at: None,
            decided_by_user_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Record a reviewer's decision (PENDING → APPROVED | REJECTED).
    pub fn decide(
        &mut self,
        actor: &Actor,
        decision: Decision,
        note: Option<String>,
        now: Timestamp,
    ) -> Result<(), ComplianceError> {
        let reviewer = actor.id.ok_or(ComplianceError::MissingActor)?;
        if self.status.is_terminal() {
            return Err(ComplianceError::AlreadyDecided {
                task_id: self.id.to_string(),
                status: self.status,
            });
        }
        let note = note
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if note.as_ref().is_some_and(|n| n.len() > MAX_NOTE_LEN) {
            return Err(ValidationError::TooLong {
                field: "note",
                max: MAX_NOTE_LEN,
            }
            .into());
        }

        let to = decision.target_status();
        tracing::info!(task_id = %self.id, from = %self.status, to = %to, "compliance task decided");
        self.status = to;
        self.decision_note = note;
        self.decided_at = Some(now);
        self.decided_by_user_id = Some(reviewer);
        self.updated_at = now;
        Ok(())
    }

    /// The audit entry for a decision just applied.
    ///
    /// The entry names the reviewed entity, not the task; the task id is
    /// carried in `meta`.
    pub fn decision_audit_entry(&self, actor: Actor, decision: Decision) -> NewAuditEntry {
        let verb = match decision {
            Decision::Approve => "Approved",
            Decision::Reject => "Rejected",
        };
        let label = self
            .entity
            .entity_ref
            .clone()
            .unwrap_or_else(|| self.entity.entity_id.clone());
        let mut entry = NewAuditEntry::new(
            actor,
            decision.audit_action(),
            self.entity.entity_type.clone(),
            format!("{verb} {} for {label}", self.task_type.as_str()),
        )
        .entity_id(&self.entity.entity_id)
        .meta(serde_json::json!({
            "taskId": self.id,
            "taskType": self.task_type,
            "decision": decision,
            "note": self.decision_note,
            "decidedAt": self.decided_at,
        }));
        if let Some(r) = &self.entity.entity_ref {
            entry = entry.entity_ref(r.clone());
        }
        entry
    }

    /// Sort key for listing: most recently updated first.
    pub fn newest_first(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.updated_at.cmp(&a.updated_at)
    }
}
