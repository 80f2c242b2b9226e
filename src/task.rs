//! Task data model: requests, lifecycle status, and observable snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Generate a short, prefixed task id.
pub fn new_task_id() -> String {
    format!("task-{}", &Uuid::new_v4().to_string()[..8])
}

/// Lifecycle status of a task.
///
/// `Pending → Assigned → Processing → {Completed, Failed}`. The two final
/// states are terminal; a terminal snapshot is never rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Assigned,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One unit of work submitted to the system.
///
/// `kind` drives routing and executor dispatch; `params` is an opaque payload
/// whose semantics belong to the executor. The id is generated at submission
/// when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub kind: String,
    pub description: String,
    #[serde(default)]
    pub params: Value,
}

impl Task {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            description: description.into(),
            params: Value::Null,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }
}

/// Externally observable state of a submitted task.
///
/// This is the only view of a task's live state outside its owning agent.
/// Exactly one of `result`/`error` is set once the status is terminal;
/// neither is set before that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: String,
    pub status: TaskStatus,
    /// 0-100, monotonically non-decreasing while `Processing`.
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub assigned_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskSnapshot {
    /// Initial snapshot written when a task is accepted onto a queue.
    pub fn assigned(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Assigned,
            progress: 0,
            status_message: None,
            result: None,
            error: None,
            assigned_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Snapshot for a task that could not be routed to any agent.
    pub fn failed(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Failed,
            progress: 0,
            status_message: None,
            result: None,
            error: Some(error.into()),
            assigned_at: Utc::now(),
            started_at: None,
            completed_at: Some(Utc::now()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
