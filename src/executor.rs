//! The pluggable executor boundary and the progress-reporting handle.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::task::{Task, TaskSnapshot, TaskStatus};

pub(crate) type SnapshotMap = Arc<RwLock<HashMap<String, TaskSnapshot>>>;

/// The capability that actually performs a task's work.
///
/// Supplied once per agent at construction. The core treats the call as
/// opaque and synchronous within the worker loop: no per-task timeout is
/// enforced, and a hung executor stalls only its own agent.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Execute a task, optionally reporting progress along the way.
    ///
    /// Returning `Err` marks the task `Failed` with the error message; it
    /// never stops the owning agent's worker loop.
    async fn execute(&self, task: Task, progress: ProgressHandle) -> Result<Value>;
}

/// Handle an executor uses to publish progress for one task.
///
/// Updates are monotonic: a reported percentage below the current value is
/// clamped up, values above 100 are clamped down, and updates after the task
/// reaches a terminal state are ignored.
#[derive(Clone)]
pub struct ProgressHandle {
    task_id: String,
    snapshots: SnapshotMap,
}

impl ProgressHandle {
    pub(crate) fn new(task_id: String, snapshots: SnapshotMap) -> Self {
        Self { task_id, snapshots }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn update(&self, percent: u8) {
        self.apply(percent, None);
    }

    pub fn update_with_message(&self, percent: u8, message: impl Into<String>) {
        self.apply(percent, Some(message.into()));
    }

    fn apply(&self, percent: u8, message: Option<String>) {
        let mut snapshots = self.snapshots.write();
        let Some(snap) = snapshots.get_mut(&self.task_id) else {
            return;
        };
        if snap.status != TaskStatus::Processing {
            return;
        }
        snap.progress = snap.progress.max(percent.min(100));
        if let Some(message) = message {
            snap.status_message = Some(message);
        }
        debug!(task_id = %self.task_id, progress = snap.progress, "Task progress updated");
    }
}
