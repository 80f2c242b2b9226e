//! Collaborative (fan-out/fan-in) task protocol.
//!
//! A stateless procedure over the orchestrator: split one composite task
//! into ordered subtasks, submit each through normal routing, wait under a
//! bounded deadline, and merge the completed results.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::CollaborationConfig;
use crate::orchestrator::Orchestrator;
use crate::routing::{kind, RoutingHint};
use crate::task::{new_task_id, Task, TaskSnapshot, TaskStatus};

/// Overall outcome of a collaborative run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationStatus {
    /// Every subtask reached `Completed` before the deadline.
    Completed,
    /// At least one subtask failed, timed out, or could not be assigned.
    Partial,
}

/// Merged payload built from the subtasks that completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedResult {
    pub success: bool,
    pub results: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CombinedResult {
    fn from_completed(results: Vec<Value>) -> Self {
        if results.is_empty() {
            Self {
                success: false,
                results,
                error: Some("no subtasks completed successfully".into()),
            }
        } else {
            Self {
                success: true,
                results,
                error: None,
            }
        }
    }
}

/// Everything a caller needs to distinguish "slow" from "errored" from
/// "never assigned": the per-subtask snapshots plus the merged result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationReport {
    pub main_task: Task,
    pub subtask_results: HashMap<String, TaskSnapshot>,
    pub combined: CombinedResult,
    pub status: CollaborationStatus,
}

/// Fixed decomposition policy keyed on the main task's kind.
///
/// Unrecognized kinds decompose into a single pass-through subtask carrying
/// the original kind, description, and params.
pub fn decompose(main: &Task) -> Vec<Task> {
    let kind_lc = main.kind.to_lowercase();

    if kind_lc.contains("research") && kind_lc.contains("report") {
        vec![
            Task::new(
                kind::RESEARCH,
                format!("Gather background information on {}", main.description),
            )
            .with_params(json!({ "stage": "background" })),
            Task::new(
                kind::RESEARCH,
                format!("Analyze current trends related to {}", main.description),
            )
            .with_params(json!({ "stage": "trend_analysis" })),
            Task::new(
                kind::RESEARCH,
                format!("Summarize key findings about {}", main.description),
            )
            .with_params(json!({ "stage": "summary" })),
        ]
    } else if (kind_lc.contains("code") || kind_lc.contains("coding"))
        && kind_lc.contains("project")
    {
        vec![
            Task::new(
                kind::CODING,
                format!("Design the architecture for {}", main.description),
            )
            .with_params(json!({ "stage": "design" })),
            Task::new(
                kind::CODING,
                format!("Implement the core functionality for {}", main.description),
            )
            .with_params(json!({ "stage": "implementation" })),
            Task::new(
                kind::CODING,
                format!("Create tests for {}", main.description),
            )
            .with_params(json!({ "stage": "tests" })),
        ]
    } else {
        vec![Task::new(main.kind.clone(), main.description.clone()).with_params(main.params.clone())]
    }
}

/// Runs composite tasks against an orchestrator.
pub struct Collaborator {
    orchestrator: Arc<Orchestrator>,
    config: CollaborationConfig,
}

impl Collaborator {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            orchestrator,
            config: CollaborationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CollaborationConfig) -> Self {
        self.config = config;
        self
    }

    /// Fan a composite task out into subtasks and wait for the fan-in.
    ///
    /// When `subtasks` is absent the fixed [`decompose`] policy derives them.
    /// Blocks the caller for at most the configured deadline; agent worker
    /// loops are never blocked — the wait is purely observational polling.
    pub async fn run(&self, main_task: Task, subtasks: Option<Vec<Task>>) -> CollaborationReport {
        let subtasks = subtasks.unwrap_or_else(|| decompose(&main_task));
        info!(
            kind = %main_task.kind,
            subtask_count = subtasks.len(),
            "Running collaborative task"
        );

        let mut subtask_results: HashMap<String, TaskSnapshot> = HashMap::new();
        let mut pending: Vec<String> = Vec::new();

        for subtask in subtasks {
            match self.orchestrator.assign(subtask, RoutingHint::default()) {
                Ok(task_id) => pending.push(task_id),
                Err(e) => {
                    // Never assigned: record as failed immediately, skip polling.
                    let task_id = new_task_id();
                    warn!(task_id = %task_id, error = %e, "Subtask could not be assigned");
                    subtask_results.insert(task_id.clone(), TaskSnapshot::failed(task_id, e.to_string()));
                }
            }
        }

        self.wait_for_terminal(&pending).await;

        for task_id in &pending {
            match self.orchestrator.result(task_id) {
                Ok(snap) => {
                    subtask_results.insert(task_id.clone(), snap);
                }
                Err(e) => {
                    // Owning agent vanished mid-run (removed); report it as failed.
                    subtask_results
                        .insert(task_id.clone(), TaskSnapshot::failed(task_id.clone(), e.to_string()));
                }
            }
        }

        let completed: Vec<Value> = pending
            .iter()
            .filter_map(|id| subtask_results.get(id))
            .filter(|snap| snap.status == TaskStatus::Completed)
            .filter_map(|snap| snap.result.clone())
            .collect();

        let all_completed = !subtask_results.is_empty()
            && subtask_results
                .values()
                .all(|snap| snap.status == TaskStatus::Completed);
        let status = if all_completed {
            CollaborationStatus::Completed
        } else {
            CollaborationStatus::Partial
        };

        info!(
            ?status,
            completed = completed.len(),
            total = subtask_results.len(),
            "Collaborative task finished"
        );

        CollaborationReport {
            main_task,
            subtask_results,
            combined: CombinedResult::from_completed(completed),
            status,
        }
    }

    async fn wait_for_terminal(&self, pending: &[String]) {
        let deadline = Instant::now() + Duration::from_secs(self.config.deadline_secs);
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            let all_terminal = pending.iter().all(|id| {
                matches!(self.orchestrator.result(id), Ok(snap) if snap.is_terminal())
            });
            if all_terminal {
                return;
            }
            if Instant::now() >= deadline {
                warn!("Collaborative task deadline elapsed with subtasks outstanding");
                return;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
