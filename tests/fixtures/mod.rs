//! Shared fixtures: mock executors and timing helpers.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use manus_core::{
    AgentConfig, CollaborationConfig, Orchestrator, ProgressHandle, Task, TaskExecutor,
    TaskSnapshot,
};

/// Install a test-friendly subscriber so `RUST_LOG` controls test output.
/// Safe to call from every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Agent tuning that keeps tests fast.
pub fn fast_agent_config() -> AgentConfig {
    AgentConfig {
        idle_poll_ms: 10,
        error_backoff_ms: 10,
        stop_grace_ms: 500,
    }
}

/// Collaboration tuning that keeps tests fast.
pub fn fast_collab_config() -> CollaborationConfig {
    CollaborationConfig {
        poll_interval_ms: 25,
        deadline_secs: 30,
    }
}

/// Poll the orchestrator until a task reaches a terminal state.
pub async fn wait_for_terminal(orch: &Orchestrator, task_id: &str) -> TaskSnapshot {
    for _ in 0..400 {
        if let Ok(snap) = orch.result(task_id) {
            if snap.is_terminal() {
                return snap;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {task_id} never reached a terminal state");
}

/// Echoes the task description back as its result, with progress updates.
pub struct EchoExecutor;

#[async_trait]
impl TaskExecutor for EchoExecutor {
    async fn execute(&self, task: Task, progress: ProgressHandle) -> manus_core::Result<Value> {
        progress.update_with_message(10, "starting");
        let content = format!("research on {}", task.description);
        progress.update_with_message(90, "almost done");
        Ok(json!({ "content": content, "params": task.params }))
    }
}

/// Always reports an execution error.
pub struct FailingExecutor;

#[async_trait]
impl TaskExecutor for FailingExecutor {
    async fn execute(&self, _task: Task, _progress: ProgressHandle) -> manus_core::Result<Value> {
        Err(manus_core::OrchestratorError::Execution(
            "deliberate failure".into(),
        ))
    }
}

/// Fails tasks whose `params.stage` matches, echoes the rest.
pub struct StageFailExecutor {
    pub fail_stage: String,
}

#[async_trait]
impl TaskExecutor for StageFailExecutor {
    async fn execute(&self, task: Task, _progress: ProgressHandle) -> manus_core::Result<Value> {
        if task.params["stage"] == self.fail_stage.as_str() {
            return Err(manus_core::OrchestratorError::Execution(format!(
                "stage {} failed",
                self.fail_stage
            )));
        }
        Ok(json!({ "stage": task.params["stage"], "content": task.description }))
    }
}

/// Sleeps for a fixed duration before completing.
pub struct SlowExecutor {
    pub delay: Duration,
}

#[async_trait]
impl TaskExecutor for SlowExecutor {
    async fn execute(&self, task: Task, _progress: ProgressHandle) -> manus_core::Result<Value> {
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "content": task.description }))
    }
}

/// Records the descriptions of processed tasks in execution order.
pub struct RecordingExecutor {
    pub log: Arc<Mutex<Vec<String>>>,
    pub delay: Duration,
}

impl RecordingExecutor {
    pub fn new(delay: Duration) -> (Self, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: Arc::clone(&log),
                delay,
            },
            log,
        )
    }
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn execute(&self, task: Task, _progress: ProgressHandle) -> manus_core::Result<Value> {
        self.log.lock().push(task.description.clone());
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "content": task.description }))
    }
}

/// Reports a fixed sequence of progress steps with pauses in between.
pub struct SteppedExecutor {
    pub steps: Vec<u8>,
    pub pause: Duration,
}

#[async_trait]
impl TaskExecutor for SteppedExecutor {
    async fn execute(&self, task: Task, progress: ProgressHandle) -> manus_core::Result<Value> {
        for &step in &self.steps {
            progress.update(step);
            tokio::time::sleep(self.pause).await;
        }
        Ok(json!({ "content": task.description }))
    }
}
