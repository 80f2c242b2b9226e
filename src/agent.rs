//! Agent: one FIFO task queue and one dedicated worker loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AgentConfig;
use crate::executor::{ProgressHandle, SnapshotMap, TaskExecutor};
use crate::task::{new_task_id, Task, TaskSnapshot, TaskStatus};

fn new_agent_id() -> String {
    format!("agent-{}", &Uuid::new_v4().to_string()[..8])
}

/// Point-in-time status of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStatus {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub running: bool,
    pub queued_tasks: usize,
    /// Tasks whose snapshot has not reached a terminal state.
    pub active_tasks: usize,
}

/// State shared between the agent handle and its worker loop.
struct AgentInner {
    queue: Mutex<VecDeque<Task>>,
    snapshots: SnapshotMap,
    running: AtomicBool,
    /// Bumped on every `start()`; a worker exits when its generation is stale,
    /// so a stop/start cycle never leaves two loops serving the same queue.
    generation: AtomicU64,
    wakeup: Notify,
    /// Serializes task processing across worker generations.
    work_lock: tokio::sync::Mutex<()>,
}

/// A named worker owning one task queue and one execution context,
/// specialized by kind.
///
/// Identity (`id`, `name`, `kind`) is immutable after construction. The
/// worker loop pulls tasks in FIFO order, invokes the agent's
/// [`TaskExecutor`], and records status, progress, and results on the
/// snapshot map, which is the only externally observable task state.
pub struct Agent {
    id: String,
    name: String,
    kind: String,
    config: AgentConfig,
    executor: Arc<dyn TaskExecutor>,
    inner: Arc<AgentInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        let name = name.into();
        let kind = kind.into();
        let id = new_agent_id();
        info!(agent_id = %id, name = %name, kind = %kind, "Agent initialized");
        Self {
            id,
            name,
            kind,
            config: AgentConfig::default(),
            executor,
            inner: Arc::new(AgentInner {
                queue: Mutex::new(VecDeque::new()),
                snapshots: SnapshotMap::default(),
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                wakeup: Notify::new(),
                work_lock: tokio::sync::Mutex::new(()),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Spawn the worker loop. Idempotent: calling on a running agent is a no-op.
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = Arc::clone(&self.inner);
        let executor = Arc::clone(&self.executor);
        let config = self.config.clone();
        let name = self.name.clone();

        let handle = tokio::spawn(async move {
            worker_loop(inner, executor, config, name, generation).await;
        });
        *self.worker.lock() = Some(handle);
        info!(agent_id = %self.id, name = %self.name, "Agent started");
    }

    /// Signal the worker loop to exit after its in-flight task, wait up to
    /// the configured grace period, then return regardless. Idempotent.
    ///
    /// Queued-but-unstarted tasks remain queued and resume on `start()`.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.inner.wakeup.notify_one();

        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let grace = Duration::from_millis(self.config.stop_grace_ms);
            if timeout(grace, handle).await.is_err() {
                warn!(
                    agent_id = %self.id,
                    name = %self.name,
                    "Worker did not exit within grace period; detaching"
                );
            }
        }
        info!(agent_id = %self.id, name = %self.name, "Agent stopped");
    }

    /// Accept a task onto the queue. Never blocks: the queue is unbounded.
    ///
    /// Assigns a task id when absent, records an `Assigned` snapshot with
    /// progress 0, and returns the id.
    pub fn submit(&self, mut task: Task) -> String {
        let task_id = task.id.get_or_insert_with(new_task_id).clone();

        self.inner
            .snapshots
            .write()
            .insert(task_id.clone(), TaskSnapshot::assigned(&task_id));
        self.inner.queue.lock().push_back(task);
        self.inner.wakeup.notify_one();

        info!(agent_id = %self.id, name = %self.name, task_id = %task_id, "Task assigned");
        task_id
    }

    /// Current snapshot for a task, or `None` if the id was never submitted
    /// to this agent.
    pub fn result(&self, task_id: &str) -> Option<TaskSnapshot> {
        self.inner.snapshots.read().get(task_id).cloned()
    }

    pub fn status(&self) -> AgentStatus {
        let active_tasks = self
            .inner
            .snapshots
            .read()
            .values()
            .filter(|snap| !snap.is_terminal())
            .count();
        AgentStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind.clone(),
            running: self.is_running(),
            queued_tasks: self.inner.queue.lock().len(),
            active_tasks,
        }
    }
}

async fn worker_loop(
    inner: Arc<AgentInner>,
    executor: Arc<dyn TaskExecutor>,
    config: AgentConfig,
    agent_name: String,
    generation: u64,
) {
    let idle = Duration::from_millis(config.idle_poll_ms);

    loop {
        if !inner.running.load(Ordering::SeqCst)
            || inner.generation.load(Ordering::SeqCst) != generation
        {
            break;
        }

        let next = inner.queue.lock().pop_front();
        match next {
            Some(task) => {
                // Hold the work lock so a stale worker finishing its in-flight
                // task cannot overlap with this generation.
                let _serial = inner.work_lock.lock().await;
                process_task(&inner, &executor, &config, &agent_name, task).await;
            }
            None => {
                // Bounded idle wait; submit() notifies to cut the latency.
                let _ = timeout(idle, inner.wakeup.notified()).await;
            }
        }
    }
    debug!(agent = %agent_name, generation, "Worker loop exited");
}

async fn process_task(
    inner: &Arc<AgentInner>,
    executor: &Arc<dyn TaskExecutor>,
    config: &AgentConfig,
    agent_name: &str,
    task: Task,
) {
    let Some(task_id) = task.id.clone() else {
        // Only submit() feeds the queue, so this indicates corrupted bookkeeping.
        error!(agent = %agent_name, "Dequeued task without id; backing off");
        tokio::time::sleep(Duration::from_millis(config.error_backoff_ms)).await;
        return;
    };

    mark_processing(&inner.snapshots, &task_id);
    info!(agent = %agent_name, task_id = %task_id, kind = %task.kind, "Processing task");

    let progress = ProgressHandle::new(task_id.clone(), Arc::clone(&inner.snapshots));
    let exec = Arc::clone(executor);
    let outcome = tokio::spawn(async move { exec.execute(task, progress).await }).await;

    match outcome {
        Ok(Ok(result)) => {
            complete_task(&inner.snapshots, &task_id, result);
            info!(agent = %agent_name, task_id = %task_id, "Task completed");
        }
        Ok(Err(e)) => {
            fail_task(&inner.snapshots, &task_id, e.to_string());
            warn!(agent = %agent_name, task_id = %task_id, error = %e, "Task failed");
        }
        Err(join_err) => {
            // A panicking executor is recorded like any other failure, but the
            // loop also backs off in case the fault is not task-specific.
            fail_task(
                &inner.snapshots,
                &task_id,
                format!("executor panicked: {join_err}"),
            );
            error!(agent = %agent_name, task_id = %task_id, error = %join_err, "Executor panicked");
            tokio::time::sleep(Duration::from_millis(config.error_backoff_ms)).await;
        }
    }
}

fn mark_processing(snapshots: &SnapshotMap, task_id: &str) {
    let mut snapshots = snapshots.write();
    if let Some(snap) = snapshots.get_mut(task_id) {
        if snap.is_terminal() {
            return;
        }
        snap.status = TaskStatus::Processing;
        snap.started_at = Some(chrono::Utc::now());
        snap.progress = 0;
        snap.status_message = None;
    }
}

fn complete_task(snapshots: &SnapshotMap, task_id: &str, result: Value) {
    let mut snapshots = snapshots.write();
    if let Some(snap) = snapshots.get_mut(task_id) {
        if snap.is_terminal() {
            return;
        }
        snap.status = TaskStatus::Completed;
        snap.progress = 100;
        snap.result = Some(result);
        snap.completed_at = Some(chrono::Utc::now());
    }
}

fn fail_task(snapshots: &SnapshotMap, task_id: &str, error: String) {
    let mut snapshots = snapshots.write();
    if let Some(snap) = snapshots.get_mut(task_id) {
        if snap.is_terminal() {
            return;
        }
        // Progress stays at its last reported value.
        snap.status = TaskStatus::Failed;
        snap.error = Some(error);
        snap.completed_at = Some(chrono::Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::error::OrchestratorError;

    struct EchoExecutor;

    #[async_trait]
    impl TaskExecutor for EchoExecutor {
        async fn execute(
            &self,
            task: Task,
            progress: ProgressHandle,
        ) -> crate::error::Result<Value> {
            progress.update_with_message(50, "echoing");
            Ok(json!({ "echo": task.description }))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl TaskExecutor for AlwaysFails {
        async fn execute(&self, _task: Task, _progress: ProgressHandle) -> crate::error::Result<Value> {
            Err(OrchestratorError::Execution("boom".into()))
        }
    }

    async fn wait_terminal(agent: &Agent, task_id: &str) -> TaskSnapshot {
        for _ in 0..200 {
            if let Some(snap) = agent.result(task_id) {
                if snap.is_terminal() {
                    return snap;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task {task_id} never reached a terminal state");
    }

    fn fast_config() -> AgentConfig {
        AgentConfig {
            idle_poll_ms: 10,
            error_backoff_ms: 10,
            stop_grace_ms: 500,
        }
    }

    #[tokio::test]
    async fn test_submit_returns_id_and_assigned_snapshot() {
        let agent = Agent::new("Echo", "research", Arc::new(EchoExecutor)).with_config(fast_config());

        let id = agent.submit(Task::new("research", "look into X"));
        let snap = agent.result(&id).unwrap();
        assert_eq!(snap.status, TaskStatus::Assigned);
        assert_eq!(snap.progress, 0);
    }

    #[tokio::test]
    async fn test_unknown_task_returns_none() {
        let agent = Agent::new("Echo", "research", Arc::new(EchoExecutor));
        assert!(agent.result("task-nope").is_none());
    }

    #[tokio::test]
    async fn test_task_completes_with_result() {
        let agent = Agent::new("Echo", "research", Arc::new(EchoExecutor)).with_config(fast_config());
        agent.start();

        let id = agent.submit(Task::new("research", "look into X"));
        let snap = wait_terminal(&agent, &id).await;

        assert_eq!(snap.status, TaskStatus::Completed);
        assert_eq!(snap.progress, 100);
        assert_eq!(snap.result.unwrap()["echo"], "look into X");
        assert!(snap.error.is_none());
        assert!(snap.started_at.is_some());
        assert!(snap.completed_at.is_some());

        agent.stop().await;
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_loop() {
        struct FailThenEcho;

        #[async_trait]
        impl TaskExecutor for FailThenEcho {
            async fn execute(
                &self,
                task: Task,
                _progress: ProgressHandle,
            ) -> crate::error::Result<Value> {
                if task.kind == "bad" {
                    Err(OrchestratorError::Execution("boom".into()))
                } else {
                    Ok(json!("ok"))
                }
            }
        }

        let agent = Agent::new("Mixed", "research", Arc::new(FailThenEcho)).with_config(fast_config());
        agent.start();

        let bad = agent.submit(Task::new("bad", "will fail"));
        let good = agent.submit(Task::new("good", "will pass"));

        let bad_snap = wait_terminal(&agent, &bad).await;
        let good_snap = wait_terminal(&agent, &good).await;

        assert_eq!(bad_snap.status, TaskStatus::Failed);
        assert_eq!(bad_snap.error.as_deref(), Some("Task execution failed: boom"));
        assert!(bad_snap.result.is_none());
        assert_eq!(good_snap.status, TaskStatus::Completed);

        agent.stop().await;
    }

    #[tokio::test]
    async fn test_failed_task_keeps_last_progress() {
        struct PartialThenFail;

        #[async_trait]
        impl TaskExecutor for PartialThenFail {
            async fn execute(
                &self,
                _task: Task,
                progress: ProgressHandle,
            ) -> crate::error::Result<Value> {
                progress.update(60);
                Err(OrchestratorError::Execution("late failure".into()))
            }
        }

        let agent =
            Agent::new("Partial", "research", Arc::new(PartialThenFail)).with_config(fast_config());
        agent.start();

        let id = agent.submit(Task::new("research", "doomed"));
        let snap = wait_terminal(&agent, &id).await;

        assert_eq!(snap.status, TaskStatus::Failed);
        assert_eq!(snap.progress, 60);

        agent.stop().await;
    }

    #[tokio::test]
    async fn test_queued_tasks_survive_stop_and_resume_on_start() {
        let agent = Agent::new("Echo", "research", Arc::new(EchoExecutor)).with_config(fast_config());

        // Not started: tasks queue up but never progress.
        let id = agent.submit(Task::new("research", "waits"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(agent.result(&id).unwrap().status, TaskStatus::Assigned);
        assert_eq!(agent.status().queued_tasks, 1);

        agent.start();
        let snap = wait_terminal(&agent, &id).await;
        assert_eq!(snap.status, TaskStatus::Completed);
        agent.stop().await;
        assert!(!agent.is_running());
    }

    #[tokio::test]
    async fn test_restart_cycle_processes_each_task_once() {
        struct Recorder {
            log: Arc<parking_lot::Mutex<Vec<String>>>,
        }

        #[async_trait]
        impl TaskExecutor for Recorder {
            async fn execute(
                &self,
                task: Task,
                _progress: ProgressHandle,
            ) -> crate::error::Result<Value> {
                self.log.lock().push(task.description.clone());
                tokio::time::sleep(Duration::from_millis(60)).await;
                Ok(json!("ok"))
            }
        }

        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let agent = Agent::new(
            "Recorder",
            "research",
            Arc::new(Recorder {
                log: Arc::clone(&log),
            }),
        )
        .with_config(fast_config());

        let a = agent.submit(Task::new("research", "first"));
        let b = agent.submit(Task::new("research", "second"));
        let c = agent.submit(Task::new("research", "third"));

        // Stop mid-queue, then restart; the new worker generation must pick
        // up where the old one left off without reprocessing anything.
        agent.start();
        tokio::time::sleep(Duration::from_millis(80)).await;
        agent.stop().await;
        agent.start();

        wait_terminal(&agent, &a).await;
        wait_terminal(&agent, &b).await;
        wait_terminal(&agent, &c).await;

        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
        agent.stop().await;
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let agent = Agent::new("Echo", "research", Arc::new(EchoExecutor)).with_config(fast_config());
        agent.start();
        agent.start();
        assert!(agent.is_running());
        agent.stop().await;
        agent.stop().await;
        assert!(!agent.is_running());
    }

    #[tokio::test]
    async fn test_status_counts_active_and_queued() {
        let agent = Agent::new("Fail", "research", Arc::new(AlwaysFails)).with_config(fast_config());

        agent.submit(Task::new("research", "a"));
        agent.submit(Task::new("research", "b"));

        let status = agent.status();
        assert_eq!(status.kind, "research");
        assert!(!status.running);
        assert_eq!(status.queued_tasks, 2);
        assert_eq!(status.active_tasks, 2);
    }

    #[tokio::test]
    async fn test_terminal_snapshot_is_stable() {
        let agent = Agent::new("Echo", "research", Arc::new(EchoExecutor)).with_config(fast_config());
        agent.start();

        let id = agent.submit(Task::new("research", "once"));
        let first = wait_terminal(&agent, &id).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = agent.result(&id).unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.result, second.result);
        assert_eq!(first.completed_at, second.completed_at);

        agent.stop().await;
    }
}
