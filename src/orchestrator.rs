//! Orchestrator: agent registry, task routing, and result lookup.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::agent::{Agent, AgentStatus};
use crate::error::{OrchestratorError, Result};
use crate::routing::{RoutingHint, RoutingTable};
use crate::task::{Task, TaskSnapshot};

/// System-wide status aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub agent_count: usize,
    pub agents: Vec<AgentStatus>,
    /// Tasks across all agents whose status is non-terminal.
    pub active_tasks: usize,
}

#[derive(Default)]
struct Registry {
    agents: HashMap<String, Arc<Agent>>,
    /// Registration order; the deterministic tie-break for kind lookup and
    /// the last-resort fallback.
    order: Vec<String>,
    by_kind: HashMap<String, Vec<String>>,
}

impl Registry {
    fn insert(&mut self, agent: Arc<Agent>) {
        let id = agent.id().to_string();
        if self.agents.contains_key(&id) {
            warn!(agent_id = %id, "Agent already registered, replacing");
            self.forget(&id);
        }
        self.order.push(id.clone());
        self.by_kind
            .entry(agent.kind().to_string())
            .or_default()
            .push(id.clone());
        self.agents.insert(id, agent);
    }

    fn forget(&mut self, agent_id: &str) -> Option<Arc<Agent>> {
        let agent = self.agents.remove(agent_id)?;
        self.order.retain(|id| id != agent_id);
        if let Some(ids) = self.by_kind.get_mut(agent.kind()) {
            ids.retain(|id| id != agent_id);
            if ids.is_empty() {
                self.by_kind.remove(agent.kind());
            }
        }
        Some(agent)
    }

    fn first_of_kind(&self, kind: &str) -> Option<Arc<Agent>> {
        self.by_kind
            .get(kind)
            .and_then(|ids| ids.first())
            .and_then(|id| self.agents.get(id))
            .cloned()
    }

    fn first_registered(&self) -> Option<Arc<Agent>> {
        self.order.first().and_then(|id| self.agents.get(id)).cloned()
    }

    fn resolve(&self, routing: &RoutingTable, task: &Task, hint: &RoutingHint) -> Option<Arc<Agent>> {
        if let Some(agent_id) = &hint.agent_id {
            if let Some(agent) = self.agents.get(agent_id) {
                return Some(Arc::clone(agent));
            }
            // Unknown explicit id falls through to the remaining rules.
            warn!(agent_id = %agent_id, "Routing hint names an unknown agent");
        }

        if let Some(kind) = &hint.kind {
            if let Some(agent) = self.first_of_kind(kind) {
                return Some(agent);
            }
        }

        for kind in routing.candidates(&task.kind, &task.description) {
            if let Some(agent) = self.first_of_kind(kind) {
                debug!(kind = %kind, "Routed task by keyword inference");
                return Some(agent);
            }
        }

        self.first_registered()
    }
}

/// Registry and router for a set of agents.
///
/// Owns no task state itself: `assignments` only points each task id at the
/// agent whose snapshot map holds the live state.
pub struct Orchestrator {
    registry: RwLock<Registry>,
    assignments: RwLock<HashMap<String, String>>,
    routing: RoutingTable,
}

impl Orchestrator {
    pub fn new() -> Self {
        info!("Multi-agent orchestrator initialized");
        Self {
            registry: RwLock::new(Registry::default()),
            assignments: RwLock::new(HashMap::new()),
            routing: RoutingTable::default(),
        }
    }

    pub fn with_routing(mut self, routing: RoutingTable) -> Self {
        self.routing = routing;
        self
    }

    /// Register an agent and return its id.
    ///
    /// A duplicate id replaces the previous registration with a warning.
    pub fn register(&self, agent: Arc<Agent>) -> String {
        let id = agent.id().to_string();
        info!(agent_id = %id, name = %agent.name(), kind = %agent.kind(), "Agent registered");
        self.registry.write().insert(agent);
        id
    }

    pub fn agent(&self, agent_id: &str) -> Option<Arc<Agent>> {
        self.registry.read().agents.get(agent_id).cloned()
    }

    /// First registered agent of the given kind, if any.
    pub fn agent_by_kind(&self, kind: &str) -> Option<Arc<Agent>> {
        self.registry.read().first_of_kind(kind)
    }

    pub fn start_all(&self) {
        let agents: Vec<_> = self.registry.read().agents.values().cloned().collect();
        for agent in &agents {
            agent.start();
        }
        info!(count = agents.len(), "Started all agents");
    }

    pub async fn stop_all(&self) {
        let agents: Vec<_> = self.registry.read().agents.values().cloned().collect();
        for agent in &agents {
            agent.stop().await;
        }
        info!(count = agents.len(), "Stopped all agents");
    }

    /// Stop an agent and drop it from the registry.
    ///
    /// Results held by the removed agent become unreachable; `result` reports
    /// `AgentNotFound` for task ids that pointed at it.
    pub async fn remove(&self, agent_id: &str) -> Result<()> {
        let agent = self
            .registry
            .write()
            .forget(agent_id)
            .ok_or_else(|| OrchestratorError::AgentNotFound(agent_id.to_string()))?;
        agent.stop().await;
        info!(agent_id = %agent_id, "Agent removed");
        Ok(())
    }

    /// Route a task to an agent and return the assigned task id.
    ///
    /// Resolution order: explicit agent id, explicit kind, keyword inference
    /// over the routing table, then the first registered agent. Fails with
    /// `NoAgentAvailable` only when the registry is empty, in which case no
    /// task id is produced.
    pub fn assign(&self, task: Task, hint: RoutingHint) -> Result<String> {
        let agent = self.registry.read().resolve(&self.routing, &task, &hint);
        let Some(agent) = agent else {
            error!("No agents available to assign task");
            return Err(OrchestratorError::NoAgentAvailable);
        };

        let task_id = agent.submit(task);
        self.assignments
            .write()
            .insert(task_id.clone(), agent.id().to_string());
        debug!(task_id = %task_id, agent_id = %agent.id(), "Task routed");
        Ok(task_id)
    }

    /// Locate the owning agent for a task id and return its current snapshot.
    pub fn result(&self, task_id: &str) -> Result<TaskSnapshot> {
        let agent_id = self
            .assignments
            .read()
            .get(task_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::UnknownTask(task_id.to_string()))?;

        let agent = self
            .agent(&agent_id)
            .ok_or(OrchestratorError::AgentNotFound(agent_id))?;

        agent
            .result(task_id)
            .ok_or_else(|| OrchestratorError::UnknownTask(task_id.to_string()))
    }

    pub fn system_status(&self) -> SystemStatus {
        let registry = self.registry.read();
        let agents: Vec<AgentStatus> = registry
            .order
            .iter()
            .filter_map(|id| registry.agents.get(id))
            .map(|agent| agent.status())
            .collect();
        let active_tasks = agents.iter().map(|status| status.active_tasks).sum();
        SystemStatus {
            agent_count: agents.len(),
            agents,
            active_tasks,
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}
