//! Multi-agent task orchestration core.
//!
//! A registry of typed agents, each backed by a dedicated worker loop and an
//! ordered FIFO task queue, coordinated by an orchestrator that routes work
//! by declared or inferred kind, tracks per-task lifecycle and progress, and
//! supports decomposing a composite request into subtasks whose results are
//! merged under a bounded wait.
//!
//! What a task actually *does* is pluggable: each agent is constructed with a
//! [`TaskExecutor`], and the core treats execution as opaque.

pub mod agent;
pub mod collaborate;
pub mod config;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod routing;
pub mod task;

pub use agent::{Agent, AgentStatus};
pub use collaborate::{CollaborationReport, CollaborationStatus, Collaborator, CombinedResult};
pub use config::{AgentConfig, CollaborationConfig, CoreConfig};
pub use error::{OrchestratorError, Result};
pub use executor::{ProgressHandle, TaskExecutor};
pub use orchestrator::{Orchestrator, SystemStatus};
pub use routing::{RoutingHint, RoutingRule, RoutingTable};
pub use task::{Task, TaskSnapshot, TaskStatus};
