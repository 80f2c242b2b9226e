//! Runtime tuning for agents and the collaborative protocol.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{OrchestratorError, Result};

/// Worker-loop tuning for a single agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Upper bound on idle latency when the queue is empty.
    pub idle_poll_ms: u64,
    /// Backoff after a bookkeeping error inside the worker loop.
    pub error_backoff_ms: u64,
    /// How long `stop()` waits for the in-flight task before returning.
    pub stop_grace_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            idle_poll_ms: 100,
            error_backoff_ms: 1000,
            stop_grace_ms: 2000,
        }
    }
}

/// Fan-out/fan-in wait tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaborationConfig {
    /// Interval between polls of outstanding subtasks.
    pub poll_interval_ms: u64,
    /// Overall deadline for a collaborative run.
    pub deadline_secs: u64,
}

impl Default for CollaborationConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            deadline_secs: 300,
        }
    }
}

/// Top-level configuration for the orchestration core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub agent: AgentConfig,
    pub collaboration: CollaborationConfig,
}

impl CoreConfig {
    /// Load from a TOML file, falling back to defaults when the file is absent.
    pub async fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content =
            toml::to_string_pretty(self).map_err(|e| OrchestratorError::Config(e.to_string()))?;
        fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.agent.idle_poll_ms == 0 {
            errors.push("agent.idle_poll_ms must be greater than 0");
        }
        if self.agent.error_backoff_ms == 0 {
            errors.push("agent.error_backoff_ms must be greater than 0");
        }
        if self.collaboration.poll_interval_ms == 0 {
            errors.push("collaboration.poll_interval_ms must be greater than 0");
        }
        if self.collaboration.deadline_secs == 0 {
            errors.push("collaboration.deadline_secs must be greater than 0");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(OrchestratorError::Config(errors.join("; ")))
        }
    }
}
