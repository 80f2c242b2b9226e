use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("No agent available to handle task")]
    NoAgentAvailable,

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Task execution failed: {0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
