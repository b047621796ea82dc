use thiserror::Error;

use crate::orchestration::AgentType;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Agent not available: {0}")]
    AgentNotAvailable(AgentType),

    #[error("Agent {agent_type} is at capacity (max: {max})")]
    AgentPoolFull { agent_type: AgentType, max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
