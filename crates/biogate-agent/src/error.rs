use biogate_storage::StorageError;
use thiserror::Error;

/// Errors from one poll cycle or one scan.
///
/// None of these leave the agent: the poll loop logs them and moves on.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] biogate_core::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
