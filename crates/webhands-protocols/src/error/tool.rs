//! Tool execution errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Parameter validation failed: {0}")]
    ValidationFailed(String),

    #[error("Tool execution timed out: {0}")]
    Timeout(String),

    #[error("Tool execution was cancelled")]
    Cancelled,

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
