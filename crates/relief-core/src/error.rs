use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReliefError {
    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    #[error("LLM response parse error: {0}")]
    LlmParse(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool}: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Tool timeout after {timeout_secs}s: {tool}")]
    ToolTimeout { tool: String, timeout_secs: u64 },

    #[error("Tool input validation failed: {0}")]
    ToolValidation(String),

    // Pipeline errors
    #[error("Task '{task}' lists '{missing}' as context, but it was not submitted before it")]
    InvalidContext { task: String, missing: String },

    #[error("Task exceeded max duration ({0}s)")]
    MaxDurationExceeded(u64),

    #[error("Crew has no tasks")]
    EmptyCrew,

    #[error("Run cancelled")]
    Cancelled,

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Missing credential: {0} (set it in [credentials] or the environment)")]
    MissingCredential(&'static str),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReliefError>;
