use thiserror::Error;

/// The main error type for launch operations
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required parameter is missing or a configured path is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// An external command exited with a nonzero status
    #[error("{stage} failed (exit code {code}): {message}")]
    Command {
        stage: String,
        code: i32,
        message: String,
    },

    /// Misuse of a task graph: undefined or duplicate task, dependency cycle
    #[error("Task error: {0}")]
    Task(String),

    /// The run already failed; carries the name of the task that failed first
    #[error("Run aborted after task '{0}' failed")]
    Aborted(String),

    #[error("Dispatch error: {0}")]
    Dispatch(String),
}

impl LaunchError {
    pub fn command(stage: &str, code: i32, message: impl Into<String>) -> Self {
        Self::Command {
            stage: stage.to_string(),
            code,
            message: message.into(),
        }
    }
}

/// Result type alias for launch operations
pub type LaunchResult<T> = Result<T, LaunchError>;
