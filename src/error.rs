use thiserror::Error;

/// Step distance error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepDistError {
    #[error("Missing configuration option: {0}")]
    MissingOption(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Distance measurement already running")]
    AlreadyRunning,

    #[error("Distance measurement not running")]
    NotRunning,

    #[error("Localization not started")]
    NotLocalizing,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Service channel closed")]
    ChannelClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StepDistError {
    /// Configuration problems are the only errors that refuse a start.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StepDistError::MissingOption(_) | StepDistError::InvalidConfig(_)
        )
    }
}

impl From<std::io::Error> for StepDistError {
    fn from(err: std::io::Error) -> Self {
        StepDistError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StepDistError {
    fn from(err: serde_json::Error) -> Self {
        StepDistError::Storage(err.to_string())
    }
}

/// Result type for library operations
pub type Result<T> = std::result::Result<T, StepDistError>;
