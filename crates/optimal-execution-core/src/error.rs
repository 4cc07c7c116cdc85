use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Invalid parameter: {field} — {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Unstable configuration: {0}")]
    UnstableConfiguration(String),

    #[error("Construction failure: {0}")]
    ConstructionFailure(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ExecutionError {
    fn from(e: serde_json::Error) -> Self {
        ExecutionError::SerializationError(e.to_string())
    }
}

impl ExecutionError {
    /// Shorthand for the common invalid-parameter case.
    pub fn invalid(field: &str, reason: &str) -> Self {
        ExecutionError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
