//! Error types for evaluation runs

/// Result type for evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Error types for the evaluation harness
///
/// Task and scorer failures are not represented here: they are captured on
/// the row (or score) that produced them and never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Evaluation is misconfigured and cannot start
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A scorer was invoked with arguments it cannot score
    #[error("Invalid input for scorer '{scorer}': {reason}")]
    InvalidScorerInput { scorer: String, reason: String },

    /// Dataset could not be produced
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Trace reported outside of any task invocation
    #[error("No active trace scope; report_trace must be called from inside a task")]
    NoTraceScope,

    /// No run recorded for the evaluation
    #[error("No run found for evaluation '{eval_name}'")]
    RunNotFound { eval_name: String },

    /// Row index out of range for the selected run
    #[error("No result at index {index} for evaluation '{eval_name}'")]
    ResultNotFound { eval_name: String, index: usize },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl EvalError {
    /// Shorthand for a scorer that needs an expected value and got none
    pub fn missing_expected(scorer: impl Into<String>) -> Self {
        let scorer = scorer.into();
        EvalError::InvalidScorerInput {
            reason: format!("{} requires an expected value", scorer),
            scorer,
        }
    }
}

impl From<String> for EvalError {
    fn from(s: String) -> Self {
        EvalError::Other(s)
    }
}

impl From<&str> for EvalError {
    fn from(s: &str) -> Self {
        EvalError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for EvalError {
    fn from(err: anyhow::Error) -> Self {
        EvalError::Other(err.to_string())
    }
}
