use thiserror::Error;

/// Terminal failures of a prediction request. Every variant renders a message
/// that can be handed back to the caller as-is.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictError {
    #[error("Player '{0}' not found")]
    NotFound(String),

    #[error("Error getting game logs: {0}")]
    Upstream(String),

    #[error("Not enough data: {0}")]
    InsufficientData(String),

    #[error("Insufficient variation: every training game landed on the same side of the threshold")]
    DegenerateTrainingSet,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PredictError {
    pub(crate) fn upstream(err: anyhow::Error) -> Self {
        PredictError::Upstream(format!("{:#}", err))
    }
}

pub type Result<T> = std::result::Result<T, PredictError>;
