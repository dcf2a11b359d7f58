use crate::state::Stage;
use thiserror::Error;

/// Failures of a single generation call or of decoding its result.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No API key configured for provider '{0}'")]
    Configuration(String),

    #[error("Failed to parse model output: {message}")]
    Parse { message: String, raw: String },

    #[error("Upstream model error: {0}")]
    Upstream(String),

    #[error("Failed to encode prompt context: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Shot design returned {actual} shots for {expected} dialogue lines")]
    ShotMismatch { expected: usize, actual: usize },
}

impl GenerationError {
    pub fn parse(message: impl Into<String>, raw: &str) -> Self {
        GenerationError::Parse {
            message: message.into(),
            raw: raw.to_string(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, GenerationError::Configuration(_))
    }
}

/// Failure surfaced by a controller handler after it has been logged.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0} is already running")]
    Busy(Stage),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

impl HandlerError {
    pub fn generation(&self) -> Option<&GenerationError> {
        match self {
            HandlerError::Generation(e) => Some(e),
            HandlerError::Busy(_) => None,
        }
    }
}
