use slangmine_core::Cancelled;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("completion contained no choices")]
    EmptyResponse,

    #[error("'{seed}' has {available} example terms; the prompt needs {needed}")]
    InsufficientExamples {
        seed: String,
        available: usize,
        needed: usize,
    },

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<GenerateError>,
    },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl GenerateError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Server { .. } | Self::Json(_) | Self::EmptyResponse
        )
    }
}
