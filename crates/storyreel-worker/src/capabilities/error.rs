//! Capability error types.

use thiserror::Error;

pub type CapabilityResult<T> = Result<T, CapabilityError>;

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Media error: {0}")]
    Media(#[from] storyreel_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unavailable(String),
}

impl CapabilityError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Whether a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CapabilityError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            CapabilityError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
