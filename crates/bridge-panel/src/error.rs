//! Error Types for the Panel Client

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PanelError>;

#[derive(Error, Debug)]
pub enum PanelError {
    /// Request exceeded its deadline
    #[error("Panel request timed out: {0}")]
    Timeout(String),

    /// Panel could not be reached or answered with a transport error
    #[error("Panel unavailable: {0}")]
    Unavailable(String),

    /// Panel rejected the request because of a state conflict
    /// (duplicate email, allocation already claimed)
    #[error("Panel conflict: {0}")]
    Conflict(String),

    /// Requested resource does not exist on the panel
    #[error("Not found on panel: {0}")]
    NotFound(String),

    /// Panel answered with a non-success status
    #[error("Panel API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Panel response parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Client misconfiguration (bad base URL etc.)
    #[error("Panel configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for PanelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PanelError::Timeout(e.to_string())
        } else {
            PanelError::Unavailable(e.to_string())
        }
    }
}

impl PanelError {
    /// Whether retrying the same call can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, PanelError::Timeout(_) | PanelError::Unavailable(_))
    }

    /// Whether the panel reported a state conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, PanelError::Conflict(_))
    }
}
