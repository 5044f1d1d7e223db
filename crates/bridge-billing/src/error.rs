//! Billing Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, BillingError>;

/// Billing-related errors
#[derive(Error, Debug)]
pub enum BillingError {
    /// Provider API error
    #[error("Billing provider error: {0}")]
    Provider(String),

    /// Provider call exceeded its deadline
    #[error("Billing provider timed out: {0}")]
    Timeout(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    Signature(String),

    /// Payload or identifier parsing failed
    #[error("Billing parse error: {0}")]
    Parse(String),

    /// No payment session with the given id
    #[error("Payment session not found: {0}")]
    SessionNotFound(String),

    /// Configuration error
    #[error("Billing configuration error: {0}")]
    Config(String),
}

impl BillingError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::Provider(_) | BillingError::Timeout(_))
    }

    /// Get user-friendly message (never echoes provider bodies)
    pub fn user_message(&self) -> &str {
        match self {
            BillingError::Provider(_) | BillingError::Timeout(_) => {
                "Payment processing failed. Please try again."
            }
            BillingError::Signature(_) => "Request could not be authenticated.",
            BillingError::SessionNotFound(_) => "Payment session not found.",
            BillingError::Config(_) => "Service configuration error.",
            BillingError::Parse(_) => "An error occurred processing your request.",
        }
    }
}
