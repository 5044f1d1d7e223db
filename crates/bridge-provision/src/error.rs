//! Provisioning Error Taxonomy
//!
//! Failures that abort the workflow. The two non-fatal conditions
//! (an ownership defect after instance creation and a degraded
//! persistence write) are flags on the record, not errors here,
//! because they must never abort a provisioning that produced a
//! usable instance.

use bridge_billing::BillingError;
use bridge_panel::PanelError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Malformed caller input (bad email, unusable configuration)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The payment session carries no usable customer email
    #[error("Payment session has no customer contact email")]
    MissingCustomerContact,

    /// An external dependency did not answer in time
    #[error("Dependency timed out: {0}")]
    DependencyTimeout(String),

    /// An external dependency failed or was unreachable
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// An external dependency reported a state conflict that one
    /// local retry did not resolve
    #[error("Dependency conflict: {0}")]
    DependencyConflict(String),

    /// Node is at its configured instance ceiling
    #[error("Node capacity exceeded: {current} of {max} instances")]
    CapacityExceeded { current: u32, max: u32 },

    /// No free network allocation on the node
    #[error("No free allocations on node {node_id}")]
    NoCapacity { node_id: u64 },
}

impl From<PanelError> for ProvisionError {
    fn from(e: PanelError) -> Self {
        match e {
            PanelError::Timeout(msg) => ProvisionError::DependencyTimeout(msg),
            PanelError::Conflict(msg) => ProvisionError::DependencyConflict(msg),
            other => ProvisionError::DependencyUnavailable(other.to_string()),
        }
    }
}

impl From<BillingError> for ProvisionError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::Timeout(msg) => ProvisionError::DependencyTimeout(msg),
            other => ProvisionError::DependencyUnavailable(other.to_string()),
        }
    }
}

impl ProvisionError {
    /// The whole `provision` call is safe to retry for these: the
    /// idempotence short-circuit makes a repeat attempt harmless.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProvisionError::DependencyTimeout(_)
                | ProvisionError::DependencyUnavailable(_)
                | ProvisionError::DependencyConflict(_)
        )
    }

    /// User-facing message; never echoes external provider bodies.
    pub fn user_message(&self) -> &str {
        match self {
            ProvisionError::InvalidInput(_) => "Invalid request.",
            ProvisionError::MissingCustomerContact => {
                "No contact email was found for this payment."
            }
            ProvisionError::CapacityExceeded { .. } => {
                "All server slots are currently taken. Please try again later."
            }
            ProvisionError::NoCapacity { .. } => {
                "No network capacity is available right now. Please try again later."
            }
            ProvisionError::DependencyTimeout(_)
            | ProvisionError::DependencyUnavailable(_)
            | ProvisionError::DependencyConflict(_) => {
                "Provisioning is temporarily unavailable. Your payment is safe; please retry."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_error_mapping() {
        let timeout: ProvisionError = PanelError::Timeout("deadline".into()).into();
        assert!(matches!(timeout, ProvisionError::DependencyTimeout(_)));
        assert!(timeout.is_retryable());

        let conflict: ProvisionError = PanelError::Conflict("taken".into()).into();
        assert!(matches!(conflict, ProvisionError::DependencyConflict(_)));
    }

    #[test]
    fn test_capacity_errors_are_distinct() {
        let policy = ProvisionError::CapacityExceeded { current: 5, max: 5 };
        let physical = ProvisionError::NoCapacity { node_id: 1 };
        assert_ne!(policy.user_message(), physical.user_message());
        assert!(!policy.is_retryable());
    }
}
