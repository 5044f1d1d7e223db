//! Payment Session Domain Model

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Payment state of a checkout attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// The billing provider's record of one checkout attempt, as this
/// system sees it. Owned by the provider; this system only reads it
/// and merges keys into its metadata map.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentSession {
    /// Opaque provider-issued session id
    pub id: String,

    /// Payment state
    pub status: PaymentStatus,

    /// Email from the provider's customer-details block, when present
    pub customer_details_email: Option<String>,

    /// Email supplied at session creation, when present
    pub customer_email: Option<String>,

    /// Arbitrary key-value metadata attached to the payment record
    pub metadata: HashMap<String, String>,
}

impl PaymentSession {
    /// Customer contact, checked in the documented order: the
    /// customer-details email, then the creation-time email, then a
    /// metadata-carried email. Empty strings do not count.
    pub fn contact_email(&self) -> Option<&str> {
        fn non_empty(email: Option<&str>) -> Option<&str> {
            email.filter(|e| !e.trim().is_empty())
        }

        non_empty(self.customer_details_email.as_deref())
            .or_else(|| non_empty(self.customer_email.as_deref()))
            .or_else(|| non_empty(self.metadata.get("customer_email").map(String::as_str)))
            .or_else(|| non_empty(self.metadata.get("email").map(String::as_str)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> PaymentSession {
        PaymentSession {
            id: "cs_test_1".into(),
            status: PaymentStatus::Paid,
            customer_details_email: None,
            customer_email: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_contact_email_precedence() {
        let mut s = session();
        s.metadata.insert("email".into(), "meta@example.com".into());
        s.customer_email = Some("fallback@example.com".into());
        s.customer_details_email = Some("details@example.com".into());
        assert_eq!(s.contact_email(), Some("details@example.com"));

        s.customer_details_email = None;
        assert_eq!(s.contact_email(), Some("fallback@example.com"));

        s.customer_email = None;
        assert_eq!(s.contact_email(), Some("meta@example.com"));
    }

    #[test]
    fn test_contact_email_skips_empty_entries() {
        let mut s = session();
        s.customer_details_email = Some("   ".into());
        assert_eq!(s.contact_email(), None);

        s.customer_email = Some("real@example.com".into());
        assert_eq!(s.contact_email(), Some("real@example.com"));
    }
}
