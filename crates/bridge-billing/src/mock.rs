//! Mock Billing Provider
//!
//! In-memory provider for tests and demos. The `fail_merges` knob
//! simulates the durable metadata store being unavailable, which is
//! what pushes the reconciliation store onto its fallback path.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;

use crate::error::{BillingError, Result};
use crate::provider::BillingProvider;
use crate::session::PaymentSession;

pub struct MockBillingProvider {
    sessions: RwLock<HashMap<String, PaymentSession>>,
    fail_merges: AtomicBool,
    /// Successful metadata merges issued
    pub merge_count: AtomicU32,
}

impl Default for MockBillingProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBillingProvider {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            fail_merges: AtomicBool::new(false),
            merge_count: AtomicU32::new(0),
        }
    }

    pub fn insert_session(&self, session: PaymentSession) {
        self.sessions
            .write()
            .unwrap()
            .insert(session.id.clone(), session);
    }

    /// Make every metadata merge fail until reset.
    pub fn set_fail_merges(&self, fail: bool) {
        self.fail_merges.store(fail, Ordering::SeqCst);
    }

    /// Read back a session's metadata (assertions).
    pub fn metadata_of(&self, session_id: &str) -> Option<HashMap<String, String>> {
        self.sessions
            .read()
            .unwrap()
            .get(session_id)
            .map(|s| s.metadata.clone())
    }
}

#[async_trait]
impl BillingProvider for MockBillingProvider {
    async fn fetch_session(&self, session_id: &str) -> Result<PaymentSession> {
        self.sessions
            .read()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| BillingError::SessionNotFound(session_id.to_string()))
    }

    async fn merge_metadata(
        &self,
        session_id: &str,
        entries: &HashMap<String, String>,
    ) -> Result<()> {
        if self.fail_merges.load(Ordering::SeqCst) {
            return Err(BillingError::Provider("metadata store unavailable".into()));
        }

        let mut sessions = self.sessions.write().unwrap();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| BillingError::SessionNotFound(session_id.to_string()))?;
        for (k, v) in entries {
            session.metadata.insert(k.clone(), v.clone());
        }
        self.merge_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "billing-mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::PaymentStatus;

    fn paid_session(id: &str) -> PaymentSession {
        PaymentSession {
            id: id.into(),
            status: PaymentStatus::Paid,
            customer_details_email: Some("customer@example.com".into()),
            customer_email: None,
            metadata: HashMap::from([("plan".to_string(), "starter".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_merge_preserves_unknown_keys() {
        let billing = MockBillingProvider::new();
        billing.insert_session(paid_session("cs_1"));

        let entries = HashMap::from([("server_id".to_string(), "42".to_string())]);
        billing.merge_metadata("cs_1", &entries).await.unwrap();

        let meta = billing.metadata_of("cs_1").unwrap();
        assert_eq!(meta.get("plan").unwrap(), "starter");
        assert_eq!(meta.get("server_id").unwrap(), "42");
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let billing = MockBillingProvider::new();
        let result = billing.fetch_session("cs_missing").await;
        assert!(matches!(result, Err(BillingError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_fail_merges_knob() {
        let billing = MockBillingProvider::new();
        billing.insert_session(paid_session("cs_1"));
        billing.set_fail_merges(true);

        let entries = HashMap::from([("server_id".to_string(), "42".to_string())]);
        let result = billing.merge_metadata("cs_1", &entries).await;
        assert!(matches!(result, Err(BillingError::Provider(_))));
        assert_eq!(billing.merge_count.load(Ordering::SeqCst), 0);
    }
}
