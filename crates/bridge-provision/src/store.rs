//! Reconciliation store.
//!
//! Terminal records are persisted into the billing provider's payment
//! metadata, which is the system of record. When that write fails the
//! record is parked in an in-memory fallback map so the current
//! process can still answer idempotence and pull queries for it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use bridge_billing::{BillingProvider, PaymentSession};

use crate::error::ProvisionError;
use crate::record::ProvisioningRecord;

pub struct ReconciliationStore {
    billing: Arc<dyn BillingProvider>,
    fallback: RwLock<HashMap<String, ProvisioningRecord>>,
}

impl ReconciliationStore {
    pub fn new(billing: Arc<dyn BillingProvider>) -> Self {
        Self {
            billing,
            fallback: RwLock::new(HashMap::new()),
        }
    }

    /// Load the terminal record for a session: the metadata in hand,
    /// then a fresh read of the durable billing metadata, then the
    /// process-local fallback.
    ///
    /// The refetch matters for webhook-delivered sessions: they carry
    /// only creation-time metadata, while the persisted record lives
    /// in payment-intent metadata and only appears on an expanded
    /// fetch. Skipping it would re-provision an already-served
    /// session whenever the fallback map is empty, such as after a
    /// restart.
    pub async fn load(&self, session: &PaymentSession) -> Option<ProvisioningRecord> {
        if let Some(record) = ProvisioningRecord::from_metadata(&session.id, &session.metadata) {
            return Some(record);
        }

        match self.billing.fetch_session(&session.id).await {
            Ok(fresh) => {
                if let Some(record) = ProvisioningRecord::from_metadata(&fresh.id, &fresh.metadata)
                {
                    return Some(record);
                }
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    error = %e,
                    "Durable record lookup failed, consulting in-memory fallback only"
                );
            }
        }

        self.fallback.read().await.get(&session.id).cloned()
    }

    /// Persist a terminal record. A failed metadata write degrades to
    /// the fallback map instead of failing the flow; the instance
    /// already exists and must not be lost.
    pub async fn save(&self, record: &mut ProvisioningRecord) {
        let entries = record.to_metadata();
        match self.billing.merge_metadata(&record.session_id, &entries).await {
            Ok(()) => {
                tracing::debug!(
                    session_id = %record.session_id,
                    "Provisioning record persisted to billing metadata"
                );
            }
            Err(e) => {
                tracing::warn!(
                    session_id = %record.session_id,
                    error = %e,
                    "Billing metadata write failed, record persistence degraded to in-memory fallback"
                );
                record.persisted_to_fallback = true;
            }
        }
        // Keep the fallback current either way so a later load within
        // this process never observes a stale record.
        self.fallback
            .write()
            .await
            .insert(record.session_id.clone(), record.clone());
    }

    /// Best-effort note of a failed flow in billing metadata. Writes
    /// diagnostics only, never a terminal status, so a later trigger
    /// for the session retries from scratch.
    pub async fn record_failure(&self, session_id: &str, error: &ProvisionError) {
        let mut entries = HashMap::new();
        entries.insert("provision_error".to_string(), error.to_string());
        entries.insert(
            "provision_failed_at".to_string(),
            chrono::Utc::now().to_rfc3339(),
        );
        if let Err(e) = self.billing.merge_metadata(session_id, &entries).await {
            tracing::warn!(
                session_id = %session_id,
                error = %e,
                "Could not record provisioning failure in billing metadata"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ProvisioningState;
    use bridge_billing::{MockBillingProvider, PaymentStatus};
    use chrono::Utc;

    fn paid_session(id: &str) -> PaymentSession {
        PaymentSession {
            id: id.to_string(),
            status: PaymentStatus::Paid,
            customer_details_email: Some("buyer@example.com".to_string()),
            customer_email: None,
            metadata: HashMap::new(),
        }
    }

    fn ready_record(session_id: &str) -> ProvisioningRecord {
        let mut record = ProvisioningRecord::new(session_id);
        record.state = ProvisioningState::Ready;
        record.server_id = Some(1);
        record.server_address = Some("192.0.2.1:25565".to_string());
        record.completed_at = Some(Utc::now());
        record
    }

    #[tokio::test]
    async fn test_save_writes_metadata_and_load_reads_it_back() {
        let billing = Arc::new(MockBillingProvider::new());
        billing.insert_session(paid_session("cs_1"));
        let store = ReconciliationStore::new(billing.clone());

        let mut record = ready_record("cs_1");
        store.save(&mut record).await;
        assert!(!record.persisted_to_fallback);

        let meta = billing.metadata_of("cs_1").unwrap();
        assert_eq!(meta.get("server_status").map(String::as_str), Some("ready"));

        let mut session = paid_session("cs_1");
        session.metadata = meta;
        let loaded = store.load(&session).await.unwrap();
        assert_eq!(loaded.state, ProvisioningState::Ready);
    }

    #[tokio::test]
    async fn test_load_refetches_durable_metadata_for_bare_sessions() {
        let billing = Arc::new(MockBillingProvider::new());
        billing.insert_session(paid_session("cs_push"));
        let store = ReconciliationStore::new(billing.clone());

        let mut record = ready_record("cs_push");
        store.save(&mut record).await;

        // A fresh store with an empty fallback map, handed the
        // session as a webhook event embeds it: creation-time
        // metadata only. The durable record must still be found.
        let fresh_store = ReconciliationStore::new(billing);
        let loaded = fresh_store.load(&paid_session("cs_push")).await.unwrap();
        assert_eq!(loaded.state, ProvisioningState::Ready);
        assert_eq!(loaded.server_id, Some(1));
    }

    #[tokio::test]
    async fn test_failed_metadata_write_degrades_to_fallback() {
        let billing = Arc::new(MockBillingProvider::new());
        billing.insert_session(paid_session("cs_2"));
        billing.set_fail_merges(true);
        let store = ReconciliationStore::new(billing);

        let mut record = ready_record("cs_2");
        store.save(&mut record).await;
        assert!(record.persisted_to_fallback);

        // Session metadata still empty, but the fallback answers.
        let loaded = store.load(&paid_session("cs_2")).await.unwrap();
        assert_eq!(loaded.state, ProvisioningState::Ready);
        assert!(loaded.persisted_to_fallback);
    }

    #[tokio::test]
    async fn test_record_failure_leaves_no_terminal_status() {
        let billing = Arc::new(MockBillingProvider::new());
        billing.insert_session(paid_session("cs_3"));
        let store = ReconciliationStore::new(billing.clone());

        store
            .record_failure("cs_3", &ProvisionError::DependencyTimeout("panel".into()))
            .await;

        let meta = billing.metadata_of("cs_3").unwrap();
        assert!(meta.contains_key("provision_error"));
        assert!(!meta.contains_key("server_status"));

        let mut session = paid_session("cs_3");
        session.metadata = meta;
        assert!(store.load(&session).await.is_none());
    }
}
