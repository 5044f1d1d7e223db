//! Provisioning record and its billing-metadata codec.
//!
//! The record is the unit of idempotence: once one exists in a
//! terminal `Ready` state for a session, every later trigger for that
//! session returns it unchanged. It round-trips through flat string
//! metadata because the billing provider is the durable store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a single provisioning flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningState {
    Pending,
    Checking,
    AccountReady,
    AllocationReady,
    InstanceCreated,
    AccessVerified,
    Ready,
    Failed,
}

/// Panel login material for an account created during this flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProvisioningRecord {
    pub session_id: String,
    pub state: ProvisioningState,
    pub server_id: Option<u64>,
    pub server_identifier: Option<String>,
    pub server_address: Option<String>,
    pub account_id: Option<u64>,
    pub account_username: Option<String>,
    /// Only set when the account was created by this flow.
    pub credentials: Option<Credentials>,
    /// The instance exists but could not be put under the customer's
    /// account; subuser access was granted instead.
    pub ownership_defect: bool,
    /// The billing metadata write failed and the record lives only in
    /// the in-memory fallback store.
    pub persisted_to_fallback: bool,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProvisioningRecord {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            state: ProvisioningState::Pending,
            server_id: None,
            server_identifier: None,
            server_address: None,
            account_id: None,
            account_username: None,
            credentials: None,
            ownership_defect: false,
            persisted_to_fallback: false,
            error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            ProvisioningState::Ready | ProvisioningState::Failed
        )
    }

    /// Flatten the completed record into string metadata entries for
    /// the billing provider. Only terminal outcomes are written.
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut meta = HashMap::new();
        match self.state {
            ProvisioningState::Ready => {
                meta.insert("server_status".to_string(), "ready".to_string());
            }
            ProvisioningState::Failed => {
                meta.insert("server_status".to_string(), "failed".to_string());
            }
            _ => {}
        }
        if let Some(id) = self.server_id {
            meta.insert("server_id".to_string(), id.to_string());
        }
        if let Some(identifier) = &self.server_identifier {
            meta.insert("server_identifier".to_string(), identifier.clone());
        }
        if let Some(address) = &self.server_address {
            meta.insert("server_address".to_string(), address.clone());
        }
        if let Some(id) = self.account_id {
            meta.insert("panel_account_id".to_string(), id.to_string());
        }
        if let Some(username) = &self.account_username {
            meta.insert("panel_username".to_string(), username.clone());
        }
        if let Some(creds) = &self.credentials {
            meta.insert("panel_password".to_string(), creds.password.clone());
        }
        if self.ownership_defect {
            meta.insert("ownership_defect".to_string(), "true".to_string());
        }
        if let Some(completed) = self.completed_at {
            meta.insert("provisioned_at".to_string(), completed.to_rfc3339());
        }
        if let Some(error) = &self.error {
            meta.insert("provision_error".to_string(), error.clone());
        }
        meta
    }

    /// Reconstruct a terminal record from billing metadata. Returns
    /// `None` when no completed flow has been persisted for the
    /// session, which tells the caller to provision.
    pub fn from_metadata(
        session_id: impl Into<String>,
        metadata: &HashMap<String, String>,
    ) -> Option<Self> {
        let status = metadata.get("server_status")?;
        let mut record = Self::new(session_id);

        record.server_id = metadata.get("server_id").and_then(|v| v.parse().ok());
        record.server_identifier = metadata.get("server_identifier").cloned();
        record.server_address = metadata.get("server_address").cloned();
        record.account_id = metadata.get("panel_account_id").and_then(|v| v.parse().ok());
        record.account_username = metadata.get("panel_username").cloned();
        record.ownership_defect = metadata.get("ownership_defect").map(String::as_str) == Some("true");
        record.completed_at = metadata
            .get("provisioned_at")
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc));
        record.error = metadata.get("provision_error").cloned();

        if let (Some(username), Some(password)) =
            (record.account_username.clone(), metadata.get("panel_password"))
        {
            record.credentials = Some(Credentials {
                username,
                password: password.clone(),
            });
        }

        match status.as_str() {
            // A ready record without its instance coordinates is
            // corrupt metadata; re-provisioning is the safe answer.
            "ready" if record.server_id.is_some() && record.server_address.is_some() => {
                record.state = ProvisioningState::Ready;
                Some(record)
            }
            "failed" => {
                record.state = ProvisioningState::Failed;
                Some(record)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_record() -> ProvisioningRecord {
        let mut record = ProvisioningRecord::new("cs_test_123");
        record.state = ProvisioningState::Ready;
        record.server_id = Some(42);
        record.server_identifier = Some("ab12cd34".to_string());
        record.server_address = Some("192.0.2.1:25565".to_string());
        record.account_id = Some(7);
        record.account_username = Some("player4821".to_string());
        record.credentials = Some(Credentials {
            username: "player4821".to_string(),
            password: "s3cret-s3cret".to_string(),
        });
        record.completed_at = Some(Utc::now());
        record
    }

    #[test]
    fn test_metadata_round_trip_for_ready_record() {
        let record = ready_record();
        let meta = record.to_metadata();
        assert_eq!(meta.get("server_status").map(String::as_str), Some("ready"));

        let restored = ProvisioningRecord::from_metadata("cs_test_123", &meta).unwrap();
        assert_eq!(restored.state, ProvisioningState::Ready);
        assert_eq!(restored.server_id, Some(42));
        assert_eq!(restored.server_address.as_deref(), Some("192.0.2.1:25565"));
        assert_eq!(
            restored.credentials.as_ref().map(|c| c.password.as_str()),
            Some("s3cret-s3cret")
        );
        assert!(restored.is_terminal());
    }

    #[test]
    fn test_missing_status_means_no_record() {
        let mut meta = HashMap::new();
        meta.insert("plan".to_string(), "standard".to_string());
        meta.insert("provision_error".to_string(), "panel timed out".to_string());
        assert!(ProvisioningRecord::from_metadata("cs_1", &meta).is_none());
    }

    #[test]
    fn test_ready_status_without_server_fields_is_ignored() {
        let mut meta = HashMap::new();
        meta.insert("server_status".to_string(), "ready".to_string());
        assert!(ProvisioningRecord::from_metadata("cs_1", &meta).is_none());
    }

    #[test]
    fn test_no_password_key_without_credentials() {
        let mut record = ready_record();
        record.credentials = None;
        let meta = record.to_metadata();
        assert!(!meta.contains_key("panel_password"));
    }
}
