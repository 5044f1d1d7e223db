//! Provisioning Orchestrator
//!
//! Drives a paid payment session to a running panel instance:
//!
//! ```text
//!   paid session
//!        |
//!   existing record? --yes--> return it unchanged
//!        | no
//!   capacity gate -> account resolve -> allocation pick
//!        |
//!   create instance -> verify ownership -> persist record
//! ```
//!
//! Any step may be re-entered after a crash or a duplicate trigger;
//! the persisted record plus the panel's exclusive allocation claim
//! keep the outcome at one instance per session.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use bridge_billing::{PaymentSession, PaymentStatus};
use bridge_panel::{PanelClient, ServerSpec, SUBUSER_PERMISSIONS};

use crate::capacity::CapacityGate;
use crate::error::{ProvisionError, Result};
use crate::record::{Credentials, ProvisioningRecord, ProvisioningState};
use crate::resolver::AccountResolver;
use crate::store::ReconciliationStore;

/// Static provisioning parameters, sourced from configuration.
#[derive(Clone, Debug)]
pub struct ProvisionSettings {
    pub node_id: u64,
    pub egg_id: u64,
    pub max_servers: u32,
    pub docker_image: String,
    pub startup: String,
    /// Floor applied to the customer-requested memory.
    pub min_memory_mb: u32,
    pub disk_mb: u32,
    pub cpu_percent: u32,
}

pub struct Orchestrator {
    panel: Arc<dyn PanelClient>,
    store: Arc<ReconciliationStore>,
    resolver: AccountResolver,
    gate: CapacityGate,
    settings: ProvisionSettings,
}

impl Orchestrator {
    pub fn new(
        panel: Arc<dyn PanelClient>,
        store: Arc<ReconciliationStore>,
        settings: ProvisionSettings,
    ) -> Self {
        let resolver = AccountResolver::new(panel.clone());
        let gate = CapacityGate::new(panel.clone(), settings.max_servers);
        Self {
            panel,
            store,
            resolver,
            gate,
            settings,
        }
    }

    /// Provision the instance a paid session entitles the customer to.
    ///
    /// Idempotent per session: a completed flow returns its existing
    /// record; a failed or interrupted flow is retried from scratch.
    pub async fn provision(&self, session: &PaymentSession) -> Result<ProvisioningRecord> {
        if session.status != PaymentStatus::Paid {
            return Err(ProvisionError::InvalidInput(format!(
                "session {} is not paid (status: {})",
                session.id,
                session.status.as_str()
            )));
        }

        if let Some(record) = self.store.load(session).await {
            if record.state == ProvisioningState::Ready {
                tracing::info!(
                    session_id = %session.id,
                    server_id = record.server_id,
                    "Session already provisioned, returning existing record"
                );
                return Ok(record);
            }
        }

        match self.run(session).await {
            Ok(mut record) => {
                self.store.save(&mut record).await;
                tracing::info!(
                    session_id = %session.id,
                    server_id = record.server_id,
                    address = record.server_address.as_deref(),
                    "Provisioning complete"
                );
                Ok(record)
            }
            Err(e) => {
                tracing::error!(session_id = %session.id, error = %e, "Provisioning failed");
                self.store.record_failure(&session.id, &e).await;
                Err(e)
            }
        }
    }

    async fn run(&self, session: &PaymentSession) -> Result<ProvisioningRecord> {
        let mut record = ProvisioningRecord::new(&session.id);
        record.state = ProvisioningState::Checking;

        let email = session
            .contact_email()
            .ok_or(ProvisionError::MissingCustomerContact)?;

        self.gate.check(self.settings.node_id).await?;

        let account = self.resolver.resolve(email).await?;
        record.account_id = Some(account.account_id);
        record.account_username = Some(account.username.clone());
        record.state = ProvisioningState::AccountReady;

        let allocations = self.panel.free_allocations(self.settings.node_id).await?;
        let allocation = allocations.first().ok_or(ProvisionError::NoCapacity {
            node_id: self.settings.node_id,
        })?;
        record.state = ProvisioningState::AllocationReady;

        let spec = self.build_spec(&session.metadata);
        let server = self
            .panel
            .create_server(account.account_id, allocation.id, &spec)
            .await?;
        record.server_id = Some(server.id);
        record.server_identifier = Some(server.identifier.clone());
        record.server_address = Some(allocation.address());
        record.state = ProvisioningState::InstanceCreated;

        self.verify_ownership(&mut record, &server.identifier, server.id, server.owner_id, &account, email)
            .await;
        record.state = ProvisioningState::AccessVerified;

        if account.is_new_account {
            if let Some(password) = account.generated_password {
                record.credentials = Some(Credentials {
                    username: account.username,
                    password,
                });
            }
        }

        record.state = ProvisioningState::Ready;
        record.completed_at = Some(Utc::now());
        Ok(record)
    }

    /// Confirm the instance landed under the customer's account and
    /// repair it if not. Repair failures never abort the flow; the
    /// instance already exists and a subuser grant restores access.
    async fn verify_ownership(
        &self,
        record: &mut ProvisioningRecord,
        server_identifier: &str,
        server_id: u64,
        created_owner: u64,
        account: &crate::resolver::ResolvedAccount,
        email: &str,
    ) {
        let actual_owner = match self.panel.server_owner(server_id).await {
            Ok(owner) => owner,
            Err(e) => {
                tracing::warn!(
                    server_id,
                    error = %e,
                    "Owner read failed, trusting create response"
                );
                created_owner
            }
        };
        if actual_owner == account.account_id {
            return;
        }

        tracing::warn!(
            server_id,
            expected = account.account_id,
            actual = actual_owner,
            "Instance owned by wrong account, reassigning"
        );
        if let Err(e) = self.panel.reassign_owner(server_id, account.account_id).await {
            tracing::error!(server_id, error = %e, "Owner reassignment failed");
            record.ownership_defect = true;
            // The grant keeps the customer operational until the
            // ownership defect is repaired manually.
            if let Err(e) = self
                .panel
                .grant_access(server_identifier, email, SUBUSER_PERMISSIONS)
                .await
            {
                tracing::error!(
                    server_identifier,
                    error = %e,
                    "Subuser access grant failed, customer has no panel access"
                );
            }
        }
    }

    fn build_spec(&self, metadata: &HashMap<String, String>) -> ServerSpec {
        let name = metadata
            .get("server_name")
            .filter(|n| !n.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| format!("server-{}", Utc::now().timestamp()));
        let memory_mb = metadata
            .get("memory_mb")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(self.settings.min_memory_mb)
            .max(self.settings.min_memory_mb);
        let version = metadata
            .get("version")
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| "latest".to_string());

        let mut environment = HashMap::new();
        environment.insert("VERSION".to_string(), version);

        ServerSpec {
            name,
            memory_mb,
            disk_mb: self.settings.disk_mb,
            cpu_percent: self.settings.cpu_percent,
            egg_id: self.settings.egg_id,
            docker_image: self.settings.docker_image.clone(),
            startup: self.settings.startup.clone(),
            environment,
        }
    }
}
