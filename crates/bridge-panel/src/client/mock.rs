//! Mock Panel Client
//!
//! In-memory panel for tests and demos. Models the two behaviors the
//! workflow depends on: email uniqueness in the account directory and
//! the atomic allocation claim inside server creation.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use super::PanelClient;
use crate::error::{PanelError, Result};
use crate::model::{Allocation, NewAccount, PanelAccount, PanelServer, ServerSpec};

#[derive(Default)]
struct MockState {
    accounts: Vec<PanelAccount>,
    allocations: Vec<Allocation>,
    servers: Vec<PanelServer>,
    grants: Vec<(String, String)>,
    next_account_id: u64,
    next_server_id: u64,
    /// Servers that exist on the node before any test activity
    baseline_servers: u32,
    /// Panel records this owner instead of the requested one
    owner_override: Option<u64>,
    /// Next create_account call loses the race: the account appears
    /// (as if a rival request created it) but the call conflicts
    race_next_account_create: bool,
    fail_reassign: bool,
    fail_grant: bool,
}

/// Mock panel with knobs for failure-path tests.
pub struct MockPanelClient {
    state: Mutex<MockState>,
    /// Total account-create calls issued (uniqueness assertions)
    pub account_creates: AtomicU32,
    /// Total server-create calls issued (idempotence assertions)
    pub server_creates: AtomicU32,
}

impl Default for MockPanelClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPanelClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_account_id: 1,
                next_server_id: 1,
                ..MockState::default()
            }),
            account_creates: AtomicU32::new(0),
            server_creates: AtomicU32::new(0),
        }
    }

    /// Add a free allocation to the node inventory.
    pub fn seed_allocation(&self, id: u64, ip: &str, port: u16) {
        self.state.lock().unwrap().allocations.push(Allocation {
            id,
            ip: ip.to_string(),
            port,
            assigned: false,
        });
    }

    /// Add an existing account to the directory.
    pub fn seed_account(&self, id: u64, email: &str, username: &str) {
        let mut state = self.state.lock().unwrap();
        state.next_account_id = state.next_account_id.max(id + 1);
        state.accounts.push(PanelAccount {
            id,
            email: email.to_string(),
            username: username.to_string(),
        });
    }

    /// Pretend the node already holds this many servers.
    pub fn set_baseline_servers(&self, count: u32) {
        self.state.lock().unwrap().baseline_servers = count;
    }

    /// Panel will record this owner regardless of the requested one.
    pub fn set_owner_override(&self, owner_id: u64) {
        self.state.lock().unwrap().owner_override = Some(owner_id);
    }

    pub fn set_fail_reassign(&self, fail: bool) {
        self.state.lock().unwrap().fail_reassign = fail;
    }

    pub fn set_fail_grant(&self, fail: bool) {
        self.state.lock().unwrap().fail_grant = fail;
    }

    /// Make the next account-create lose a duplicate race.
    pub fn set_race_next_account_create(&self) {
        self.state.lock().unwrap().race_next_account_create = true;
    }

    /// Access grants recorded so far: (server identifier, email).
    pub fn grants(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().grants.clone()
    }
}

#[async_trait]
impl PanelClient for MockPanelClient {
    async fn find_account_by_email(&self, email: &str) -> Result<Option<PanelAccount>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_account(&self, account: &NewAccount) -> Result<PanelAccount> {
        self.account_creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();

        if state
            .accounts
            .iter()
            .any(|a| a.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(PanelError::Conflict("email has already been taken".into()));
        }

        let id = state.next_account_id;
        state.next_account_id += 1;
        let created = PanelAccount {
            id,
            email: account.email.clone(),
            username: account.username.clone(),
        };
        state.accounts.push(created.clone());

        if state.race_next_account_create {
            // The rival's insert stands; this caller sees the conflict.
            state.race_next_account_create = false;
            return Err(PanelError::Conflict("email has already been taken".into()));
        }

        Ok(created)
    }

    async fn server_count(&self, _node_id: u64) -> Result<u32> {
        let state = self.state.lock().unwrap();
        Ok(state.baseline_servers + state.servers.len() as u32)
    }

    async fn free_allocations(&self, _node_id: u64) -> Result<Vec<Allocation>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .allocations
            .iter()
            .filter(|a| !a.assigned)
            .cloned()
            .collect())
    }

    async fn create_server(
        &self,
        owner_id: u64,
        allocation_id: u64,
        _spec: &ServerSpec,
    ) -> Result<PanelServer> {
        self.server_creates.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();

        let alloc = state
            .allocations
            .iter_mut()
            .find(|a| a.id == allocation_id)
            .ok_or_else(|| PanelError::NotFound(format!("allocation {allocation_id}")))?;
        if alloc.assigned {
            return Err(PanelError::Conflict(format!(
                "allocation {allocation_id} already assigned"
            )));
        }
        alloc.assigned = true;

        let recorded_owner = state.owner_override.unwrap_or(owner_id);
        let id = state.next_server_id;
        state.next_server_id += 1;
        let server = PanelServer {
            id,
            identifier: format!("mock{id:06x}"),
            owner_id: recorded_owner,
        };
        state.servers.push(server.clone());
        Ok(server)
    }

    async fn server_owner(&self, server_id: u64) -> Result<u64> {
        let state = self.state.lock().unwrap();
        state
            .servers
            .iter()
            .find(|s| s.id == server_id)
            .map(|s| s.owner_id)
            .ok_or_else(|| PanelError::NotFound(format!("server {server_id}")))
    }

    async fn reassign_owner(&self, server_id: u64, owner_id: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_reassign {
            return Err(PanelError::Api {
                status: 500,
                message: "owner update rejected".into(),
            });
        }
        let server = state
            .servers
            .iter_mut()
            .find(|s| s.id == server_id)
            .ok_or_else(|| PanelError::NotFound(format!("server {server_id}")))?;
        server.owner_id = owner_id;
        Ok(())
    }

    async fn grant_access(
        &self,
        server_identifier: &str,
        email: &str,
        _permissions: &[&str],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_grant {
            return Err(PanelError::Api {
                status: 500,
                message: "subuser create rejected".into(),
            });
        }
        state
            .grants
            .push((server_identifier.to_string(), email.to_string()));
        Ok(())
    }

    fn name(&self) -> &str {
        "panel-mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn spec() -> ServerSpec {
        ServerSpec {
            name: "test".into(),
            memory_mb: 1024,
            disk_mb: 5120,
            cpu_percent: 100,
            egg_id: 1,
            docker_image: "ghcr.io/example/runtime:latest".into(),
            startup: "./start".into(),
            environment: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let panel = MockPanelClient::new();
        panel.seed_account(3, "taken@example.com", "taken");

        let result = panel
            .create_account(&NewAccount {
                email: "taken@example.com".into(),
                username: "taken2".into(),
                first_name: "taken2".into(),
                last_name: "Customer".into(),
                password: "pw".into(),
            })
            .await;
        assert!(matches!(result, Err(PanelError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_allocation_claim_is_exclusive() {
        let panel = MockPanelClient::new();
        panel.seed_allocation(11, "198.51.100.1", 25565);

        let first = panel.create_server(1, 11, &spec()).await.unwrap();
        assert_eq!(first.owner_id, 1);
        assert!(panel.free_allocations(1).await.unwrap().is_empty());

        let second = panel.create_server(2, 11, &spec()).await;
        assert!(matches!(second, Err(PanelError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_lost_account_race_leaves_account_findable() {
        let panel = MockPanelClient::new();
        panel.set_race_next_account_create();

        let result = panel
            .create_account(&NewAccount {
                email: "racer@example.com".into(),
                username: "racer".into(),
                first_name: "racer".into(),
                last_name: "Customer".into(),
                password: "pw".into(),
            })
            .await;
        assert!(matches!(result, Err(PanelError::Conflict(_))));

        let found = panel
            .find_account_by_email("racer@example.com")
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
