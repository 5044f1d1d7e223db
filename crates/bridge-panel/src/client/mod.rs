//! Panel Client Abstraction
//!
//! [`PanelClient`] is the seam between the provisioning workflow and
//! the panel vendor. Implement it per panel; [`HttpPanelClient`] is
//! the production implementation, [`MockPanelClient`] the test one.

mod http;
mod mock;

pub use http::HttpPanelClient;
pub use mock::MockPanelClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Allocation, NewAccount, PanelAccount, PanelServer, ServerSpec};

/// Resource panel client trait.
#[async_trait]
pub trait PanelClient: Send + Sync {
    /// Look up an account by exact email match.
    async fn find_account_by_email(&self, email: &str) -> Result<Option<PanelAccount>>;

    /// Create an account. Fails with [`crate::PanelError::Conflict`]
    /// when the email is already taken.
    async fn create_account(&self, account: &NewAccount) -> Result<PanelAccount>;

    /// Number of servers currently on the node.
    async fn server_count(&self, node_id: u64) -> Result<u32>;

    /// Unassigned allocations on the node, in panel order.
    async fn free_allocations(&self, node_id: u64) -> Result<Vec<Allocation>>;

    /// Create a server owned by `owner_id` on `allocation_id`.
    /// The allocation claim is the panel's atomic step: a concurrent
    /// claim of the same allocation fails with `Conflict`.
    async fn create_server(
        &self,
        owner_id: u64,
        allocation_id: u64,
        spec: &ServerSpec,
    ) -> Result<PanelServer>;

    /// Owner account id the panel currently reports for a server.
    async fn server_owner(&self, server_id: u64) -> Result<u64>;

    /// Reassign server ownership.
    async fn reassign_owner(&self, server_id: u64, owner_id: u64) -> Result<()>;

    /// Grant an account subuser access to a server.
    async fn grant_access(
        &self,
        server_identifier: &str,
        email: &str,
        permissions: &[&str],
    ) -> Result<()>;

    /// Panel name, for logs.
    fn name(&self) -> &str;
}
