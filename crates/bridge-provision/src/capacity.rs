//! Capacity Gate
//!
//! Refuses to start provisioning work on a node that is already at its
//! configured server ceiling. The check reads live panel state so that
//! manual deletions free capacity without any bookkeeping here.

use std::sync::Arc;

use bridge_panel::PanelClient;

use crate::error::{ProvisionError, Result};

pub struct CapacityGate {
    panel: Arc<dyn PanelClient>,
    max_servers: u32,
}

impl CapacityGate {
    pub fn new(panel: Arc<dyn PanelClient>, max_servers: u32) -> Self {
        Self { panel, max_servers }
    }

    /// Permit provisioning only while the node's server count is below
    /// the ceiling. Best-effort: concurrent flows may both pass and
    /// overshoot by a small margin, which the allocation claim bounds.
    pub async fn check(&self, node_id: u64) -> Result<()> {
        let current = self.panel.server_count(node_id).await?;
        if current >= self.max_servers {
            tracing::warn!(
                node_id,
                current,
                max = self.max_servers,
                "Node at capacity, refusing provisioning"
            );
            return Err(ProvisionError::CapacityExceeded {
                current,
                max: self.max_servers,
            });
        }
        tracing::debug!(node_id, current, max = self.max_servers, "Capacity check passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_panel::MockPanelClient;

    #[tokio::test]
    async fn test_below_ceiling_passes() {
        let panel = Arc::new(MockPanelClient::new());
        panel.set_baseline_servers(3);
        let gate = CapacityGate::new(panel, 5);
        assert!(gate.check(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_at_ceiling_refuses() {
        let panel = Arc::new(MockPanelClient::new());
        panel.set_baseline_servers(5);
        let gate = CapacityGate::new(panel, 5);
        let err = gate.check(1).await.unwrap_err();
        assert!(matches!(
            err,
            ProvisionError::CapacityExceeded { current: 5, max: 5 }
        ));
        assert!(!err.is_retryable());
    }
}
