//! Billing Provider Trait

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::session::PaymentSession;

/// Read/write seam over the billing provider's payment records.
///
/// The provisioning workflow drives everything through this trait:
/// it fetches sessions to inspect payment state and merges keys into
/// their metadata to persist provisioning results.
#[async_trait]
pub trait BillingProvider: Send + Sync {
    /// Fetch a payment session by its provider-issued id.
    /// Fails with [`crate::BillingError::SessionNotFound`] when unknown.
    async fn fetch_session(&self, session_id: &str) -> Result<PaymentSession>;

    /// Merge `entries` into the payment record's metadata map.
    /// Key-wise merge only: keys not named here must survive.
    async fn merge_metadata(
        &self,
        session_id: &str,
        entries: &HashMap<String, String>,
    ) -> Result<()>;

    /// Provider name, for logs.
    fn name(&self) -> &str;
}
