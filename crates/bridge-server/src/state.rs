//! Application State

use std::sync::Arc;

use bridge_billing::{BillingProvider, StripeGateway};
use bridge_provision::Orchestrator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Stripe-specific surface: checkout creation, webhook parsing
    pub gateway: Arc<StripeGateway>,

    /// Provider-agnostic billing reads
    pub billing: Arc<dyn BillingProvider>,

    /// The payment-to-panel workflow
    pub orchestrator: Arc<Orchestrator>,
}
