//! Stripe Gateway
//!
//! Implements the "hosted checkout" approach: the storefront redirects
//! the customer to Stripe's checkout page, and payment confirmation
//! comes back as a signed webhook or a status pull.
//!
//! The durable provisioning record is persisted as metadata on the
//! session's payment intent: the checkout session's own metadata is
//! create-only in this API generation, while payment-intent metadata
//! accepts key-wise merge updates, which preserves unknown keys
//! without a read-modify-write cycle.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, CheckoutSessionPaymentStatus,
    CheckoutSessionStatus, Client, CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData, CreateCheckoutSessionLineItemsPriceDataProductData,
    Currency, Expandable, PaymentIntent, UpdatePaymentIntent,
};

use crate::error::{BillingError, Result};
use crate::pricing::{BillingCycle, Plan};
use crate::provider::BillingProvider;
use crate::session::{PaymentSession, PaymentStatus};

/// Stripe client wrapper
pub struct StripeGateway {
    client: Client,
    webhook_secret: String,
}

/// What to sell: the handler quotes the price, the gateway charges it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutOrder {
    pub plan: Plan,
    pub cycle: BillingCycle,
    /// Server-recomputed charge, in cents
    pub amount_cents: i64,
    pub server_name: Option<String>,
    pub memory_mb: u32,
    pub game_version: Option<String>,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider session id
    pub id: String,

    /// URL to redirect the customer to
    pub checkout_url: String,
}

impl StripeGateway {
    /// Create a new Stripe gateway
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| BillingError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| BillingError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        Ok(Self::new(&secret_key, &webhook_secret))
    }

    /// Get the webhook secret
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    /// Verify an inbound event's signature and parse it. Fails closed:
    /// any verification error rejects the event before business logic.
    pub fn parse_event(&self, payload: &str, signature: &str) -> Result<stripe::Event> {
        stripe::Webhook::construct_event(payload, signature, &self.webhook_secret)
            .map_err(|e| BillingError::Signature(e.to_string()))
    }

    /// Create a hosted checkout session for a one-time prepaid term.
    ///
    /// The session metadata carries the resource configuration so the
    /// provisioning workflow can rebuild the server spec later.
    pub async fn create_checkout(&self, order: &CheckoutOrder) -> Result<CheckoutSession> {
        let mut params = CreateCheckoutSession::new();
        params.customer_email = order.customer_email.as_deref();
        params.success_url = Some(&order.success_url);
        params.cancel_url = Some(&order.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);

        let mut metadata = HashMap::new();
        metadata.insert("plan".to_string(), order.plan.as_str().to_string());
        metadata.insert("cycle".to_string(), order.cycle.as_str().to_string());
        metadata.insert("memory_mb".to_string(), order.memory_mb.to_string());
        metadata.insert("price_cents".to_string(), order.amount_cents.to_string());
        if let Some(ref name) = order.server_name {
            metadata.insert("server_name".to_string(), name.clone());
        }
        if let Some(ref version) = order.game_version {
            metadata.insert("version".to_string(), version.clone());
        }
        params.metadata = Some(metadata);

        let product_name = format!(
            "Game server - {} ({})",
            order.plan.as_str(),
            order.cycle.as_str()
        );
        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(order.amount_cents),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: product_name,
                    description: Some(format!(
                        "{} MB memory, prepaid {} term",
                        order.memory_mb,
                        order.cycle.as_str()
                    )),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| BillingError::Provider(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| BillingError::Provider("No checkout URL returned".into()))?;

        tracing::info!(session_id = %session.id, "Created checkout session");

        Ok(CheckoutSession {
            id: session.id.to_string(),
            checkout_url,
        })
    }
}

/// Fold a provider session into the domain view. Payment-intent
/// metadata (the durable provisioning record) wins over the
/// creation-time session metadata on key collision.
pub(crate) fn session_from_stripe(session: &StripeCheckoutSession) -> PaymentSession {
    let mut metadata = session.metadata.clone().unwrap_or_default();
    if let Some(Expandable::Object(pi)) = &session.payment_intent {
        for (k, v) in &pi.metadata {
            metadata.insert(k.clone(), v.clone());
        }
    }

    let status = if matches!(session.status, Some(CheckoutSessionStatus::Expired)) {
        PaymentStatus::Failed
    } else {
        match session.payment_status {
            CheckoutSessionPaymentStatus::Paid | CheckoutSessionPaymentStatus::NoPaymentRequired => {
                PaymentStatus::Paid
            }
            CheckoutSessionPaymentStatus::Unpaid => PaymentStatus::Pending,
        }
    };

    PaymentSession {
        id: session.id.to_string(),
        status,
        customer_details_email: session
            .customer_details
            .as_ref()
            .and_then(|d| d.email.clone()),
        customer_email: session.customer_email.clone(),
        metadata,
    }
}

fn map_stripe_error(session_id: &str, e: stripe::StripeError) -> BillingError {
    match e {
        stripe::StripeError::Stripe(ref req) if req.http_status == 404 => {
            BillingError::SessionNotFound(session_id.to_string())
        }
        stripe::StripeError::Timeout => {
            BillingError::Timeout("billing provider request timed out".into())
        }
        other => BillingError::Provider(other.to_string()),
    }
}

#[async_trait]
impl BillingProvider for StripeGateway {
    async fn fetch_session(&self, session_id: &str) -> Result<PaymentSession> {
        let id = session_id
            .parse::<stripe::CheckoutSessionId>()
            .map_err(|e| BillingError::Parse(format!("invalid session id: {e}")))?;

        let session = StripeCheckoutSession::retrieve(&self.client, &id, &["payment_intent"])
            .await
            .map_err(|e| map_stripe_error(session_id, e))?;

        Ok(session_from_stripe(&session))
    }

    async fn merge_metadata(
        &self,
        session_id: &str,
        entries: &HashMap<String, String>,
    ) -> Result<()> {
        let id = session_id
            .parse::<stripe::CheckoutSessionId>()
            .map_err(|e| BillingError::Parse(format!("invalid session id: {e}")))?;

        let session = StripeCheckoutSession::retrieve(&self.client, &id, &[])
            .await
            .map_err(|e| map_stripe_error(session_id, e))?;

        let intent = session.payment_intent.ok_or_else(|| {
            BillingError::Provider("session has no payment intent to persist into".into())
        })?;
        let intent_id = intent.id();

        let mut params = UpdatePaymentIntent::new();
        // Stripe merges metadata key-wise; omitted keys are untouched.
        params.metadata = Some(entries.clone());
        PaymentIntent::update(&self.client, &intent_id, params)
            .await
            .map_err(|e| map_stripe_error(session_id, e))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "stripe"
    }
}
