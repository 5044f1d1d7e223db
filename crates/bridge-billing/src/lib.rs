//! # bridge-billing
//!
//! Billing provider interface for host-bridge.
//!
//! The hosted-checkout flow:
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │  Storefront │────▶│  Stripe Hosted  │────▶│  Storefront │
//! │  (configure)│     │  Checkout Page  │     │  (status)   │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//!                             │
//!                             ▼ webhook / pull
//!                     provisioning workflow
//! ```
//!
//! This crate owns three things:
//!
//! - the [`PaymentSession`] domain view of a checkout attempt, with a
//!   merge-only metadata map (unknown keys are always preserved);
//! - the [`BillingProvider`] seam the provisioning workflow reads and
//!   writes through, with a Stripe-backed [`StripeGateway`] and an
//!   in-memory [`MockBillingProvider`];
//! - plan/cycle pricing, recomputed server-side so a tampered
//!   client-supplied price never reaches the charge.

mod error;
mod event;
mod gateway;
mod mock;
mod pricing;
mod provider;
mod session;

pub use error::{BillingError, Result};
pub use event::BillingEvent;
pub use gateway::{CheckoutOrder, CheckoutSession, StripeGateway};
pub use mock::MockBillingProvider;
pub use pricing::{BillingCycle, PRICE_TOLERANCE_CENTS, Plan, quote_cents};
pub use provider::BillingProvider;
pub use session::{PaymentSession, PaymentStatus};
