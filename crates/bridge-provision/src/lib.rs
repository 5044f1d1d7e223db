//! # bridge-provision
//!
//! The idempotent provisioning workflow: drive the external panel from
//! "payment confirmed" to "instance ready", exactly once per payment
//! session, tolerating partial failure at every step.
//!
//! ```text
//! payment confirmed (webhook or pull)
//!        │
//!        ▼
//! ┌──────────────┐  Ready record?   ┌─────────────────────────┐
//! │ Orchestrator │─────────────────▶│ return prior record     │
//! └──────┬───────┘   (short-circuit)└─────────────────────────┘
//!        │ capacity gate → account resolver → allocation
//!        ▼
//!   create instance → verify owner → persist record
//! ```
//!
//! Correctness leans on three things, none of which are locks:
//!
//! - the short-circuit in [`Orchestrator::provision`] (a `Ready`
//!   record is returned verbatim, nothing re-runs);
//! - the panel's email uniqueness, honored by the lookup-first,
//!   re-query-on-conflict sequence in [`AccountResolver`];
//! - the panel's atomic allocation claim inside instance creation,
//!   which is the real mutual-exclusion point between racing attempts.

mod capacity;
mod credentials;
mod error;
mod orchestrator;
mod record;
mod resolver;
mod store;

pub use capacity::CapacityGate;
pub use credentials::{PASSWORD_LENGTH, generate_password, synthesize_username};
pub use error::{ProvisionError, Result};
pub use orchestrator::{Orchestrator, ProvisionSettings};
pub use record::{Credentials, ProvisioningRecord, ProvisioningState};
pub use resolver::{AccountResolver, ResolvedAccount, is_valid_email};
pub use store::ReconciliationStore;
