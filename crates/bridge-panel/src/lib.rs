//! # bridge-panel
//!
//! Client for the hosting resource panel: the account directory,
//! node allocation inventory, and server lifecycle API.
//!
//! The panel is an external collaborator. Everything here is specified
//! at its interface: [`PanelClient`] is the seam, [`HttpPanelClient`]
//! talks to a Pterodactyl-style application API over HTTP, and
//! [`MockPanelClient`] backs tests and demos with an in-memory panel.
//!
//! The panel, not this crate, is the source of truth for account
//! uniqueness (one account per email) and for allocation claims (the
//! `assigned` flag flips atomically when a server takes an endpoint).

pub mod client;
pub mod error;
pub mod model;

pub use client::{HttpPanelClient, MockPanelClient, PanelClient};
pub use error::{PanelError, Result};
pub use model::{
    Allocation, NewAccount, PanelAccount, PanelServer, ServerSpec, SUBUSER_PERMISSIONS,
};
