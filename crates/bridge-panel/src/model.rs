//! Panel Domain Models

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An identity on the panel that owns or accesses servers.
/// The panel enforces email uniqueness; this crate only relies on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelAccount {
    pub id: u64,
    pub email: String,
    pub username: String,
}

/// Payload for creating a panel account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// A network endpoint (host + port) in a node's inventory,
/// claimable by exactly one server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: u64,
    pub ip: String,
    pub port: u16,
    pub assigned: bool,
}

impl Allocation {
    /// `host:port` form used as the instance address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// What to build: resource sizing plus runtime selection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerSpec {
    pub name: String,
    pub memory_mb: u32,
    pub disk_mb: u32,
    pub cpu_percent: u32,
    pub egg_id: u64,
    pub docker_image: String,
    pub startup: String,
    pub environment: HashMap<String, String>,
}

/// A provisioned server as reported by the panel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelServer {
    /// Numeric id used by the application API
    pub id: u64,
    /// Short identifier used by the client API (console, subusers)
    pub identifier: String,
    /// Account id the panel recorded as owner
    pub owner_id: u64,
}

/// Permission set granted when ownership reassignment fails and we
/// fall back to subuser access: console, power, files, backups.
pub const SUBUSER_PERMISSIONS: &[&str] = &[
    "control.console",
    "control.start",
    "control.stop",
    "control.restart",
    "file.create",
    "file.read",
    "file.update",
    "file.delete",
    "file.archive",
    "backup.create",
    "backup.read",
    "backup.download",
    "backup.restore",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_address() {
        let alloc = Allocation {
            id: 7,
            ip: "203.0.113.10".into(),
            port: 25565,
            assigned: false,
        };
        assert_eq!(alloc.address(), "203.0.113.10:25565");
    }

    #[test]
    fn test_permission_set_covers_required_areas() {
        for prefix in ["control.", "file.", "backup."] {
            assert!(
                SUBUSER_PERMISSIONS.iter().any(|p| p.starts_with(prefix)),
                "missing {prefix} permissions"
            );
        }
    }
}
