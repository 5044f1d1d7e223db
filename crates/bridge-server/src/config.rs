//! Server Configuration
//!
//! All settings come from the environment. Required variables are
//! validated together at startup so one restart surfaces every
//! missing value, not just the first.

use std::time::Duration;

use anyhow::bail;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_PANEL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DOCKER_IMAGE: &str = "ghcr.io/pterodactyl/yolks:java_21";
const DEFAULT_STARTUP: &str = "java -Xms128M -Xmx{{SERVER_MEMORY}}M -jar {{SERVER_JARFILE}}";

/// Resource floors applied to every provisioned instance.
pub const MIN_MEMORY_MB: u32 = 1024;
pub const DISK_MB: u32 = 5120;
pub const CPU_PERCENT: u32 = 100;

#[derive(Clone, Debug)]
pub struct Config {
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub panel_base_url: String,
    pub panel_api_key: String,
    pub panel_node_id: u64,
    pub panel_egg_id: u64,
    pub node_server_limit: u32,
    /// Single origin allowed by CORS (the storefront)
    pub frontend_origin: String,
    pub bind_addr: String,
    pub panel_timeout: Duration,
    pub docker_image: String,
    pub startup: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut problems = Vec::new();

        let mut required = |name: &str| match get(name) {
            Some(v) if !v.trim().is_empty() => v,
            _ => {
                problems.push(format!("{name} is not set"));
                String::new()
            }
        };

        let stripe_secret_key = required("STRIPE_SECRET_KEY");
        let stripe_webhook_secret = required("STRIPE_WEBHOOK_SECRET");
        let panel_base_url = required("PANEL_BASE_URL");
        let panel_api_key = required("PANEL_API_KEY");
        let node_id_raw = required("PANEL_NODE_ID");
        let egg_id_raw = required("PANEL_EGG_ID");
        let limit_raw = required("NODE_SERVER_LIMIT");
        let frontend_origin = required("FRONTEND_ORIGIN");

        let panel_node_id = parse_or(&node_id_raw, "PANEL_NODE_ID", &mut problems);
        let panel_egg_id = parse_or(&egg_id_raw, "PANEL_EGG_ID", &mut problems);
        let node_server_limit: u32 = parse_or(&limit_raw, "NODE_SERVER_LIMIT", &mut problems);

        if !problems.is_empty() {
            bail!("configuration invalid:\n  {}", problems.join("\n  "));
        }

        let panel_timeout_secs = get("PANEL_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PANEL_TIMEOUT_SECS);

        Ok(Self {
            stripe_secret_key,
            stripe_webhook_secret,
            panel_base_url,
            panel_api_key,
            panel_node_id,
            panel_egg_id,
            node_server_limit,
            frontend_origin,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            panel_timeout: Duration::from_secs(panel_timeout_secs),
            docker_image: get("DEFAULT_DOCKER_IMAGE").unwrap_or_else(|| DEFAULT_DOCKER_IMAGE.into()),
            startup: get("DEFAULT_STARTUP").unwrap_or_else(|| DEFAULT_STARTUP.into()),
        })
    }
}

fn parse_or<T: std::str::FromStr + Default>(
    raw: &str,
    name: &str,
    problems: &mut Vec<String>,
) -> T {
    if raw.is_empty() {
        // Already reported as missing.
        return T::default();
    }
    match raw.parse() {
        Ok(v) => v,
        Err(_) => {
            problems.push(format!("{name} is not a valid number: {raw}"));
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn complete_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("STRIPE_SECRET_KEY", "sk_test_x"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_x"),
            ("PANEL_BASE_URL", "https://panel.example.com"),
            ("PANEL_API_KEY", "ptla_x"),
            ("PANEL_NODE_ID", "1"),
            ("PANEL_EGG_ID", "5"),
            ("NODE_SERVER_LIMIT", "25"),
            ("FRONTEND_ORIGIN", "https://shop.example.com"),
        ])
    }

    fn lookup<'a>(env: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| env.get(name).map(ToString::to_string)
    }

    #[test]
    fn test_complete_environment_loads_with_defaults() {
        let env = complete_env();
        let config = Config::from_lookup(lookup(&env)).unwrap();
        assert_eq!(config.panel_node_id, 1);
        assert_eq!(config.node_server_limit, 25);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.panel_timeout, Duration::from_secs(30));
        assert_eq!(config.docker_image, DEFAULT_DOCKER_IMAGE);
    }

    #[test]
    fn test_every_missing_variable_is_reported_at_once() {
        let mut env = complete_env();
        env.remove("STRIPE_SECRET_KEY");
        env.remove("PANEL_API_KEY");
        env.remove("FRONTEND_ORIGIN");

        let err = Config::from_lookup(lookup(&env)).unwrap_err().to_string();
        assert!(err.contains("STRIPE_SECRET_KEY"));
        assert!(err.contains("PANEL_API_KEY"));
        assert!(err.contains("FRONTEND_ORIGIN"));
    }

    #[test]
    fn test_non_numeric_ids_are_rejected() {
        let mut env = complete_env();
        env.insert("PANEL_NODE_ID", "main-node");

        let err = Config::from_lookup(lookup(&env)).unwrap_err().to_string();
        assert!(err.contains("PANEL_NODE_ID"));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = complete_env();
        env.insert("PANEL_BASE_URL", "   ");

        let err = Config::from_lookup(lookup(&env)).unwrap_err().to_string();
        assert!(err.contains("PANEL_BASE_URL"));
    }

    #[test]
    fn test_optional_overrides_apply() {
        let mut env = complete_env();
        env.insert("BIND_ADDR", "127.0.0.1:8080");
        env.insert("PANEL_TIMEOUT_SECS", "10");

        let config = Config::from_lookup(lookup(&env)).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.panel_timeout, Duration::from_secs(10));
    }
}
