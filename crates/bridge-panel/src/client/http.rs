//! HTTP Panel Client
//!
//! Talks to a Pterodactyl-style panel: the application API for
//! accounts, allocations, and servers, and the client API for
//! subuser access grants. Responses arrive in fractal envelopes
//! (`{ "data": [ { "attributes": ... } ] }`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::json;

use super::PanelClient;
use crate::error::{PanelError, Result};
use crate::model::{Allocation, NewAccount, PanelAccount, PanelServer, ServerSpec};

/// Production panel client over HTTP.
///
/// Every request carries the configured timeout; a timeout surfaces
/// as [`PanelError::Timeout`] and is safe to retry from the caller.
pub struct HttpPanelClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Fractal<T> {
    attributes: T,
}

#[derive(Deserialize)]
struct FractalList<T> {
    data: Vec<Fractal<T>>,
    #[serde(default)]
    meta: Option<ListMeta>,
}

#[derive(Deserialize)]
struct ListMeta {
    pagination: Pagination,
}

#[derive(Deserialize)]
struct Pagination {
    total: u32,
}

#[derive(Deserialize)]
struct UserAttributes {
    id: u64,
    email: String,
    username: String,
}

#[derive(Deserialize)]
struct AllocationAttributes {
    id: u64,
    ip: String,
    port: u16,
    assigned: bool,
}

#[derive(Deserialize)]
struct ServerAttributes {
    id: u64,
    identifier: String,
    /// Owner account id; the panel calls this field `user`
    user: u64,
    name: String,
}

impl HttpPanelClient {
    /// Create a client for `base_url` (no trailing slash) using the
    /// given API key and per-request timeout.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| PanelError::Config(format!("invalid API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| PanelError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn app_url(&self, path: &str) -> String {
        format!("{}/api/application{path}", self.base_url)
    }

    fn client_url(&self, path: &str) -> String {
        format!("{}/api/client{path}", self.base_url)
    }

    /// Map non-success statuses into the error taxonomy before the
    /// caller tries to deserialize a body.
    async fn check(&self, resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => PanelError::NotFound(message),
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                PanelError::Conflict(message)
            }
            _ => PanelError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn fetch_server(&self, server_id: u64) -> Result<ServerAttributes> {
        let resp = self
            .http
            .get(self.app_url(&format!("/servers/{server_id}")))
            .send()
            .await?;
        let body: Fractal<ServerAttributes> = self.check(resp).await?.json().await?;
        Ok(body.attributes)
    }
}

#[async_trait]
impl PanelClient for HttpPanelClient {
    async fn find_account_by_email(&self, email: &str) -> Result<Option<PanelAccount>> {
        let resp = self
            .http
            .get(self.app_url("/users"))
            .query(&[("filter[email]", email)])
            .send()
            .await?;
        let body: FractalList<UserAttributes> = self.check(resp).await?.json().await?;

        // The filter can match loosely on some panel versions; insist
        // on an exact email before trusting the hit.
        Ok(body
            .data
            .into_iter()
            .map(|u| u.attributes)
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(|u| PanelAccount {
                id: u.id,
                email: u.email,
                username: u.username,
            }))
    }

    async fn create_account(&self, account: &NewAccount) -> Result<PanelAccount> {
        let resp = self
            .http
            .post(self.app_url("/users"))
            .json(&json!({
                "email": account.email,
                "username": account.username,
                "first_name": account.first_name,
                "last_name": account.last_name,
                "password": account.password,
            }))
            .send()
            .await?;
        let body: Fractal<UserAttributes> = self.check(resp).await?.json().await?;

        tracing::info!(account_id = body.attributes.id, "Created panel account");

        Ok(PanelAccount {
            id: body.attributes.id,
            email: body.attributes.email,
            username: body.attributes.username,
        })
    }

    async fn server_count(&self, _node_id: u64) -> Result<u32> {
        // One-item page; the pagination meta carries the fleet total.
        let resp = self
            .http
            .get(self.app_url("/servers"))
            .query(&[("per_page", "1")])
            .send()
            .await?;
        let body: FractalList<ServerAttributes> = self.check(resp).await?.json().await?;
        Ok(body
            .meta
            .map(|m| m.pagination.total)
            .unwrap_or(body.data.len() as u32))
    }

    async fn free_allocations(&self, node_id: u64) -> Result<Vec<Allocation>> {
        let resp = self
            .http
            .get(self.app_url(&format!("/nodes/{node_id}/allocations")))
            .query(&[("per_page", "200")])
            .send()
            .await?;
        let body: FractalList<AllocationAttributes> = self.check(resp).await?.json().await?;

        Ok(body
            .data
            .into_iter()
            .map(|a| a.attributes)
            .filter(|a| !a.assigned)
            .map(|a| Allocation {
                id: a.id,
                ip: a.ip,
                port: a.port,
                assigned: a.assigned,
            })
            .collect())
    }

    async fn create_server(
        &self,
        owner_id: u64,
        allocation_id: u64,
        spec: &ServerSpec,
    ) -> Result<PanelServer> {
        let resp = self
            .http
            .post(self.app_url("/servers"))
            .json(&json!({
                "name": spec.name,
                "user": owner_id,
                "egg": spec.egg_id,
                "docker_image": spec.docker_image,
                "startup": spec.startup,
                "environment": spec.environment,
                "limits": {
                    "memory": spec.memory_mb,
                    "swap": 0,
                    "disk": spec.disk_mb,
                    "io": 500,
                    "cpu": spec.cpu_percent,
                },
                "feature_limits": {
                    "databases": 0,
                    "backups": 1,
                    "allocations": 1,
                },
                "allocation": {
                    "default": allocation_id,
                },
            }))
            .send()
            .await?;
        let body: Fractal<ServerAttributes> = self.check(resp).await?.json().await?;

        tracing::info!(
            server_id = body.attributes.id,
            identifier = %body.attributes.identifier,
            "Created panel server"
        );

        Ok(PanelServer {
            id: body.attributes.id,
            identifier: body.attributes.identifier,
            owner_id: body.attributes.user,
        })
    }

    async fn server_owner(&self, server_id: u64) -> Result<u64> {
        Ok(self.fetch_server(server_id).await?.user)
    }

    async fn reassign_owner(&self, server_id: u64, owner_id: u64) -> Result<()> {
        // The details endpoint requires the current name alongside the
        // new owner, so read before writing.
        let current = self.fetch_server(server_id).await?;
        let resp = self
            .http
            .patch(self.app_url(&format!("/servers/{server_id}/details")))
            .json(&json!({
                "name": current.name,
                "user": owner_id,
            }))
            .send()
            .await?;
        self.check(resp).await?;
        Ok(())
    }

    async fn grant_access(
        &self,
        server_identifier: &str,
        email: &str,
        permissions: &[&str],
    ) -> Result<()> {
        let resp = self
            .http
            .post(self.client_url(&format!("/servers/{server_identifier}/users")))
            .json(&json!({
                "email": email,
                "permissions": permissions,
            }))
            .send()
            .await?;
        self.check(resp).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "panel-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractal_list_deserialization() {
        let raw = r#"{
            "object": "list",
            "data": [
                {"object": "allocation", "attributes": {"id": 5, "ip": "198.51.100.4", "port": 25565, "assigned": false}},
                {"object": "allocation", "attributes": {"id": 6, "ip": "198.51.100.4", "port": 25566, "assigned": true}}
            ],
            "meta": {"pagination": {"total": 2}}
        }"#;
        let list: FractalList<AllocationAttributes> = serde_json::from_str(raw).unwrap();
        assert_eq!(list.data.len(), 2);
        assert_eq!(list.data[0].attributes.id, 5);
        assert!(list.data[1].attributes.assigned);
        assert_eq!(list.meta.unwrap().pagination.total, 2);
    }

    #[test]
    fn test_server_attributes_deserialization() {
        let raw = r#"{
            "object": "server",
            "attributes": {"id": 42, "identifier": "a1b2c3d4", "user": 9, "name": "lobby", "node": 1}
        }"#;
        let server: Fractal<ServerAttributes> = serde_json::from_str(raw).unwrap();
        assert_eq!(server.attributes.id, 42);
        assert_eq!(server.attributes.user, 9);
    }

    #[test]
    fn test_trailing_slash_stripped_from_base_url() {
        let client =
            HttpPanelClient::new("https://panel.example.com/", "key", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            client.app_url("/users"),
            "https://panel.example.com/api/application/users"
        );
        assert_eq!(
            client.client_url("/servers/abc/users"),
            "https://panel.example.com/api/client/servers/abc/users"
        );
    }
}
