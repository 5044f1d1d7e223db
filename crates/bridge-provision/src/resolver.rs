//! Account Resolver
//!
//! Maps a customer email to exactly one panel account, creating one if
//! absent. Uniqueness is enforced without locks: lookup-first, then
//! one re-query when the create loses a duplicate race.

use std::sync::Arc;

use bridge_panel::{NewAccount, PanelClient};

use crate::credentials::{generate_password, synthesize_username};
use crate::error::{ProvisionError, Result};

/// Outcome of resolving an email to a panel account.
#[derive(Clone, Debug)]
pub struct ResolvedAccount {
    pub account_id: u64,
    pub username: String,
    pub is_new_account: bool,
    /// Present only when the account was created by this call; an
    /// existing account's password is unknown to this system.
    pub generated_password: Option<String>,
}

/// Standard mailbox shape: exactly one `@`, non-empty local part,
/// dotted domain, no whitespace.
pub fn is_valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) || email.matches('@').count() != 1 {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

pub struct AccountResolver {
    panel: Arc<dyn PanelClient>,
}

impl AccountResolver {
    pub fn new(panel: Arc<dyn PanelClient>) -> Self {
        Self { panel }
    }

    /// Resolve `email` to an account, creating at most one panel
    /// account per distinct email across any number of calls.
    pub async fn resolve(&self, email: &str) -> Result<ResolvedAccount> {
        if !is_valid_email(email) {
            return Err(ProvisionError::InvalidInput(format!(
                "not a valid email address: {email}"
            )));
        }

        // The panel enforces email uniqueness; the first match is the
        // deterministic answer.
        if let Some(existing) = self.panel.find_account_by_email(email).await? {
            tracing::debug!(account_id = existing.id, "Resolved existing panel account");
            return Ok(ResolvedAccount {
                account_id: existing.id,
                username: existing.username,
                is_new_account: false,
                generated_password: None,
            });
        }

        let local = email.split('@').next().unwrap_or_default();
        let new_account = NewAccount {
            email: email.to_string(),
            username: synthesize_username(local),
            first_name: synthesize_username(local),
            last_name: "Customer".to_string(),
            password: generate_password(),
        };

        match self.panel.create_account(&new_account).await {
            Ok(created) => {
                tracing::info!(account_id = created.id, "Created panel account for customer");
                Ok(ResolvedAccount {
                    account_id: created.id,
                    username: created.username,
                    is_new_account: true,
                    generated_password: Some(new_account.password),
                })
            }
            Err(e) if e.is_conflict() => {
                // Lost a duplicate race: someone created the account
                // between our lookup and our create. Re-query once.
                tracing::warn!(error = %e, "Account create conflicted, re-querying by email");
                match self.panel.find_account_by_email(email).await? {
                    Some(existing) => Ok(ResolvedAccount {
                        account_id: existing.id,
                        username: existing.username,
                        is_new_account: false,
                        generated_password: None,
                    }),
                    None => Err(ProvisionError::DependencyConflict(e.to_string())),
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_panel::MockPanelClient;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@.leading.dot"));
        assert!(!is_valid_email("spaced user@example.com"));
    }

    #[tokio::test]
    async fn test_invalid_email_rejected_before_any_panel_call() {
        let panel = Arc::new(MockPanelClient::new());
        let resolver = AccountResolver::new(panel.clone());

        let result = resolver.resolve("not-an-email").await;
        assert!(matches!(result, Err(ProvisionError::InvalidInput(_))));
        assert_eq!(panel.account_creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_existing_account_is_reused() {
        let panel = Arc::new(MockPanelClient::new());
        panel.seed_account(7, "known@example.com", "known1234");
        let resolver = AccountResolver::new(panel.clone());

        let resolved = resolver.resolve("known@example.com").await.unwrap();
        assert_eq!(resolved.account_id, 7);
        assert!(!resolved.is_new_account);
        assert!(resolved.generated_password.is_none());
        assert_eq!(panel.account_creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_new_account_created_once() {
        let panel = Arc::new(MockPanelClient::new());
        let resolver = AccountResolver::new(panel.clone());

        let first = resolver.resolve("new@example.com").await.unwrap();
        assert!(first.is_new_account);
        assert!(first.generated_password.is_some());

        let second = resolver.resolve("new@example.com").await.unwrap();
        assert_eq!(second.account_id, first.account_id);
        assert!(!second.is_new_account);
        assert!(second.generated_password.is_none());
        assert_eq!(panel.account_creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lost_create_race_falls_back_to_requery() {
        let panel = Arc::new(MockPanelClient::new());
        panel.set_race_next_account_create();
        let resolver = AccountResolver::new(panel.clone());

        let resolved = resolver.resolve("racer@example.com").await.unwrap();
        assert!(!resolved.is_new_account);
        assert!(resolved.generated_password.is_none());
    }
}
