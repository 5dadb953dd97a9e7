//! Login through an external identity provider.
//!
//! The OAuth exchange happens elsewhere; this only maps a provider-issued
//! id to a local account and issues the usual secret.

use serde_json::json;
use std::sync::Arc;

use crate::models::{AuditAction, AuditDraft, ExternalProvider, NewUser};
use crate::services::{audit_data, IssuedSecret, ServiceError, SessionService, Store};

/// Which providers may create accounts on first login.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AutoProvision {
    pub discord: bool,
    pub github: bool,
}

impl AutoProvision {
    pub fn allows(&self, provider: ExternalProvider) -> bool {
        match provider {
            ExternalProvider::Discord => self.discord,
            ExternalProvider::Github => self.github,
        }
    }
}

#[derive(Clone)]
pub struct FederatedLogin {
    store: Arc<dyn Store>,
    sessions: SessionService,
    auto_provision: AutoProvision,
}

impl FederatedLogin {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: SessionService,
        auto_provision: AutoProvision,
    ) -> Self {
        Self {
            store,
            sessions,
            auto_provision,
        }
    }

    /// Find the local account linked to `external_id`, creating one named
    /// `display_name` when the provider auto-provisions. A blank display
    /// name cannot provision an account.
    ///
    /// Entry point for the OAuth callback once the provider has vouched for
    /// `external_id`.
    pub async fn login(
        &self,
        provider: ExternalProvider,
        external_id: &str,
        display_name: &str,
    ) -> Result<IssuedSecret, ServiceError> {
        if external_id.is_empty() {
            return Err(ServiceError::Unauthenticated);
        }

        let user = match self
            .store
            .get_user_by_external_id(provider, external_id)
            .await?
        {
            Some(user) => user,
            None if self.auto_provision.allows(provider) => {
                let username = display_name.trim();
                if username.is_empty() {
                    return Err(ServiceError::BadRequest("username is required".to_string()));
                }
                let audit = AuditDraft::by_created_user(
                    AuditAction::UserCreate,
                    audit_data([
                        ("username", json!(username)),
                        (provider.as_str(), json!(external_id)),
                    ]),
                );
                let user = self
                    .store
                    .create_user(
                        NewUser::new(username).with_external_id(provider, external_id.to_string()),
                        Some(audit),
                    )
                    .await?;
                tracing::info!(
                    user_id = user.id,
                    provider = provider.as_str(),
                    "Provisioned user from external identity"
                );
                user
            }
            None => {
                tracing::info!(provider = provider.as_str(), "No linked account for external identity");
                return Err(ServiceError::Unauthenticated);
            }
        };

        self.sessions
            .issue(
                user,
                AuditAction::SelfLogin,
                audit_data([(provider.as_str(), json!(external_id))]),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{AuditRecorder, MemoryStore, PasswordHasher, SecretCodec};
    use crate::utils::HashCost;
    use secrecy::SecretString;

    fn federation(store: Arc<MemoryStore>, auto_provision: AutoProvision) -> FederatedLogin {
        let codec =
            SecretCodec::new(&SecretString::new("federation-test-key-0123456789abc".into()))
                .unwrap();
        let sessions = SessionService::new(
            store.clone(),
            codec,
            PasswordHasher::new(HashCost::MINIMAL).unwrap(),
            AuditRecorder::new(store.clone()),
        );
        FederatedLogin::new(store, sessions, auto_provision)
    }

    #[tokio::test]
    async fn test_auto_provision_then_reuse() {
        let store = Arc::new(MemoryStore::new());
        let login = federation(
            store.clone(),
            AutoProvision {
                discord: true,
                github: false,
            },
        );

        let first = login
            .login(ExternalProvider::Discord, "80351110224678912", "andrei")
            .await
            .unwrap();
        let second = login
            .login(ExternalProvider::Discord, "80351110224678912", "renamed")
            .await
            .unwrap();

        assert_eq!(first.user.id, second.user.id);
        assert_eq!(second.user.username, "andrei");
        assert!(second.user.password_hash.is_none());
        assert!(!second.user.is_admin());

        let log = store.list_recent_audit_entries(10).await.unwrap();
        let actions: Vec<&str> = log.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(
            actions,
            vec!["user.self_login", "user.self_login", "user.create"]
        );
        assert_eq!(log[0].data.0["discord"], "80351110224678912");
        assert_eq!(log[2].user_id, first.user.id);
        assert_eq!(log[2].data.0["user_id"], first.user.id);
    }

    #[tokio::test]
    async fn test_unknown_identity_without_provisioning() {
        let store = Arc::new(MemoryStore::new());
        let login = federation(store.clone(), AutoProvision::default());

        let err = login
            .login(ExternalProvider::Github, "583231", "octocat")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated));
        assert_eq!(store.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_blank_display_name_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let login = federation(
            store.clone(),
            AutoProvision {
                discord: false,
                github: true,
            },
        );

        for name in ["", "   "] {
            let err = login
                .login(ExternalProvider::Github, "583231", name)
                .await
                .unwrap_err();
            assert!(matches!(err, ServiceError::BadRequest(_)));
        }
        assert_eq!(store.count_users().await.unwrap(), 0);

        let issued = login
            .login(ExternalProvider::Github, "583231", "  octocat ")
            .await
            .unwrap();
        assert_eq!(issued.user.username, "octocat");
    }
}
