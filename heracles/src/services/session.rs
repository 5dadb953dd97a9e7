//! Interactive logins and secret issuance.

use serde_json::json;
use std::sync::Arc;

use crate::models::{AuditAction, AuditDraft, User};
use crate::services::{audit_data, AuditRecorder, PasswordHasher, SecretCodec, ServiceError, Store};
use crate::utils::Password;

/// A signed secret handed to a freshly authenticated user.
#[derive(Debug, Clone)]
pub struct IssuedSecret {
    pub user: User,
    /// Transport form (unpadded base64url), as set in the cookie.
    pub secret: String,
}

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn Store>,
    codec: SecretCodec,
    hasher: PasswordHasher,
    audit: AuditRecorder,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn Store>,
        codec: SecretCodec,
        hasher: PasswordHasher,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            store,
            codec,
            hasher,
            audit,
        }
    }

    /// Password login. Unknown usernames and wrong passwords fail the same way.
    pub async fn password_login(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<IssuedSecret, ServiceError> {
        let user = self.store.get_user_by_username(username).await?;
        if !self.hasher.verify_user(user.as_ref(), password).await? {
            tracing::info!(username = %username, "Password login rejected");
            return Err(ServiceError::Unauthenticated);
        }
        let Some(user) = user else {
            return Err(ServiceError::Unauthenticated);
        };

        self.issue(
            user,
            AuditAction::SelfLogin,
            audit_data([("method", json!("password"))]),
        )
        .await
    }

    /// Hand the current user a fresh copy of their secret.
    pub async fn reissue(&self, user: User) -> Result<IssuedSecret, ServiceError> {
        self.issue(user, AuditAction::SecretReissue, Default::default())
            .await
    }

    /// Sign the user's id and record the login. No secret is returned when
    /// the audit entry cannot be written.
    pub async fn issue(
        &self,
        user: User,
        action: AuditAction,
        data: crate::models::AuditData,
    ) -> Result<IssuedSecret, ServiceError> {
        self.audit.record(action, &user, data).await?;
        let secret = self.codec.encode(user.id);
        tracing::info!(user_id = user.id, action = action.as_str(), "Auth secret issued");
        Ok(IssuedSecret { user, secret })
    }

    pub async fn update_password(
        &self,
        user: &User,
        password: Password,
    ) -> Result<(), ServiceError> {
        if password.is_empty() {
            return Err(ServiceError::BadRequest(
                "Password must not be empty".to_string(),
            ));
        }
        let hash = self.hasher.hash(password).await?;
        let audit = AuditDraft::new(AuditAction::PasswordUpdate, user, Default::default());
        self.store.update_password(user.id, &hash, Some(audit)).await
    }
}
