//! API token management for owners and administrators.

use serde_json::json;
use std::sync::Arc;

use crate::models::{AuditAction, AuditDraft, NewUserToken, TokenFlags, User, UserToken};
use crate::services::{audit_data, ServiceError, Store};

/// Requested changes to an existing token.
#[derive(Debug, Clone, Default)]
pub struct TokenUpdate {
    pub name: Option<String>,
    pub reset_token: bool,
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn Store>,
}

impl TokenService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn list(&self, owner: &User) -> Result<Vec<UserToken>, ServiceError> {
        self.store.list_tokens_by_user(owner.id).await
    }

    /// Create a token for `actor`, or for `for_user` when the actor is an
    /// administrator. API access unless `api_access` is `Some(false)`.
    pub async fn create(
        &self,
        actor: &User,
        name: String,
        for_user: Option<i64>,
        api_access: Option<bool>,
    ) -> Result<UserToken, ServiceError> {
        let owner_id = match for_user {
            Some(_) if !actor.is_admin() => {
                return Err(ServiceError::Forbidden(
                    "Cannot create tokens for another user".to_string(),
                ))
            }
            Some(user_id) => self
                .store
                .get_user(user_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Unknown user".to_string()))?
                .id,
            None => actor.id,
        };

        let flags = TokenFlags::for_new_token(api_access.unwrap_or(true));
        let audit = AuditDraft::new(
            AuditAction::TokenCreate,
            actor,
            audit_data([
                ("owner_id", json!(owner_id)),
                ("api", json!(flags.has_api_access())),
            ]),
        )
        .with_row_id("token_id");

        self.store
            .create_token(
                NewUserToken {
                    user_id: owner_id,
                    name,
                    token: UserToken::generate_secret()?,
                    flags,
                },
                Some(audit),
            )
            .await
    }

    /// Token `id` if `actor` may manage it. Tokens of other users look
    /// exactly like missing ones.
    pub async fn get_managed(&self, actor: &User, id: i64) -> Result<UserToken, ServiceError> {
        self.store
            .get_token(id)
            .await?
            .filter(|token| token.user_id == actor.id || actor.is_admin())
            .ok_or_else(|| ServiceError::NotFound("Not Found".to_string()))
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        update: TokenUpdate,
    ) -> Result<UserToken, ServiceError> {
        let mut token = self.get_managed(actor, id).await?;
        if let Some(name) = update.name {
            token.name = name;
        }
        if update.reset_token {
            token.token = UserToken::generate_secret()?;
        }

        // Renames alone are not audited
        let audit = update.reset_token.then(|| {
            AuditDraft::new(
                AuditAction::TokenReset,
                actor,
                audit_data([("token_id", json!(token.id))]),
            )
        });
        self.store.update_token(&token, audit).await
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ServiceError> {
        let token = self.get_managed(actor, id).await?;
        let audit = AuditDraft::new(
            AuditAction::TokenDelete,
            actor,
            audit_data([
                ("token_id", json!(token.id)),
                ("owner_id", json!(token.user_id)),
            ]),
        );
        if !self.store.delete_token(token.id, Some(audit)).await? {
            return Err(ServiceError::NotFound("Not Found".to_string()));
        }
        Ok(())
    }
}
