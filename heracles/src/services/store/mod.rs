//! Persistence contract for users, tokens, realms, grants and the audit log.
//!
//! Every request reads through this trait with no cache in front of it, so
//! grant changes made out of band take effect on the next request.
//!
//! Mutations take an optional [`AuditDraft`]. When one is given the store
//! writes the change and its audit entry together: if the entry cannot be
//! appended, the change is not persisted either.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use crate::models::{
    AuditDraft, AuditLogEntry, ExternalProvider, NewAuditLogEntry, NewUser, NewUserToken, Realm,
    User, UserRealmGrant, UserToken,
};
use crate::services::ServiceError;
use crate::utils::PasswordHashString;

#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), ServiceError>;

    // Users

    async fn get_user(&self, id: i64) -> Result<Option<User>, ServiceError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError>;
    async fn get_user_by_external_id(
        &self,
        provider: ExternalProvider,
        external_id: &str,
    ) -> Result<Option<User>, ServiceError>;
    /// Owner of the token whose secret equals `token`. With `requires_api`
    /// set, tokens lacking the API capability never match.
    async fn get_user_by_token(
        &self,
        token: &str,
        requires_api: bool,
    ) -> Result<Option<User>, ServiceError>;
    async fn list_users(&self) -> Result<Vec<User>, ServiceError>;
    async fn count_users(&self) -> Result<i64, ServiceError>;
    /// Fails with `Conflict` on a taken username or external id and with
    /// `BadRequest` on a blank username.
    async fn create_user(
        &self,
        user: NewUser,
        audit: Option<AuditDraft>,
    ) -> Result<User, ServiceError>;
    async fn update_password(
        &self,
        user_id: i64,
        password_hash: &PasswordHashString,
        audit: Option<AuditDraft>,
    ) -> Result<(), ServiceError>;

    // Tokens

    /// Fails with `Conflict` on a colliding secret.
    async fn create_token(
        &self,
        token: NewUserToken,
        audit: Option<AuditDraft>,
    ) -> Result<UserToken, ServiceError>;
    async fn get_token(&self, id: i64) -> Result<Option<UserToken>, ServiceError>;
    async fn list_tokens_by_user(&self, user_id: i64) -> Result<Vec<UserToken>, ServiceError>;
    /// Persist name, secret and flags of an existing token.
    async fn update_token(
        &self,
        token: &UserToken,
        audit: Option<AuditDraft>,
    ) -> Result<UserToken, ServiceError>;
    /// Returns whether a token was removed. Nothing is audited when it
    /// did not exist.
    async fn delete_token(&self, id: i64, audit: Option<AuditDraft>)
        -> Result<bool, ServiceError>;

    // Realms and grants

    /// Fails with `Conflict` on a taken name.
    async fn create_realm(
        &self,
        name: &str,
        audit: Option<AuditDraft>,
    ) -> Result<Realm, ServiceError>;
    async fn get_realm(&self, id: i64) -> Result<Option<Realm>, ServiceError>;
    async fn get_realm_by_name(&self, name: &str) -> Result<Option<Realm>, ServiceError>;
    async fn list_realms(&self) -> Result<Vec<Realm>, ServiceError>;
    /// Fails with `Conflict` when the pair already has a grant.
    async fn create_grant(
        &self,
        user_id: i64,
        realm_id: i64,
        alias: Option<&str>,
        audit: Option<AuditDraft>,
    ) -> Result<UserRealmGrant, ServiceError>;
    async fn get_grant_by_realm_name(
        &self,
        user_id: i64,
        realm_name: &str,
    ) -> Result<Option<UserRealmGrant>, ServiceError>;
    async fn list_grants_by_realm(&self, realm_id: i64)
        -> Result<Vec<UserRealmGrant>, ServiceError>;
    /// Replace the alias; `None` (and no audit entry) when no such grant
    /// exists.
    async fn update_grant_alias(
        &self,
        user_id: i64,
        realm_id: i64,
        alias: Option<&str>,
        audit: Option<AuditDraft>,
    ) -> Result<Option<UserRealmGrant>, ServiceError>;

    // Audit log

    async fn create_audit_entry(
        &self,
        entry: NewAuditLogEntry,
    ) -> Result<AuditLogEntry, ServiceError>;
    /// Newest first, by creation time then id.
    async fn list_recent_audit_entries(
        &self,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, ServiceError>;
}
