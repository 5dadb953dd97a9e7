use serde_json::json;
use std::sync::Arc;

use crate::models::{AuditAction, AuditDraft, NewUser, Realm, User, UserFlags, UserRealmGrant};
use crate::services::{audit_data, PasswordHasher, ServiceError, Store};
use crate::utils::Password;

/// Account, realm and grant management for administrators. Every
/// mutation is written together with its audit entry.
#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
}

impl AdminService {
    pub fn new(store: Arc<dyn Store>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        self.store.list_users().await
    }

    pub async fn create_user(
        &self,
        actor: &User,
        username: &str,
        password: Option<Password>,
        admin: bool,
    ) -> Result<User, ServiceError> {
        let audit = AuditDraft::new(
            AuditAction::UserCreate,
            actor,
            audit_data([("username", json!(username.trim())), ("admin", json!(admin))]),
        )
        .with_row_id("user_id");
        self.insert_user(username, password, admin, audit).await
    }

    async fn insert_user(
        &self,
        username: &str,
        password: Option<Password>,
        admin: bool,
        audit: AuditDraft,
    ) -> Result<User, ServiceError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ServiceError::BadRequest("username is required".to_string()));
        }

        let mut new_user = NewUser::new(username);
        if let Some(password) = password.filter(|p| !p.is_empty()) {
            new_user = new_user.with_password_hash(self.hasher.hash(password).await?);
        }
        if admin {
            new_user = new_user.with_flags(UserFlags::ADMIN);
        }
        let user = self.store.create_user(new_user, Some(audit)).await?;
        tracing::info!(user_id = user.id, admin = admin, "User created");
        Ok(user)
    }

    /// Seed the first administrator into an empty store. Returns the new
    /// account, or `None` when users already exist. The entry is attributed
    /// to the new administrator.
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        password: Password,
    ) -> Result<Option<User>, ServiceError> {
        if self.store.count_users().await? > 0 {
            return Ok(None);
        }
        let audit = AuditDraft::by_created_user(
            AuditAction::UserCreate,
            audit_data([
                ("username", json!(username.trim())),
                ("admin", json!(true)),
                ("bootstrap", json!(true)),
            ]),
        );
        let admin = self.insert_user(username, Some(password), true, audit).await?;
        tracing::warn!(user_id = admin.id, username = %admin.username, "Bootstrapped administrator account");
        Ok(Some(admin))
    }

    pub async fn list_realms(&self) -> Result<Vec<Realm>, ServiceError> {
        self.store.list_realms().await
    }

    pub async fn create_realm(&self, actor: &User, name: &str) -> Result<Realm, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::BadRequest("name is required".to_string()));
        }
        let audit = AuditDraft::new(
            AuditAction::RealmCreate,
            actor,
            audit_data([("name", json!(name))]),
        )
        .with_row_id("realm_id");
        self.store.create_realm(name, Some(audit)).await
    }

    pub async fn get_realm(&self, realm_id: i64) -> Result<Realm, ServiceError> {
        self.store
            .get_realm(realm_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Not Found".to_string()))
    }

    pub async fn list_grants(&self, realm_id: i64) -> Result<Vec<UserRealmGrant>, ServiceError> {
        let realm = self.get_realm(realm_id).await?;
        self.store.list_grants_by_realm(realm.id).await
    }

    pub async fn create_grant(
        &self,
        actor: &User,
        realm_id: i64,
        user_id: i64,
        alias: Option<String>,
    ) -> Result<UserRealmGrant, ServiceError> {
        let realm = self.get_realm(realm_id).await?;
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Unknown user".to_string()))?;

        let alias = normalize_alias(alias);
        let audit = AuditDraft::new(
            AuditAction::RealmGrant,
            actor,
            audit_data([
                ("realm_id", json!(realm.id)),
                ("user_id", json!(user.id)),
                ("alias", json!(alias)),
            ]),
        );
        self.store
            .create_grant(user.id, realm.id, alias.as_deref(), Some(audit))
            .await
    }

    pub async fn update_grant_alias(
        &self,
        actor: &User,
        realm_id: i64,
        user_id: i64,
        alias: Option<String>,
    ) -> Result<UserRealmGrant, ServiceError> {
        let alias = normalize_alias(alias);
        let audit = AuditDraft::new(
            AuditAction::RealmGrantAlias,
            actor,
            audit_data([
                ("realm_id", json!(realm_id)),
                ("user_id", json!(user_id)),
                ("alias", json!(alias)),
            ]),
        );
        self.store
            .update_grant_alias(user_id, realm_id, alias.as_deref(), Some(audit))
            .await?
            .ok_or_else(|| ServiceError::NotFound("Not Found".to_string()))
    }
}

/// Blank aliases mean "present the username".
fn normalize_alias(alias: Option<String>) -> Option<String> {
    alias
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
}
