use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::Store;
use crate::models::{
    AuditDraft, AuditLogEntry, ExternalProvider, NewAuditLogEntry, NewUser, NewUserToken, Realm,
    User, UserRealmGrant, UserToken,
};
use crate::services::ServiceError;
use crate::utils::PasswordHashString;

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    tokens: BTreeMap<i64, UserToken>,
    realms: BTreeMap<i64, Realm>,
    grants: HashMap<(i64, i64), UserRealmGrant>,
    audit_log: Vec<AuditLogEntry>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn append_audit(&mut self, entry: NewAuditLogEntry) -> AuditLogEntry {
        let id = self.next_id();
        let stored = AuditLogEntry {
            id,
            action: entry.action.as_str().to_string(),
            user_id: entry.user_id,
            created_utc: Utc::now(),
            data: Json(entry.data),
        };
        self.audit_log.push(stored.clone());
        stored
    }

    fn record(&mut self, audit: Option<AuditDraft>, row_id: i64) {
        if let Some(draft) = audit {
            self.append_audit(draft.into_entry(row_id));
        }
    }

    fn external_id_taken(&self, provider: ExternalProvider, external_id: &str) -> bool {
        self.users
            .values()
            .any(|u| u.external_id(provider) == Some(external_id))
    }
}

/// In-process store with the same uniqueness rules as the schema.
///
/// All tables sit behind one mutex, so every write is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    audit_unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make audit appends fail, as they would during a store outage.
    pub fn set_audit_unavailable(&self, unavailable: bool) {
        self.audit_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fails like an audit insert would during an outage. Mutations call
    /// this before touching any table.
    fn check_audit(&self, audit: &Option<AuditDraft>) -> Result<(), ServiceError> {
        if audit.is_some() && self.audit_unavailable.load(Ordering::SeqCst) {
            return Err(ServiceError::Store(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, ServiceError> {
        self.tables
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Memory store mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.tables().map(|_| ())
    }

    async fn get_user(&self, id: i64) -> Result<Option<User>, ServiceError> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_user_by_external_id(
        &self,
        provider: ExternalProvider,
        external_id: &str,
    ) -> Result<Option<User>, ServiceError> {
        Ok(self
            .tables()?
            .users
            .values()
            .find(|u| u.external_id(provider) == Some(external_id))
            .cloned())
    }

    async fn get_user_by_token(
        &self,
        token: &str,
        requires_api: bool,
    ) -> Result<Option<User>, ServiceError> {
        let tables = self.tables()?;
        let owner = tables
            .tokens
            .values()
            .find(|t| t.token == token && (!requires_api || t.flags.has_api_access()))
            .and_then(|t| tables.users.get(&t.user_id))
            .cloned();
        Ok(owner)
    }

    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.tables()?.users.values().cloned().collect())
    }

    async fn count_users(&self) -> Result<i64, ServiceError> {
        Ok(self.tables()?.users.len() as i64)
    }

    async fn create_user(
        &self,
        user: NewUser,
        audit: Option<AuditDraft>,
    ) -> Result<User, ServiceError> {
        if user.username.trim().is_empty() {
            return Err(ServiceError::BadRequest("username is required".to_string()));
        }
        let mut tables = self.tables()?;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(ServiceError::Conflict("Username already taken".to_string()));
        }
        for provider in ExternalProvider::all() {
            let external_id = match provider {
                ExternalProvider::Discord => user.discord_id.as_deref(),
                ExternalProvider::Github => user.github_id.as_deref(),
            };
            if let Some(external_id) = external_id {
                if tables.external_id_taken(provider, external_id) {
                    return Err(ServiceError::Conflict(format!(
                        "{} account already linked",
                        provider.as_str()
                    )));
                }
            }
        }

        let id = tables.next_id();
        let created = User {
            id,
            username: user.username,
            password_hash: user.password_hash.map(PasswordHashString::into_string),
            flags: user.flags,
            discord_id: user.discord_id,
            github_id: user.github_id,
            created_utc: Utc::now(),
        };
        self.check_audit(&audit)?;
        tables.users.insert(id, created.clone());
        tables.record(audit, id);
        Ok(created)
    }

    async fn update_password(
        &self,
        user_id: i64,
        password_hash: &PasswordHashString,
        audit: Option<AuditDraft>,
    ) -> Result<(), ServiceError> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&user_id) {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }
        self.check_audit(&audit)?;
        if let Some(user) = tables.users.get_mut(&user_id) {
            user.password_hash = Some(password_hash.as_str().to_string());
        }
        tables.record(audit, user_id);
        Ok(())
    }

    async fn create_token(
        &self,
        token: NewUserToken,
        audit: Option<AuditDraft>,
    ) -> Result<UserToken, ServiceError> {
        let mut tables = self.tables()?;
        if tables.tokens.values().any(|t| t.token == token.token) {
            return Err(ServiceError::Conflict("Token secret collision".to_string()));
        }
        if !tables.users.contains_key(&token.user_id) {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }

        let id = tables.next_id();
        let created = UserToken {
            id,
            user_id: token.user_id,
            name: token.name,
            token: token.token,
            flags: token.flags,
            created_utc: Utc::now(),
        };
        self.check_audit(&audit)?;
        tables.tokens.insert(id, created.clone());
        tables.record(audit, id);
        Ok(created)
    }

    async fn get_token(&self, id: i64) -> Result<Option<UserToken>, ServiceError> {
        Ok(self.tables()?.tokens.get(&id).cloned())
    }

    async fn list_tokens_by_user(&self, user_id: i64) -> Result<Vec<UserToken>, ServiceError> {
        Ok(self
            .tables()?
            .tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_token(
        &self,
        token: &UserToken,
        audit: Option<AuditDraft>,
    ) -> Result<UserToken, ServiceError> {
        let mut tables = self.tables()?;
        if tables
            .tokens
            .values()
            .any(|t| t.id != token.id && t.token == token.token)
        {
            return Err(ServiceError::Conflict("Token secret collision".to_string()));
        }
        let mut updated = tables
            .tokens
            .get(&token.id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound("Token not found".to_string()))?;
        updated.name = token.name.clone();
        updated.token = token.token.clone();
        updated.flags = token.flags;

        self.check_audit(&audit)?;
        tables.tokens.insert(updated.id, updated.clone());
        tables.record(audit, updated.id);
        Ok(updated)
    }

    async fn delete_token(
        &self,
        id: i64,
        audit: Option<AuditDraft>,
    ) -> Result<bool, ServiceError> {
        let mut tables = self.tables()?;
        if !tables.tokens.contains_key(&id) {
            return Ok(false);
        }
        self.check_audit(&audit)?;
        tables.tokens.remove(&id);
        tables.record(audit, id);
        Ok(true)
    }

    async fn create_realm(
        &self,
        name: &str,
        audit: Option<AuditDraft>,
    ) -> Result<Realm, ServiceError> {
        let mut tables = self.tables()?;
        if tables.realms.values().any(|r| r.name == name) {
            return Err(ServiceError::Conflict("Realm already exists".to_string()));
        }
        let id = tables.next_id();
        let realm = Realm {
            id,
            name: name.to_string(),
            created_utc: Utc::now(),
        };
        self.check_audit(&audit)?;
        tables.realms.insert(id, realm.clone());
        tables.record(audit, id);
        Ok(realm)
    }

    async fn get_realm(&self, id: i64) -> Result<Option<Realm>, ServiceError> {
        Ok(self.tables()?.realms.get(&id).cloned())
    }

    async fn get_realm_by_name(&self, name: &str) -> Result<Option<Realm>, ServiceError> {
        Ok(self
            .tables()?
            .realms
            .values()
            .find(|r| r.name == name)
            .cloned())
    }

    async fn list_realms(&self) -> Result<Vec<Realm>, ServiceError> {
        Ok(self.tables()?.realms.values().cloned().collect())
    }

    async fn create_grant(
        &self,
        user_id: i64,
        realm_id: i64,
        alias: Option<&str>,
        audit: Option<AuditDraft>,
    ) -> Result<UserRealmGrant, ServiceError> {
        let mut tables = self.tables()?;
        if !tables.users.contains_key(&user_id) {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }
        if !tables.realms.contains_key(&realm_id) {
            return Err(ServiceError::NotFound("Realm not found".to_string()));
        }
        if tables.grants.contains_key(&(user_id, realm_id)) {
            return Err(ServiceError::Conflict("Grant already exists".to_string()));
        }
        let grant = UserRealmGrant {
            user_id,
            realm_id,
            alias: alias.map(str::to_string),
            created_utc: Utc::now(),
        };
        self.check_audit(&audit)?;
        tables.grants.insert((user_id, realm_id), grant.clone());
        tables.record(audit, user_id);
        Ok(grant)
    }

    async fn get_grant_by_realm_name(
        &self,
        user_id: i64,
        realm_name: &str,
    ) -> Result<Option<UserRealmGrant>, ServiceError> {
        let tables = self.tables()?;
        let grant = tables
            .realms
            .values()
            .find(|r| r.name == realm_name)
            .and_then(|r| tables.grants.get(&(user_id, r.id)))
            .cloned();
        Ok(grant)
    }

    async fn list_grants_by_realm(
        &self,
        realm_id: i64,
    ) -> Result<Vec<UserRealmGrant>, ServiceError> {
        let mut grants: Vec<UserRealmGrant> = self
            .tables()?
            .grants
            .values()
            .filter(|g| g.realm_id == realm_id)
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.user_id);
        Ok(grants)
    }

    async fn update_grant_alias(
        &self,
        user_id: i64,
        realm_id: i64,
        alias: Option<&str>,
        audit: Option<AuditDraft>,
    ) -> Result<Option<UserRealmGrant>, ServiceError> {
        let mut tables = self.tables()?;
        let Some(mut grant) = tables.grants.get(&(user_id, realm_id)).cloned() else {
            return Ok(None);
        };
        grant.alias = alias.map(str::to_string);

        self.check_audit(&audit)?;
        tables.grants.insert((user_id, realm_id), grant.clone());
        tables.record(audit, user_id);
        Ok(Some(grant))
    }

    async fn create_audit_entry(
        &self,
        entry: NewAuditLogEntry,
    ) -> Result<AuditLogEntry, ServiceError> {
        if self.audit_unavailable.load(Ordering::SeqCst) {
            return Err(ServiceError::Store(sqlx::Error::PoolTimedOut));
        }
        Ok(self.tables()?.append_audit(entry))
    }

    async fn list_recent_audit_entries(
        &self,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, ServiceError> {
        let mut entries = self.tables()?.audit_log.clone();
        entries.sort_by(|a, b| {
            b.created_utc
                .cmp(&a.created_utc)
                .then_with(|| b.id.cmp(&a.id))
        });
        entries.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(entries)
    }
}
