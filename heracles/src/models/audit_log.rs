//! Audit log model - append-only record of security-relevant events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use utoipa::ToSchema;

use super::User;

/// Open key/value payload attached to each entry.
pub type AuditData = serde_json::Map<String, serde_json::Value>;

/// Action tags written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    SelfLogin,
    SecretReissue,
    RadiusLogin,
    PasswordUpdate,
    UserCreate,
    TokenCreate,
    TokenReset,
    TokenDelete,
    RealmCreate,
    RealmGrant,
    RealmGrantAlias,
    RealmAccessDenied,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::SelfLogin => "user.self_login",
            AuditAction::SecretReissue => "user.secret_reissue",
            AuditAction::RadiusLogin => "user.radius_login",
            AuditAction::PasswordUpdate => "user.password_update",
            AuditAction::UserCreate => "user.create",
            AuditAction::TokenCreate => "token.create",
            AuditAction::TokenReset => "token.reset",
            AuditAction::TokenDelete => "token.delete",
            AuditAction::RealmCreate => "realm.create",
            AuditAction::RealmGrant => "realm.grant",
            AuditAction::RealmGrantAlias => "realm.grant_alias",
            AuditAction::RealmAccessDenied => "realm.access_denied",
        }
    }

    /// Actions that mark a completed login.
    pub fn is_login(&self) -> bool {
        matches!(
            self,
            AuditAction::SelfLogin | AuditAction::SecretReissue | AuditAction::RadiusLogin
        )
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AuditLogEntry {
    pub id: i64,
    pub action: String,
    pub user_id: i64,
    pub created_utc: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub data: Json<AuditData>,
}

/// Entry about to be appended; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewAuditLogEntry {
    pub action: AuditAction,
    pub user_id: i64,
    pub data: AuditData,
}

/// Audit entry for a store mutation. The store writes it in the same unit
/// of work as the mutation, so neither persists without the other.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub action: AuditAction,
    /// `None` when the entry is attributed to the user being created.
    pub actor_id: Option<i64>,
    pub data: AuditData,
    /// Key under which the id of the written row joins `data`.
    pub row_id_key: Option<&'static str>,
}

impl AuditDraft {
    pub fn new(action: AuditAction, actor: &User, data: AuditData) -> Self {
        Self {
            action,
            actor_id: Some(actor.id),
            data,
            row_id_key: None,
        }
    }

    /// Entry for an account that records its own creation.
    pub fn by_created_user(action: AuditAction, data: AuditData) -> Self {
        Self {
            action,
            actor_id: None,
            data,
            row_id_key: Some("user_id"),
        }
    }

    pub fn with_row_id(mut self, key: &'static str) -> Self {
        self.row_id_key = Some(key);
        self
    }

    /// The entry to append once the mutated row's id is known.
    pub fn into_entry(self, row_id: i64) -> NewAuditLogEntry {
        let mut data = self.data;
        if let Some(key) = self.row_id_key {
            data.insert(key.to_string(), serde_json::Value::from(row_id));
        }
        NewAuditLogEntry {
            action: self.action,
            user_id: self.actor_id.unwrap_or(row_id),
            data,
        }
    }
}
