//! User model - local accounts, optionally linked to federated identities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::UserFlags;
use crate::utils::PasswordHashString;

/// External identity providers a local account can be linked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExternalProvider {
    Discord,
    Github,
}

impl ExternalProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExternalProvider::Discord => "discord",
            ExternalProvider::Github => "github",
        }
    }

    /// Response header carrying the linked id to a downstream realm.
    pub fn identity_header(&self) -> &'static str {
        match self {
            ExternalProvider::Discord => "x-heracles-discord-id",
            ExternalProvider::Github => "x-heracles-github-id",
        }
    }

    pub fn all() -> [ExternalProvider; 2] {
        [ExternalProvider::Discord, ExternalProvider::Github]
    }
}

impl std::str::FromStr for ExternalProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discord" => Ok(ExternalProvider::Discord),
            "github" => Ok(ExternalProvider::Github),
            _ => Err(format!("Invalid external provider: {}", s)),
        }
    }
}

/// User entity.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Absent for federated-only accounts.
    pub password_hash: Option<String>,
    pub flags: UserFlags,
    pub discord_id: Option<String>,
    pub github_id: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.flags.has_admin()
    }

    pub fn password_hash(&self) -> Option<PasswordHashString> {
        self.password_hash
            .as_ref()
            .filter(|hash| !hash.is_empty())
            .map(|hash| PasswordHashString::new(hash.clone()))
    }

    pub fn external_id(&self, provider: ExternalProvider) -> Option<&str> {
        match provider {
            ExternalProvider::Discord => self.discord_id.as_deref(),
            ExternalProvider::Github => self.github_id.as_deref(),
        }
    }

    /// Convert to sanitized response (no sensitive fields).
    pub fn sanitized(&self) -> UserResponse {
        UserResponse::from(self.clone())
    }
}

/// Fields of a user about to be inserted; the store assigns the id.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub password_hash: Option<PasswordHashString>,
    pub flags: UserFlags,
    pub discord_id: Option<String>,
    pub github_id: Option<String>,
}

impl NewUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_password_hash(mut self, hash: PasswordHashString) -> Self {
        self.password_hash = Some(hash);
        self
    }

    pub fn with_flags(mut self, flags: UserFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_external_id(mut self, provider: ExternalProvider, external_id: String) -> Self {
        match provider {
            ExternalProvider::Discord => self.discord_id = Some(external_id),
            ExternalProvider::Github => self.github_id = Some(external_id),
        }
        self
    }
}

/// User response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub admin: bool,
    pub discord_id: Option<String>,
    pub github_id: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            admin: u.is_admin(),
            username: u.username,
            discord_id: u.discord_id,
            github_id: u.github_id,
            created_utc: u.created_utc,
        }
    }
}
