use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{AuditLogEntry, Realm, TokenResponse, UserRealmGrant, UserResponse};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateIdentityRequest {
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTokenRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    #[schema(example = "ci-runner")]
    pub name: String,
    /// Owner of the new token. Administrators only.
    pub user_id: Option<i64>,
    /// API capability, defaults to true.
    pub api: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateTokenRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: Option<String>,
    #[serde(default)]
    pub reset_token: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 255, message = "Username must be 1-255 characters"))]
    #[schema(example = "alice")]
    pub username: String,
    pub password: Option<String>,
    #[serde(default)]
    pub admin: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateRealmRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    #[schema(example = "ci")]
    pub name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateGrantRequest {
    pub user_id: i64,
    #[validate(length(max = 255))]
    #[schema(example = "ci-bot")]
    pub alias: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateGrantRequest {
    /// Null or blank presents the username again.
    #[validate(length(max = 255))]
    pub alias: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenList {
    pub tokens: Vec<TokenResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub users: Vec<UserResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RealmList {
    pub realms: Vec<Realm>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GrantList {
    pub grants: Vec<UserRealmGrant>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogList {
    pub entries: Vec<AuditLogEntry>,
}
