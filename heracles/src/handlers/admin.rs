//! Administrator-only management of users, realms, grants and the audit log.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{
    AuditLogList, CreateGrantRequest, CreateRealmRequest, CreateUserRequest, ErrorResponse,
    GrantList, RealmList, UpdateGrantRequest, UserList,
};
use crate::middleware::CurrentUser;
use crate::models::{Realm, UserRealmGrant, UserResponse};
use crate::services::RECENT_LIMIT;
use crate::utils::{Password, ValidatedJson};
use crate::AppState;

/// List users
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = UserList),
        (status = 401, description = "Missing credentials or not an administrator", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UserList>, AppError> {
    let users = state.admin.list_users().await?;
    Ok(Json(UserList {
        users: users.iter().map(|u| u.sanitized()).collect(),
    }))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 401, description = "Missing credentials or not an administrator", body = ErrorResponse),
        (status = 409, description = "Username taken", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state
        .admin
        .create_user(&actor, &req.username, req.password.map(Password::new), req.admin)
        .await?;
    tracing::info!(actor_id = actor.id, user_id = user.id, "User created");
    Ok((StatusCode::CREATED, Json(user.sanitized())))
}

/// List realms
#[utoipa::path(
    get,
    path = "/api/realms",
    responses(
        (status = 200, description = "All realms", body = RealmList),
        (status = 401, description = "Missing credentials or not an administrator", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn list_realms(State(state): State<AppState>) -> Result<Json<RealmList>, AppError> {
    Ok(Json(RealmList {
        realms: state.admin.list_realms().await?,
    }))
}

/// Create a realm
#[utoipa::path(
    post,
    path = "/api/realms",
    request_body = CreateRealmRequest,
    responses(
        (status = 201, description = "Realm created", body = Realm),
        (status = 401, description = "Missing credentials or not an administrator", body = ErrorResponse),
        (status = 409, description = "Realm name taken", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn create_realm(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateRealmRequest>,
) -> Result<(StatusCode, Json<Realm>), AppError> {
    let realm = state.admin.create_realm(&actor, &req.name).await?;
    Ok((StatusCode::CREATED, Json(realm)))
}

/// List the grants of a realm
#[utoipa::path(
    get,
    path = "/api/realms/{id}/grants",
    params(("id" = i64, Path, description = "Realm id")),
    responses(
        (status = 200, description = "Grants of the realm", body = GrantList),
        (status = 401, description = "Missing credentials or not an administrator", body = ErrorResponse),
        (status = 404, description = "Unknown realm", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn list_grants(
    State(state): State<AppState>,
    Path(realm_id): Path<i64>,
) -> Result<Json<GrantList>, AppError> {
    Ok(Json(GrantList {
        grants: state.admin.list_grants(realm_id).await?,
    }))
}

/// Grant a user access to a realm
#[utoipa::path(
    post,
    path = "/api/realms/{id}/grants",
    params(("id" = i64, Path, description = "Realm id")),
    request_body = CreateGrantRequest,
    responses(
        (status = 201, description = "Grant created", body = UserRealmGrant),
        (status = 401, description = "Missing credentials or not an administrator", body = ErrorResponse),
        (status = 404, description = "Unknown realm or user", body = ErrorResponse),
        (status = 409, description = "User already granted", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn create_grant(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path(realm_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<CreateGrantRequest>,
) -> Result<(StatusCode, Json<UserRealmGrant>), AppError> {
    let grant = state
        .admin
        .create_grant(&actor, realm_id, req.user_id, req.alias)
        .await?;
    Ok((StatusCode::CREATED, Json(grant)))
}

/// Replace the alias of a grant
#[utoipa::path(
    patch,
    path = "/api/realms/{id}/grants/{user_id}",
    params(
        ("id" = i64, Path, description = "Realm id"),
        ("user_id" = i64, Path, description = "Granted user id")
    ),
    request_body = UpdateGrantRequest,
    responses(
        (status = 200, description = "Grant updated", body = UserRealmGrant),
        (status = 401, description = "Missing credentials or not an administrator", body = ErrorResponse),
        (status = 404, description = "No such grant", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn update_grant(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Path((realm_id, user_id)): Path<(i64, i64)>,
    ValidatedJson(req): ValidatedJson<UpdateGrantRequest>,
) -> Result<Json<UserRealmGrant>, AppError> {
    let grant = state
        .admin
        .update_grant_alias(&actor, realm_id, user_id, req.alias)
        .await?;
    Ok(Json(grant))
}

/// Newest audit log entries, newest first
#[utoipa::path(
    get,
    path = "/api/log/recent",
    responses(
        (status = 200, description = "Recent audit entries", body = AuditLogList),
        (status = 401, description = "Missing credentials or not an administrator", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn recent_log(State(state): State<AppState>) -> Result<Json<AuditLogList>, AppError> {
    Ok(Json(AuditLogList {
        entries: state.audit.recent(RECENT_LIMIT).await?,
    }))
}
