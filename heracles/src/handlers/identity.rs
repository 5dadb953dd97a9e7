use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::dtos::{ErrorResponse, SecretResponse, UpdateIdentityRequest};
use crate::handlers::session::auth_cookie;
use crate::middleware::CurrentUser;
use crate::models::UserResponse;
use crate::utils::{Password, ValidatedJson};
use crate::AppState;

/// Current user
#[utoipa::path(
    get,
    path = "/api/identity",
    responses(
        (status = 200, description = "Authenticated user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "Identity",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn get_identity(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.sanitized())
}

/// Replace the current user's password
#[utoipa::path(
    patch,
    path = "/api/identity",
    request_body = UpdateIdentityRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Identity",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn update_identity(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<UpdateIdentityRequest>,
) -> Result<StatusCode, AppError> {
    state
        .sessions
        .update_password(&user, Password::new(req.password))
        .await?;
    tracing::info!(user_id = user.id, "Password updated");
    Ok(StatusCode::NO_CONTENT)
}

/// Issue a fresh copy of the current user's signed secret
#[utoipa::path(
    post,
    path = "/api/identity/secret",
    responses(
        (status = 200, description = "Secret issued and cookie set", body = SecretResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "Identity",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn reissue_secret(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SecretResponse>), AppError> {
    let issued = state.sessions.reissue(user).await?;
    let jar = jar.add(auth_cookie(&state.config.cookie, issued.secret.clone()));
    Ok((
        jar,
        Json(SecretResponse {
            secret: issued.secret,
        }),
    ))
}
