use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{CreateTokenRequest, ErrorResponse, TokenList, UpdateTokenRequest};
use crate::middleware::CurrentUser;
use crate::models::TokenResponse;
use crate::services::TokenUpdate;
use crate::utils::ValidatedJson;
use crate::AppState;

/// List the caller's tokens
#[utoipa::path(
    get,
    path = "/api/tokens",
    responses(
        (status = 200, description = "Tokens owned by the caller", body = TokenList),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "Tokens",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn list_tokens(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<TokenList>, AppError> {
    let tokens = state.tokens.list(&user).await?;
    Ok(Json(TokenList {
        tokens: tokens.iter().map(|t| t.response()).collect(),
    }))
}

/// Create a token
#[utoipa::path(
    post,
    path = "/api/tokens",
    request_body = CreateTokenRequest,
    responses(
        (status = 201, description = "Token created", body = TokenResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "user_id given by a non-administrator", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Tokens",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn create_token(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(req): ValidatedJson<CreateTokenRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let token = state
        .tokens
        .create(&user, req.name, req.user_id, req.api)
        .await?;
    Ok((StatusCode::CREATED, Json(token.response())))
}

/// Rename a token or regenerate its secret
#[utoipa::path(
    patch,
    path = "/api/tokens/{id}",
    params(("id" = i64, Path, description = "Token id")),
    request_body = UpdateTokenRequest,
    responses(
        (status = 200, description = "Token updated", body = TokenResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Not found or not manageable by the caller", body = ErrorResponse)
    ),
    tag = "Tokens",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn update_token(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<UpdateTokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let token = state
        .tokens
        .update(
            &user,
            id,
            TokenUpdate {
                name: req.name,
                reset_token: req.reset_token,
            },
        )
        .await?;
    Ok(Json(token.response()))
}

/// Delete a token
#[utoipa::path(
    delete,
    path = "/api/tokens/{id}",
    params(("id" = i64, Path, description = "Token id")),
    responses(
        (status = 204, description = "Token deleted"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Not found or not manageable by the caller", body = ErrorResponse)
    ),
    tag = "Tokens",
    security(("heracles_cookie" = []), ("bearer_token" = []), ("basic_auth" = []))
)]
pub async fn delete_token(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    state.tokens.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
