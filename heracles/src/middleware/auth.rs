use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use crate::models::User;
use crate::services::CredentialBag;
use crate::AppState;

/// The authenticated caller of an `/api` request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Require credentials on management routes. Token credentials must carry
/// the API capability.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let bag = CredentialBag::from_headers(req.headers(), &state.config.cookie.name);

    let resolved = state.resolver.resolve(&bag, true).await.map_err(|e| {
        if !e.is_auth_failure() {
            tracing::error!(error = %e, "Credential resolution failed");
        }
        AppError::from(e)
    })?;

    tracing::Span::current().record("user_id", resolved.user.id);
    req.extensions_mut().insert(CurrentUser(resolved.user));

    Ok(next.run(req).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::InternalError(anyhow::anyhow!("Current user missing from request extensions")))
    }
}
