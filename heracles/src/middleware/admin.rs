use axum::{extract::Request, middleware::Next, response::Response};
use service_core::error::AppError;

use crate::middleware::CurrentUser;
use crate::services::ServiceError;

/// Runs behind `auth_middleware`. Non-administrators get the same 401 as
/// missing credentials.
pub async fn admin_middleware(request: Request, next: Next) -> Result<Response, AppError> {
    let is_admin = request
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|CurrentUser(user)| user.is_admin());

    if !is_admin {
        tracing::warn!("Non-admin attempted an admin operation");
        return Err(ServiceError::Unauthorized("admin capability required".to_string()).into());
    }

    Ok(next.run(request).await)
}
