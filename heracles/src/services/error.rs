use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// No credential strategy produced a user.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// Authenticated, but lacking a grant or capability.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated and known, but the action needs administrator rights.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl ServiceError {
    /// Map a store write failure: unique violations become conflicts and
    /// check violations bad requests.
    pub fn from_write(err: sqlx::Error, conflict: &str) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                ServiceError::Conflict(conflict.to_string())
            }
            sqlx::Error::Database(db) if db.is_check_violation() => {
                ServiceError::BadRequest("Invalid value".to_string())
            }
            _ => ServiceError::Store(err),
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ServiceError::Unauthenticated | ServiceError::Unauthorized(_)
        )
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            // Callers see one outcome for every authentication or authorization failure.
            ServiceError::Unauthenticated | ServiceError::Unauthorized(_) => {
                AppError::Unauthorized(anyhow::anyhow!("Unauthorized"))
            }
            ServiceError::Forbidden(msg) => AppError::Forbidden(anyhow::anyhow!(msg)),
            ServiceError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ServiceError::BadRequest(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::Store(e) => AppError::from(e),
        }
    }
}
