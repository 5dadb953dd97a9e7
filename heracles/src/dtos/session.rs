use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    #[schema(example = "alice")]
    pub username: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,

    /// Where to send the browser after a successful login.
    #[schema(example = "https://ci.example.com/")]
    pub r: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SecretResponse {
    /// Unpadded base64url signed secret, usable as cookie or `Authorization` value.
    pub secret: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ValidateQuery {
    /// Answer every denial with 204 and no identity headers.
    #[serde(default)]
    pub quiet: bool,
}
