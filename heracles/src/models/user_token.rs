//! API token model - bearer secrets owned by a user.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use super::TokenFlags;

/// Bytes of randomness behind every token secret.
pub const TOKEN_SECRET_BYTES: usize = 128;

#[derive(Debug, Clone, FromRow)]
pub struct UserToken {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub token: String,
    pub flags: TokenFlags,
    pub created_utc: DateTime<Utc>,
}

impl UserToken {
    /// Generate fresh secret contents for a token.
    pub fn generate_secret() -> Result<String, anyhow::Error> {
        let mut raw = vec![0u8; TOKEN_SECRET_BYTES];
        OsRng
            .try_fill_bytes(&mut raw)
            .map_err(|e| anyhow::anyhow!("Failed to gather token randomness: {}", e))?;
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    pub fn response(&self) -> TokenResponse {
        TokenResponse::from(self.clone())
    }
}

/// Fields of a token about to be inserted.
#[derive(Debug, Clone)]
pub struct NewUserToken {
    pub user_id: i64,
    pub name: String,
    pub token: String,
    pub flags: TokenFlags,
}

/// Token response; the secret is shown to its owner so it can be used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub token: String,
    #[schema(value_type = i64)]
    pub flags: TokenFlags,
    pub api: bool,
    pub created_utc: DateTime<Utc>,
}

impl From<UserToken> for TokenResponse {
    fn from(t: UserToken) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            api: t.flags.has_api_access(),
            name: t.name,
            token: t.token,
            flags: t.flags,
            created_utc: t.created_utc,
        }
    }
}
