//! Ordered credential resolution: cookie, then HTTP Basic, then the
//! `Authorization` header. The first strategy that yields a user wins; a
//! strategy that misses or errors hands over to the next one.

use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

use crate::models::User;
use crate::services::{PasswordHasher, SecretCodec, ServiceError, Store};
use crate::utils::Password;

/// Credentials pulled off one request.
#[derive(Debug, Clone, Default)]
pub struct CredentialBag {
    /// Encoded signed secret from the session cookie.
    pub cookie: Option<String>,
    pub basic: Option<BasicCredentials>,
    /// Non-Basic `Authorization` value: a token secret or an encoded signed secret.
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BasicCredentials {
    pub username: String,
    pub password: Password,
}

impl CredentialBag {
    pub fn from_headers(headers: &HeaderMap, cookie_name: &str) -> Self {
        let cookie = CookieJar::from_headers(headers)
            .get(cookie_name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty());

        let mut bag = CredentialBag {
            cookie,
            ..Default::default()
        };

        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            return bag;
        };

        match value.strip_prefix("Basic ") {
            Some(encoded) => bag.basic = parse_basic(encoded),
            None => {
                let credential = value.strip_prefix("Bearer ").unwrap_or(value).trim();
                bag.authorization = Some(credential.to_string());
            }
        }
        bag
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    pub fn with_basic(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic = Some(BasicCredentials {
            username: username.into(),
            password: Password::new(password.into()),
        });
        self
    }

    pub fn with_authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cookie.is_none() && self.basic.is_none() && self.authorization.is_none()
    }
}

fn parse_basic(encoded: &str) -> Option<BasicCredentials> {
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some(BasicCredentials {
        username: username.to_string(),
        password: Password::new(password.to_string()),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Cookie,
    Basic,
    Header,
}

impl Strategy {
    /// Evaluation order.
    pub const ORDER: [Strategy; 3] = [Strategy::Cookie, Strategy::Basic, Strategy::Header];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Cookie => "cookie",
            Strategy::Basic => "basic",
            Strategy::Header => "header",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub user: User,
    pub strategy: Strategy,
}

#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn Store>,
    codec: SecretCodec,
    hasher: PasswordHasher,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn Store>, codec: SecretCodec, hasher: PasswordHasher) -> Self {
        Self {
            store,
            codec,
            hasher,
        }
    }

    /// Resolve the caller. `requires_api` makes token lookups demand the
    /// token's API capability.
    ///
    /// Fails with `Unauthenticated` when every strategy misses. If a strategy
    /// hit a store failure and none succeeded, that failure is returned
    /// instead.
    pub async fn resolve(
        &self,
        bag: &CredentialBag,
        requires_api: bool,
    ) -> Result<ResolvedIdentity, ServiceError> {
        let mut store_failure = None;

        for strategy in Strategy::ORDER {
            let attempt = match strategy {
                Strategy::Cookie => self.by_cookie(bag).await,
                Strategy::Basic => self.by_basic(bag, requires_api).await,
                Strategy::Header => self.by_header(bag, requires_api).await,
            };

            match attempt {
                Ok(Some(user)) => {
                    tracing::debug!(user_id = user.id, strategy = strategy.as_str(), "Credentials resolved");
                    return Ok(ResolvedIdentity { user, strategy });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(strategy = strategy.as_str(), error = %e, "Credential strategy failed");
                    store_failure = Some(e);
                }
            }
        }

        Err(store_failure.unwrap_or(ServiceError::Unauthenticated))
    }

    async fn by_cookie(&self, bag: &CredentialBag) -> Result<Option<User>, ServiceError> {
        let Some(cookie) = bag.cookie.as_deref() else {
            return Ok(None);
        };
        self.by_signed_secret(cookie).await
    }

    async fn by_basic(
        &self,
        bag: &CredentialBag,
        requires_api: bool,
    ) -> Result<Option<User>, ServiceError> {
        let Some(basic) = bag.basic.as_ref() else {
            return Ok(None);
        };
        let user = self.store.get_user_by_username(&basic.username).await?;

        // A token owned by this user may stand in for the password.
        if let Some(user) = user.as_ref() {
            if !basic.password.is_empty() {
                let owner = self
                    .store
                    .get_user_by_token(basic.password.as_str(), requires_api)
                    .await?;
                if owner.is_some_and(|owner| owner.id == user.id) {
                    return Ok(Some(user.clone()));
                }
            }
        }

        if self.hasher.verify_user(user.as_ref(), &basic.password).await? {
            return Ok(user);
        }
        Ok(None)
    }

    async fn by_header(
        &self,
        bag: &CredentialBag,
        requires_api: bool,
    ) -> Result<Option<User>, ServiceError> {
        let Some(value) = bag.authorization.as_deref() else {
            return Ok(None);
        };
        if let Some(user) = self.store.get_user_by_token(value, requires_api).await? {
            return Ok(Some(user));
        }
        self.by_signed_secret(value).await
    }

    async fn by_signed_secret(&self, encoded: &str) -> Result<Option<User>, ServiceError> {
        match self.codec.decode(encoded) {
            Ok(user_id) => self.store.get_user(user_id).await,
            Err(_) => Ok(None),
        }
    }
}
