//! Realm authorization: explicit grants only, administrators included.

use std::sync::Arc;

use crate::models::User;
use crate::services::{ServiceError, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No credential strategy matched.
    Unauthenticated,
    /// Realm header absent or blank.
    MissingRealm,
    UnknownRealm,
    NoGrant,
}

impl DenyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::Unauthenticated => "unauthenticated",
            DenyReason::MissingRealm => "missing_realm",
            DenyReason::UnknownRealm => "unknown_realm",
            DenyReason::NoGrant => "no_grant",
        }
    }
}

impl From<DenyReason> for ServiceError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Unauthenticated => ServiceError::Unauthenticated,
            DenyReason::MissingRealm => ServiceError::BadRequest("Invalid Realm".to_string()),
            DenyReason::UnknownRealm | DenyReason::NoGrant => {
                ServiceError::Unauthorized(reason.as_str().to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthzDecision {
    /// `label` is the identity the realm should see.
    Allow { realm: String, label: String },
    Deny(DenyReason),
}

#[derive(Clone)]
pub struct RealmAuthorizer {
    store: Arc<dyn Store>,
}

impl RealmAuthorizer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn authorize(
        &self,
        user: &User,
        realm_name: &str,
    ) -> Result<AuthzDecision, ServiceError> {
        let realm_name = realm_name.trim();
        if realm_name.is_empty() {
            return Ok(AuthzDecision::Deny(DenyReason::MissingRealm));
        }

        if self.store.get_realm_by_name(realm_name).await?.is_none() {
            return Ok(AuthzDecision::Deny(DenyReason::UnknownRealm));
        }

        let Some(grant) = self
            .store
            .get_grant_by_realm_name(user.id, realm_name)
            .await?
        else {
            return Ok(AuthzDecision::Deny(DenyReason::NoGrant));
        };

        Ok(AuthzDecision::Allow {
            realm: realm_name.to_string(),
            label: grant.label_for(&user.username).to_string(),
        })
    }
}
