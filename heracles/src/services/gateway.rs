//! Entry points for the reverse proxy and the RADIUS listener.

use serde_json::json;
use std::sync::Arc;

use crate::models::{AuditAction, User};
use crate::services::metrics::{record_radius, record_validate};
use crate::services::{
    audit_data, AuditRecorder, AuthzDecision, CredentialBag, CredentialResolver, DenyReason,
    PasswordHasher, RealmAuthorizer, ServiceError, Store,
};
use crate::utils::Password;

#[derive(Debug, Clone)]
pub struct ValidatedIdentity {
    pub user: User,
    pub realm: String,
    /// Identity header value: grant alias or username.
    pub label: String,
}

#[derive(Debug, Clone)]
pub enum ValidateOutcome {
    Allow(ValidatedIdentity),
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusVerdict {
    Accept,
    Reject,
}

impl RadiusVerdict {
    /// RADIUS packet code: Access-Accept (2) or Access-Reject (3).
    pub fn code(&self) -> u8 {
        match self {
            RadiusVerdict::Accept => 2,
            RadiusVerdict::Reject => 3,
        }
    }
}

#[derive(Clone)]
pub struct GatewayFacade {
    store: Arc<dyn Store>,
    resolver: CredentialResolver,
    authorizer: RealmAuthorizer,
    hasher: PasswordHasher,
    audit: AuditRecorder,
    audit_denials: bool,
}

impl GatewayFacade {
    pub fn new(
        store: Arc<dyn Store>,
        resolver: CredentialResolver,
        authorizer: RealmAuthorizer,
        hasher: PasswordHasher,
        audit: AuditRecorder,
        audit_denials: bool,
    ) -> Self {
        Self {
            store,
            resolver,
            authorizer,
            hasher,
            audit,
            audit_denials,
        }
    }

    /// Decide a proxied request. Token credentials need not carry the API
    /// capability here.
    pub async fn validate(
        &self,
        bag: &CredentialBag,
        realm: Option<&str>,
    ) -> Result<ValidateOutcome, ServiceError> {
        let outcome = self.decide(bag, realm).await;
        match &outcome {
            Ok(ValidateOutcome::Allow(identity)) => {
                record_validate("allow");
                tracing::debug!(user_id = identity.user.id, realm = %identity.realm, "Realm access allowed");
            }
            Ok(ValidateOutcome::Deny(reason)) => record_validate(reason.as_str()),
            Err(_) => record_validate("error"),
        }
        outcome
    }

    async fn decide(
        &self,
        bag: &CredentialBag,
        realm: Option<&str>,
    ) -> Result<ValidateOutcome, ServiceError> {
        let user = match self.resolver.resolve(bag, false).await {
            Ok(resolved) => resolved.user,
            Err(ServiceError::Unauthenticated) => {
                return Ok(ValidateOutcome::Deny(DenyReason::Unauthenticated))
            }
            Err(e) => return Err(e),
        };

        let realm = realm.unwrap_or_default();
        match self.authorizer.authorize(&user, realm).await? {
            AuthzDecision::Allow { realm, label } => {
                Ok(ValidateOutcome::Allow(ValidatedIdentity { user, realm, label }))
            }
            AuthzDecision::Deny(reason) => {
                tracing::info!(user_id = user.id, realm = %realm, reason = reason.as_str(), "Realm access denied");
                if self.audit_denials && reason != DenyReason::MissingRealm {
                    self.audit
                        .record(
                            AuditAction::RealmAccessDenied,
                            &user,
                            audit_data([
                                ("realm", json!(realm)),
                                ("reason", json!(reason.as_str())),
                            ]),
                        )
                        .await?;
                }
                Ok(ValidateOutcome::Deny(reason))
            }
        }
    }

    /// Plain username/password check for RADIUS. No realm, no tokens.
    /// A verdict of Accept is only returned once the login is audited.
    pub async fn radius_access(&self, username: &str, password: &Password) -> RadiusVerdict {
        let verdict = match self.check_radius(username, password).await {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::error!(error = %e, "RADIUS credential check failed");
                RadiusVerdict::Reject
            }
        };
        record_radius(match verdict {
            RadiusVerdict::Accept => "accept",
            RadiusVerdict::Reject => "reject",
        });
        verdict
    }

    async fn check_radius(
        &self,
        username: &str,
        password: &Password,
    ) -> Result<RadiusVerdict, ServiceError> {
        let user = self.store.get_user_by_username(username).await?;
        if !self.hasher.verify_user(user.as_ref(), password).await? {
            return Ok(RadiusVerdict::Reject);
        }
        let Some(user) = user else {
            return Ok(RadiusVerdict::Reject);
        };

        self.audit
            .record(AuditAction::RadiusLogin, &user, Default::default())
            .await?;
        Ok(RadiusVerdict::Accept)
    }
}
