//! Slow-hash password checks, kept off the async executor.

use std::sync::Arc;

use crate::models::User;
use crate::services::ServiceError;
use crate::utils::{self, HashCost, Password, PasswordHashString};

#[derive(Clone)]
pub struct PasswordHasher {
    cost: HashCost,
    /// Hash checked against for unknown accounts so both paths cost the same.
    dummy_hash: Arc<PasswordHashString>,
}

impl PasswordHasher {
    pub fn new(cost: HashCost) -> Result<Self, anyhow::Error> {
        let dummy = utils::hash_password(&Password::new("heracles-dummy".to_string()), cost)?;
        Ok(Self {
            cost,
            dummy_hash: Arc::new(dummy),
        })
    }

    pub async fn hash(&self, password: Password) -> Result<PasswordHashString, ServiceError> {
        let cost = self.cost;
        let hash = tokio::task::spawn_blocking(move || utils::hash_password(&password, cost))
            .await
            .map_err(|e| anyhow::anyhow!("Password hashing task failed: {}", e))??;
        Ok(hash)
    }

    /// True only when `user` has a password hash and `password` matches it.
    /// A missing user or hash still runs one full verification.
    pub async fn verify_user(
        &self,
        user: Option<&User>,
        password: &Password,
    ) -> Result<bool, ServiceError> {
        let stored = user.and_then(User::password_hash);
        let matched = self
            .verify(
                password.clone(),
                stored.clone().unwrap_or_else(|| (*self.dummy_hash).clone()),
            )
            .await?;
        Ok(matched && stored.is_some())
    }

    async fn verify(
        &self,
        password: Password,
        hash: PasswordHashString,
    ) -> Result<bool, ServiceError> {
        let matched =
            tokio::task::spawn_blocking(move || utils::verify_password(&password, &hash).is_ok())
                .await
                .map_err(|e| anyhow::anyhow!("Password verification task failed: {}", e))?;
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserFlags;
    use chrono::Utc;

    fn user_with(hash: Option<PasswordHashString>) -> User {
        User {
            id: 1,
            username: "alice".to_string(),
            password_hash: hash.map(PasswordHashString::into_string),
            flags: UserFlags::empty(),
            discord_id: None,
            github_id: None,
            created_utc: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_verify_user() {
        let hasher = PasswordHasher::new(HashCost::MINIMAL).unwrap();
        let hash = hasher
            .hash(Password::new("correcthorse".to_string()))
            .await
            .unwrap();
        let alice = user_with(Some(hash));

        let good = Password::new("correcthorse".to_string());
        let bad = Password::new("wrong".to_string());
        assert!(hasher.verify_user(Some(&alice), &good).await.unwrap());
        assert!(!hasher.verify_user(Some(&alice), &bad).await.unwrap());
    }

    #[tokio::test]
    async fn test_accounts_without_password_never_match() {
        let hasher = PasswordHasher::new(HashCost::MINIMAL).unwrap();
        let federated = user_with(None);
        let dummy = Password::new("heracles-dummy".to_string());

        assert!(!hasher.verify_user(Some(&federated), &dummy).await.unwrap());
        assert!(!hasher.verify_user(None, &dummy).await.unwrap());
    }
}
