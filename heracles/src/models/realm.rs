//! Realm and grant models - downstream resources and who may reach them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// A named downstream service boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Realm {
    pub id: i64,
    pub name: String,
    pub created_utc: DateTime<Utc>,
}

/// Explicit permission for one user to reach one realm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserRealmGrant {
    pub user_id: i64,
    pub realm_id: i64,
    /// Identity presented to the realm instead of the username.
    pub alias: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl UserRealmGrant {
    /// Label the realm should see for `username` under this grant.
    pub fn label_for<'a>(&'a self, username: &'a str) -> &'a str {
        self.alias.as_deref().unwrap_or(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(alias: Option<&str>) -> UserRealmGrant {
        UserRealmGrant {
            user_id: 1,
            realm_id: 2,
            alias: alias.map(str::to_string),
            created_utc: Utc::now(),
        }
    }

    #[test]
    fn test_label_prefers_alias() {
        assert_eq!(grant(Some("ci-bot")).label_for("alice"), "ci-bot");
        assert_eq!(grant(None).label_for("alice"), "alice");
    }
}
