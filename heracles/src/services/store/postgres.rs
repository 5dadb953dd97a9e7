use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgConnection, PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{info, instrument};

use super::Store;
use crate::models::{
    AuditDraft, AuditLogEntry, ExternalProvider, NewAuditLogEntry, NewUser, NewUserToken, Realm, TokenFlags,
    User, UserRealmGrant, UserToken,
};
use crate::services::metrics::db_timer;
use crate::services::ServiceError;
use crate::utils::PasswordHashString;

const USER_COLUMNS: &str =
    "u.id, u.username, u.password_hash, u.flags, u.discord_id, u.github_id, u.created_utc";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    #[instrument(skip(database_url))]
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    async fn find_user(&self, clause: &str, value: &str) -> Result<Option<User>, ServiceError> {
        let sql = format!("SELECT {} FROM users u WHERE {} = $1", USER_COLUMNS, clause);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?)
    }
}

async fn insert_audit(
    conn: &mut PgConnection,
    entry: NewAuditLogEntry,
) -> Result<AuditLogEntry, ServiceError> {
    Ok(sqlx::query_as::<_, AuditLogEntry>(
        r#"
        INSERT INTO audit_log (action, user_id, data)
        VALUES ($1, $2, $3)
        RETURNING id, action, user_id, created_utc, data
        "#,
    )
    .bind(entry.action.as_str())
    .bind(entry.user_id)
    .bind(Json(&entry.data))
    .fetch_one(conn)
    .await?)
}

/// Append the entry for a mutation inside its transaction.
async fn record(
    conn: &mut PgConnection,
    audit: Option<AuditDraft>,
    row_id: i64,
) -> Result<(), ServiceError> {
    if let Some(draft) = audit {
        insert_audit(conn, draft.into_entry(row_id)).await?;
    }
    Ok(())
}

#[async_trait]
impl Store for PgStore {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), ServiceError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_user(&self, id: i64) -> Result<Option<User>, ServiceError> {
        let _timer = db_timer("get_user");
        let sql = format!("SELECT {} FROM users u WHERE u.id = $1", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    #[instrument(skip(self))]
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, ServiceError> {
        let _timer = db_timer("get_user_by_username");
        self.find_user("u.username", username).await
    }

    #[instrument(skip(self, external_id), fields(provider = provider.as_str()))]
    async fn get_user_by_external_id(
        &self,
        provider: ExternalProvider,
        external_id: &str,
    ) -> Result<Option<User>, ServiceError> {
        let _timer = db_timer("get_user_by_external_id");
        let column = match provider {
            ExternalProvider::Discord => "u.discord_id",
            ExternalProvider::Github => "u.github_id",
        };
        self.find_user(column, external_id).await
    }

    #[instrument(skip(self, token))]
    async fn get_user_by_token(
        &self,
        token: &str,
        requires_api: bool,
    ) -> Result<Option<User>, ServiceError> {
        let _timer = db_timer("get_user_by_token");
        let required = if requires_api {
            TokenFlags::API
        } else {
            TokenFlags::empty()
        };
        let sql = format!(
            r#"
            SELECT {}
            FROM users u
            JOIN user_tokens t ON t.user_id = u.id
            WHERE t.token = $1 AND (t.flags & $2) = $2
            "#,
            USER_COLUMNS
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .bind(required.bits())
            .fetch_optional(&self.pool)
            .await?)
    }

    #[instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        let _timer = db_timer("list_users");
        let sql = format!("SELECT {} FROM users u ORDER BY u.id", USER_COLUMNS);
        Ok(sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await?)
    }

    #[instrument(skip(self))]
    async fn count_users(&self) -> Result<i64, ServiceError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[instrument(skip(self, user, audit), fields(username = %user.username))]
    async fn create_user(
        &self,
        user: NewUser,
        audit: Option<AuditDraft>,
    ) -> Result<User, ServiceError> {
        let _timer = db_timer("create_user");
        if user.username.trim().is_empty() {
            return Err(ServiceError::BadRequest("username is required".to_string()));
        }
        let mut tx = self.pool.begin().await?;
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash, flags, discord_id, github_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, password_hash, flags, discord_id, github_id, created_utc
            "#,
        )
        .bind(&user.username)
        .bind(user.password_hash.as_ref().map(PasswordHashString::as_str))
        .bind(user.flags)
        .bind(&user.discord_id)
        .bind(&user.github_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ServiceError::from_write(e, "Username or linked account already taken"))?;
        record(&mut tx, audit, created.id).await?;
        tx.commit().await?;

        info!(user_id = created.id, "User created");
        Ok(created)
    }

    #[instrument(skip(self, password_hash, audit))]
    async fn update_password(
        &self,
        user_id: i64,
        password_hash: &PasswordHashString,
        audit: Option<AuditDraft>,
    ) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash.as_str())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("User not found".to_string()));
        }
        record(&mut tx, audit, user_id).await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self, token, audit), fields(user_id = token.user_id))]
    async fn create_token(
        &self,
        token: NewUserToken,
        audit: Option<AuditDraft>,
    ) -> Result<UserToken, ServiceError> {
        let _timer = db_timer("create_token");
        let mut tx = self.pool.begin().await?;
        let created = sqlx::query_as::<_, UserToken>(
            r#"
            INSERT INTO user_tokens (user_id, name, token, flags)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, name, token, flags, created_utc
            "#,
        )
        .bind(token.user_id)
        .bind(&token.name)
        .bind(&token.token)
        .bind(token.flags)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                ServiceError::NotFound("User not found".to_string())
            }
            _ => ServiceError::from_write(e, "Token secret collision"),
        })?;
        record(&mut tx, audit, created.id).await?;
        tx.commit().await?;
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_token(&self, id: i64) -> Result<Option<UserToken>, ServiceError> {
        Ok(sqlx::query_as::<_, UserToken>(
            "SELECT id, user_id, name, token, flags, created_utc FROM user_tokens WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    #[instrument(skip(self))]
    async fn list_tokens_by_user(&self, user_id: i64) -> Result<Vec<UserToken>, ServiceError> {
        Ok(sqlx::query_as::<_, UserToken>(
            r#"
            SELECT id, user_id, name, token, flags, created_utc
            FROM user_tokens
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    #[instrument(skip(self, token, audit), fields(token_id = token.id))]
    async fn update_token(
        &self,
        token: &UserToken,
        audit: Option<AuditDraft>,
    ) -> Result<UserToken, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query_as::<_, UserToken>(
            r#"
            UPDATE user_tokens SET name = $1, token = $2, flags = $3
            WHERE id = $4
            RETURNING id, user_id, name, token, flags, created_utc
            "#,
        )
        .bind(&token.name)
        .bind(&token.token)
        .bind(token.flags)
        .bind(token.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ServiceError::from_write(e, "Token secret collision"))?
        .ok_or_else(|| ServiceError::NotFound("Token not found".to_string()))?;
        record(&mut tx, audit, updated.id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self, audit))]
    async fn delete_token(&self, id: i64, audit: Option<AuditDraft>) -> Result<bool, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM user_tokens WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Ok(false);
        }
        record(&mut tx, audit, id).await?;
        tx.commit().await?;
        Ok(true)
    }

    #[instrument(skip(self, audit))]
    async fn create_realm(
        &self,
        name: &str,
        audit: Option<AuditDraft>,
    ) -> Result<Realm, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let realm = sqlx::query_as::<_, Realm>(
            "INSERT INTO realms (name) VALUES ($1) RETURNING id, name, created_utc",
        )
        .bind(name)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ServiceError::from_write(e, "Realm already exists"))?;
        record(&mut tx, audit, realm.id).await?;
        tx.commit().await?;
        Ok(realm)
    }

    #[instrument(skip(self))]
    async fn get_realm(&self, id: i64) -> Result<Option<Realm>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Realm>("SELECT id, name, created_utc FROM realms WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    #[instrument(skip(self))]
    async fn get_realm_by_name(&self, name: &str) -> Result<Option<Realm>, ServiceError> {
        let _timer = db_timer("get_realm_by_name");
        Ok(
            sqlx::query_as::<_, Realm>("SELECT id, name, created_utc FROM realms WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    #[instrument(skip(self))]
    async fn list_realms(&self) -> Result<Vec<Realm>, ServiceError> {
        Ok(
            sqlx::query_as::<_, Realm>("SELECT id, name, created_utc FROM realms ORDER BY name")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    #[instrument(skip(self, alias, audit))]
    async fn create_grant(
        &self,
        user_id: i64,
        realm_id: i64,
        alias: Option<&str>,
        audit: Option<AuditDraft>,
    ) -> Result<UserRealmGrant, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let grant = sqlx::query_as::<_, UserRealmGrant>(
            r#"
            INSERT INTO user_realm_grants (user_id, realm_id, alias)
            VALUES ($1, $2, $3)
            RETURNING user_id, realm_id, alias, created_utc
            "#,
        )
        .bind(user_id)
        .bind(realm_id)
        .bind(alias)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                ServiceError::NotFound("User or realm not found".to_string())
            }
            _ => ServiceError::from_write(e, "Grant already exists"),
        })?;
        record(&mut tx, audit, user_id).await?;
        tx.commit().await?;
        Ok(grant)
    }

    #[instrument(skip(self))]
    async fn get_grant_by_realm_name(
        &self,
        user_id: i64,
        realm_name: &str,
    ) -> Result<Option<UserRealmGrant>, ServiceError> {
        let _timer = db_timer("get_grant_by_realm_name");
        Ok(sqlx::query_as::<_, UserRealmGrant>(
            r#"
            SELECT g.user_id, g.realm_id, g.alias, g.created_utc
            FROM user_realm_grants g
            JOIN realms r ON r.id = g.realm_id
            WHERE g.user_id = $1 AND r.name = $2
            "#,
        )
        .bind(user_id)
        .bind(realm_name)
        .fetch_optional(&self.pool)
        .await?)
    }

    #[instrument(skip(self))]
    async fn list_grants_by_realm(
        &self,
        realm_id: i64,
    ) -> Result<Vec<UserRealmGrant>, ServiceError> {
        Ok(sqlx::query_as::<_, UserRealmGrant>(
            r#"
            SELECT user_id, realm_id, alias, created_utc
            FROM user_realm_grants
            WHERE realm_id = $1
            ORDER BY user_id
            "#,
        )
        .bind(realm_id)
        .fetch_all(&self.pool)
        .await?)
    }

    #[instrument(skip(self, alias, audit))]
    async fn update_grant_alias(
        &self,
        user_id: i64,
        realm_id: i64,
        alias: Option<&str>,
        audit: Option<AuditDraft>,
    ) -> Result<Option<UserRealmGrant>, ServiceError> {
        let mut tx = self.pool.begin().await?;
        let grant = sqlx::query_as::<_, UserRealmGrant>(
            r#"
            UPDATE user_realm_grants SET alias = $3
            WHERE user_id = $1 AND realm_id = $2
            RETURNING user_id, realm_id, alias, created_utc
            "#,
        )
        .bind(user_id)
        .bind(realm_id)
        .bind(alias)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(grant) = grant else {
            return Ok(None);
        };
        record(&mut tx, audit, user_id).await?;
        tx.commit().await?;
        Ok(Some(grant))
    }

    #[instrument(skip(self, entry), fields(action = entry.action.as_str(), user_id = entry.user_id))]
    async fn create_audit_entry(
        &self,
        entry: NewAuditLogEntry,
    ) -> Result<AuditLogEntry, ServiceError> {
        let _timer = db_timer("create_audit_entry");
        let mut conn = self.pool.acquire().await?;
        insert_audit(&mut conn, entry).await
    }

    #[instrument(skip(self))]
    async fn list_recent_audit_entries(
        &self,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, ServiceError> {
        Ok(sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT id, action, user_id, created_utc, data
            FROM audit_log
            ORDER BY created_utc DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}
