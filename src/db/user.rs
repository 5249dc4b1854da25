use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use uuid::Uuid;

use super::{RepositoryError, UserFilter, UserRepository};
use crate::user::{TokenVersions, User, UserRecord};

/// sqlite-backed [`UserRepository`].
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: String,
    username: Option<String>,
    email: String,
    credential_hash: String,
    is_active: bool,
    is_admin: bool,
    has_activated_once: bool,
    activation_token_version: i64,
    password_token_version: i64,
    access_token_version: i64,
    refresh_token_version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn version(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| RepositoryError::Corrupt(format!("{column} = {value}")))
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| RepositoryError::Corrupt(format!("id {}: {}", row.id, e)))?;
        Ok(User::from(UserRecord {
            id,
            username: row.username.unwrap_or_default(),
            email: row.email,
            credential_hash: row.credential_hash,
            is_active: row.is_active,
            is_admin: row.is_admin,
            has_activated_once: row.has_activated_once,
            versions: TokenVersions {
                activation: version("activation_token_version", row.activation_token_version)?,
                password: version("password_token_version", row.password_token_version)?,
                access: version("access_token_version", row.access_token_version)?,
                refresh: version("refresh_token_version", row.refresh_token_version)?,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}

/// Map unique-constraint failures to [`RepositoryError::Conflict`].
fn write_error(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let field = if db_err.message().contains("users.email") {
                "email"
            } else {
                "username"
            };
            return RepositoryError::Conflict(field);
        }
    }
    RepositoryError::Database(e)
}

fn stored_username(record: &UserRecord) -> Option<&str> {
    (!record.username.is_empty()).then_some(record.username.as_str())
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, sql: &'static str, key: &str) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(User::try_from).transpose()
    }
}

#[async_trait]
impl UserRepository for UserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        self.find_one("SELECT * FROM users WHERE id = ?", &id.to_string())
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        self.find_one("SELECT * FROM users WHERE email = ?", email)
            .await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        if username.is_empty() {
            return Ok(None);
        }
        self.find_one("SELECT * FROM users WHERE username = ?", username)
            .await
    }

    async fn create(&self, user: &User) -> Result<(), RepositoryError> {
        let record = user.as_record();
        sqlx::query(
            "INSERT INTO users (
                id, username, email, credential_hash, is_active, is_admin, has_activated_once,
                activation_token_version, password_token_version,
                access_token_version, refresh_token_version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(stored_username(record))
        .bind(&record.email)
        .bind(&record.credential_hash)
        .bind(record.is_active)
        .bind(record.is_admin)
        .bind(record.has_activated_once)
        .bind(i64::from(record.versions.activation))
        .bind(i64::from(record.versions.password))
        .bind(i64::from(record.versions.access))
        .bind(i64::from(record.versions.refresh))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), RepositoryError> {
        let record = user.as_record();
        let result = sqlx::query(
            "UPDATE users SET
                username = ?, email = ?, credential_hash = ?,
                is_active = ?, is_admin = ?, has_activated_once = ?,
                activation_token_version = ?, password_token_version = ?,
                access_token_version = ?, refresh_token_version = ?,
                updated_at = ?
            WHERE id = ?",
        )
        .bind(stored_username(record))
        .bind(&record.email)
        .bind(&record.credential_hash)
        .bind(record.is_active)
        .bind(record.is_admin)
        .bind(record.has_activated_once)
        .bind(i64::from(record.versions.activation))
        .bind(i64::from(record.versions.password))
        .bind(i64::from(record.versions.access))
        .bind(i64::from(record.versions.refresh))
        .bind(record.updated_at)
        .bind(record.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(record.id));
        }
        Ok(())
    }

    async fn find_many(&self, filter: UserFilter) -> Result<Vec<User>, RepositoryError> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT * FROM users
            WHERE (?1 IS NULL OR is_active = ?1)
              AND (?2 IS NULL OR is_admin = ?2)
            ORDER BY created_at, id",
        )
        .bind(filter.is_active)
        .bind(filter.is_admin)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(User::try_from).collect()
    }
}
