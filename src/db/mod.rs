//! Persistence boundary for user records.
//!
//! The account use cases only see [`UserRepository`]. [`Database`] wraps a
//! sqlite pool and hands out the sqlx-backed [`UserStore`];
//! [`MemoryUserStore`] is the in-process fake.

mod memory;
mod user;

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use uuid::Uuid;

use crate::user::User;

pub use memory::MemoryUserStore;
pub use user::UserStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0} is already in use")]
    Conflict(&'static str),
    #[error("user {0} does not exist")]
    NotFound(Uuid),
    #[error("stored user is corrupt: {0}")]
    Corrupt(String),
}

/// Optional equality filters for [`UserRepository::find_many`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
}

impl UserFilter {
    pub fn active_admins() -> Self {
        Self {
            is_active: Some(true),
            is_admin: Some(true),
        }
    }

    pub fn matches(&self, user: &User) -> bool {
        self.is_active.is_none_or(|active| user.is_active() == active)
            && self.is_admin.is_none_or(|admin| user.is_admin() == admin)
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    /// Expects an already normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;

    /// Usernames compare case-insensitively.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    /// Fails with [`RepositoryError::Conflict`] on a duplicate email or username.
    async fn create(&self, user: &User) -> Result<(), RepositoryError>;

    /// Overwrite every mutable field. Last write wins.
    async fn update(&self, user: &User) -> Result<(), RepositoryError>;

    /// Users matching `filter`, oldest first.
    async fn find_many(&self, filter: UserFilter) -> Result<Vec<User>, RepositoryError>;
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open or create a database at the given path.
    /// Use ":memory:" for an in-memory database.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let url = if path == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{}?mode=rwc", path)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    pub fn users(&self) -> UserStore {
        UserStore::new(self.pool.clone())
    }

    async fn get_version(&self) -> Result<i32, sqlx::Error> {
        let result: Option<(i32,)> = sqlx::query_as("SELECT version FROM schema_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(result.map(|r| r.0).unwrap_or(0))
    }

    async fn set_version(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        version: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM schema_version")
            .execute(&mut **tx)
            .await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
            .execute(&self.pool)
            .await?;

        let version = self.get_version().await?;

        if version < 1 {
            self.migrate_v1().await?;
        }

        Ok(())
    }

    /// Execute a list of queries in a transaction, then set the version.
    async fn run_migration(
        &self,
        version: i32,
        queries: &[&'static str],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for query in queries {
            sqlx::query(*query).execute(&mut *tx).await?;
        }
        Self::set_version(&mut tx, version).await?;
        tx.commit().await?;
        tracing::debug!(version, "Applied schema migration");
        Ok(())
    }

    async fn migrate_v1(&self) -> Result<(), sqlx::Error> {
        self.run_migration(
            1,
            &[
                // Username stays NULL until first activation.
                "CREATE TABLE users (
                    id TEXT PRIMARY KEY NOT NULL,
                    username TEXT UNIQUE COLLATE NOCASE,
                    email TEXT UNIQUE NOT NULL,
                    credential_hash TEXT NOT NULL DEFAULT '',
                    is_active INTEGER NOT NULL DEFAULT 0,
                    is_admin INTEGER NOT NULL DEFAULT 0,
                    has_activated_once INTEGER NOT NULL DEFAULT 0,
                    activation_token_version INTEGER NOT NULL DEFAULT 0,
                    password_token_version INTEGER NOT NULL DEFAULT 0,
                    access_token_version INTEGER NOT NULL DEFAULT 0,
                    refresh_token_version INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                "CREATE INDEX idx_users_active_admin ON users(is_active, is_admin)",
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_memory_database() {
        let db = Database::open(":memory:").await.unwrap();
        assert_eq!(db.get_version().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let db = Database::open(":memory:").await.unwrap();
        db.migrate().await.unwrap();
        assert_eq!(db.get_version().await.unwrap(), 1);
    }

    #[test]
    fn test_filter_matches() {
        let now = chrono::DateTime::UNIX_EPOCH;
        let mut user = User::create_pending("a@example.com", now);
        assert!(UserFilter::default().matches(&user));
        assert!(!UserFilter::active_admins().matches(&user));

        user.activate(now);
        user.promote_to_admin(now);
        assert!(UserFilter::active_admins().matches(&user));
        assert!(
            !UserFilter {
                is_active: Some(false),
                is_admin: None
            }
            .matches(&user)
        );
    }
}
