//! # User Repository
//!
//! Local dashboard accounts. Passwords arrive here already hashed; this
//! crate never sees plaintext.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use super::db_timestamp;
use crate::error::{DbError, DbResult};
use healthguard_core::{User, UserRole};

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    uuid: String,
    username: String,
    password_hash: String,
    role: UserRole,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            uuid: row.uuid,
            username: row.username,
            password_hash: row.password_hash,
            role: row.role,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

const USER_COLUMNS: &str = "id, uuid, username, password_hash, role, is_active, created_at";

/// Repository for dashboard users.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates an active user.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` if the username is taken.
    pub async fn create(
        &self,
        username: &str,
        password_hash: &str,
        role: UserRole,
    ) -> DbResult<User> {
        let sql = format!(
            "INSERT INTO users (uuid, username, password_hash, role, is_active, created_at) \
             VALUES (?1, ?2, ?3, ?4, 1, ?5) \
             RETURNING {USER_COLUMNS}"
        );

        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(username)
            .bind(password_hash)
            .bind(role)
            .bind(db_timestamp(&Utc::now()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                DbError::UniqueViolation { .. } => DbError::duplicate("username", username),
                other => other,
            })?;

        info!(username = %row.username, role = %row.role, "User created");
        Ok(row.into())
    }

    /// Looks up a user by username.
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        debug!(username, found = row.is_some(), "User lookup");
        Ok(row.map(User::from))
    }

    /// Looks up a user by external id.
    pub async fn get_by_uuid(&self, uuid: &str) -> DbResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE uuid = ?1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(User::from))
    }

    /// Counts all users.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Enables or disables an account.
    pub async fn set_active(&self, uuid: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = ?2 WHERE uuid = ?1")
            .bind(uuid)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", uuid));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};

    use super::*;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();
        assert_eq!(repo.count().await.unwrap(), 0);

        let user = repo
            .create("admin", "$argon2id$v=19$fake", UserRole::Admin)
            .await
            .unwrap();
        assert!(user.is_active);
        assert!(user.is_admin());

        let found = repo.get_by_username("admin").await.unwrap().unwrap();
        assert_eq!(found.uuid, user.uuid);
        assert_eq!(found.password_hash, "$argon2id$v=19$fake");
        assert_eq!(found.role, UserRole::Admin);

        let by_uuid = repo.get_by_uuid(&user.uuid).await.unwrap().unwrap();
        assert_eq!(by_uuid.id, user.id);

        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();
        repo.create("nurse", "h", UserRole::Viewer).await.unwrap();

        let err = repo.create("nurse", "h2", UserRole::Viewer).await.unwrap_err();
        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "username");
                assert_eq!(value, "nurse");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deactivate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();
        let user = repo.create("temp", "h", UserRole::Viewer).await.unwrap();

        repo.set_active(&user.uuid, false).await.unwrap();
        assert!(!repo.get_by_uuid(&user.uuid).await.unwrap().unwrap().is_active);

        assert!(repo.set_active("missing", true).await.is_err());
    }
}
