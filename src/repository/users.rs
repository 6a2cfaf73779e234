//! Users repository for database operations

use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::User,
};

use super::is_unique_violation;

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by uid
    pub async fn get_by_uid(&self, uid: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT uid, username, password, role FROM users WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} does not exist", uid)))
    }

    /// Get user by username (case-insensitive)
    pub async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT uid, username, password, role FROM users WHERE LOWER(username) = LOWER($1)",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Check if username already exists
    pub async fn username_exists(&self, username: &str, exclude_uid: Option<Uuid>) -> AppResult<bool> {
        let exists: bool = if let Some(uid) = exclude_uid {
            sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1) AND uid != $2)",
            )
            .bind(username)
            .bind(uid)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))")
                .bind(username)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    /// List all users ordered by username
    pub async fn list(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT uid, username, password, role FROM users ORDER BY LOWER(username)",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Insert a new user. `user.password` must already be hashed.
    pub async fn create(&self, user: &User) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (uid, username, password, role)
            VALUES ($1, $2, $3, $4)
            RETURNING uid, username, password, role
            "#,
        )
        .bind(user.uid)
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| username_conflict(e, &user.username))
    }

    /// Overwrite username, password hash and role
    pub async fn update(&self, user: &User) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET username = $1, password = $2, role = $3
            WHERE uid = $4
            RETURNING uid, username, password, role
            "#,
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.role)
        .bind(user.uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| username_conflict(e, &user.username))?
        .ok_or_else(|| AppError::NotFound(format!("User {} does not exist", user.uid)))
    }

    /// Delete a user unless it still holds a copy of some book.
    ///
    /// The account row stays locked until commit. A concurrent checkout
    /// inserting an event for this user waits on the same row, so it either
    /// lands first and the delete is refused, or fails its foreign key.
    /// Closed events keep the book history with the borrower cleared.
    pub async fn delete(&self, uid: Uuid) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let found: Option<Uuid> = sqlx::query_scalar("SELECT uid FROM users WHERE uid = $1 FOR UPDATE")
            .bind(uid)
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() {
            return Err(AppError::NotFound(format!("User {} does not exist", uid)));
        }

        let holds: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM checkout_events
                WHERE user_uid = $1 AND checked_out AND NOT returned
            )
            "#,
        )
        .bind(uid)
        .fetch_one(&mut *tx)
        .await?;
        if holds {
            return Err(AppError::Conflict(
                "Return all checked out books before deleting the account".to_string(),
            ));
        }

        sqlx::query("DELETE FROM users WHERE uid = $1")
            .bind(uid)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

fn username_conflict(error: sqlx::Error, username: &str) -> AppError {
    if is_unique_violation(&error) {
        AppError::Conflict(format!("Username {} is already taken", username))
    } else {
        AppError::Database(error)
    }
}
