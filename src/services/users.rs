//! Authentication and user management service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{CreateUser, Role, UpdateUser, User, UserClaims},
    repository::Repository,
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate user by username and return a JWT token
    pub async fn authenticate(&self, username: &str, password: &str) -> AppResult<(String, User)> {
        let user = self
            .repository
            .users
            .get_by_username(username)
            .await?
            .ok_or_else(invalid_credentials)?;

        if !verify_password(&user.password, password)? {
            tracing::debug!(username = %username, "Rejected login, wrong password");
            return Err(invalid_credentials());
        }

        let token = self.create_token_for_user(&user)?;
        tracing::info!(user = %user.uid, "User logged in");
        Ok((token, user))
    }

    /// Create JWT token for a user
    pub fn create_token_for_user(&self, user: &User) -> AppResult<String> {
        UserClaims::for_user(user, self.config.jwt_expiration_hours)?
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Validate a bearer token
    pub fn verify_token(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))
    }

    /// Check a verified token against the stored account.
    ///
    /// A deleted account is rejected and a changed role applies at once,
    /// without waiting for the token to expire.
    pub async fn authorize(&self, mut claims: UserClaims) -> AppResult<UserClaims> {
        match self.repository.users.get_by_uid(claims.uid).await {
            Ok(user) => {
                if user.role != claims.role {
                    tracing::debug!(user = %user.uid, role = %user.role, "Token role is stale");
                }
                claims.sync_with(&user);
                Ok(claims)
            }
            Err(AppError::NotFound(_)) => {
                Err(AppError::Authentication("Unknown user".to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Get user by uid
    pub async fn get_by_uid(&self, uid: Uuid) -> AppResult<User> {
        self.repository.users.get_by_uid(uid).await
    }

    /// All users
    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.repository.users.list().await
    }

    /// Register a new user
    pub async fn register(&self, user: CreateUser) -> AppResult<User> {
        user.validate()?;

        let role = match user.role.as_deref() {
            Some(role) => role.parse()?,
            None => Role::User,
        };

        if self.repository.users.username_exists(&user.username, None).await? {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }

        let created = self
            .repository
            .users
            .create(&User {
                uid: Uuid::new_v4(),
                username: user.username,
                password: hash_password(&user.password)?,
                role,
            })
            .await?;

        tracing::info!(user = %created.uid, role = %created.role, "User registered");
        Ok(created)
    }

    /// Update the calling user. Empty fields keep their current value.
    pub async fn update_user(&self, uid: Uuid, update: UpdateUser) -> AppResult<User> {
        let mut user = self.repository.users.get_by_uid(uid).await?;

        if let Some(role) = update.role()? {
            user.role = role;
        }

        if let Some(username) = update.username() {
            if username.len() < 3 {
                return Err(AppError::Validation(
                    "Username must be at least 3 characters".to_string(),
                ));
            }
            if self.repository.users.username_exists(username, Some(uid)).await? {
                return Err(AppError::Conflict("Username is already taken".to_string()));
            }
            user.username = username.to_string();
        }

        if let Some(password) = update.password() {
            user.password = hash_password(password)?;
        }

        self.repository.users.update(&user).await
    }

    /// Delete a user. Refused while the user still holds books.
    pub async fn delete_user(&self, uid: Uuid) -> AppResult<()> {
        self.repository.users.delete(uid).await?;
        tracing::info!(user = %uid, "User deleted");
        Ok(())
    }
}

fn invalid_credentials() -> AppError {
    AppError::Authentication("Invalid username or password".to_string())
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check `password` against a stored Argon2 hash
pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
