//! User model and related types

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Librarian,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Librarian => "LIBRARIAN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "LIBRARIAN" => Ok(Role::Librarian),
            _ => Err(AppError::Validation(
                "valid roles are `USER` & `LIBRARIAN`".to_string(),
            )),
        }
    }
}

// Stored as VARCHAR
impl sqlx::Type<Postgres> for Role {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for Role {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as Decode<Postgres>>::decode(value)?;
        s.parse().map_err(|e: AppError| e.to_string().into())
    }
}

impl Encode<'_, Postgres> for Role {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub uid: Uuid,
    pub username: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing, default)]
    pub password: String,
    pub role: Role,
}

/// Registration request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 3, message = "Username must be at least 3 characters"))]
    pub username: String,
    #[validate(length(min = 4, message = "Password must be at least 4 characters"))]
    pub password: String,
    /// `USER` or `LIBRARIAN`, defaults to `USER`
    pub role: Option<String>,
}

/// Partial update of the calling user.
///
/// Empty or missing fields keep their current value.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

impl UpdateUser {
    /// Non-empty username, if any
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().filter(|s| !s.is_empty())
    }

    /// Non-empty password, if any
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|s| !s.is_empty())
    }

    /// Parsed role, if one was given
    pub fn role(&self) -> Result<Option<Role>, AppError> {
        match self.role.as_deref().filter(|s| !s.is_empty()) {
            Some(role) => role.parse().map(Some),
            None => Ok(None),
        }
    }
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub uid: Uuid,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Claims for `user`, valid for `hours` from now
    pub fn for_user(user: &User, hours: u64) -> Result<Self, AppError> {
        let now = Utc::now().timestamp();
        let exp = i64::try_from(hours)
            .ok()
            .and_then(|h| h.checked_mul(3600))
            .and_then(|secs| now.checked_add(secs))
            .ok_or_else(|| {
                AppError::Internal(format!("Token lifetime of {} hours is out of range", hours))
            })?;

        Ok(Self {
            sub: user.username.clone(),
            uid: user.uid,
            role: user.role,
            exp,
            iat: now,
        })
    }

    /// Take username and role from the stored account, which win over
    /// whatever the token was issued with
    pub fn sync_with(&mut self, user: &User) {
        self.sub = user.username.clone();
        self.role = user.role;
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_librarian(&self) -> bool {
        self.role == Role::Librarian
    }

    pub fn require_librarian(&self) -> Result<(), AppError> {
        if self.is_librarian() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "the requested action can only be fulfilled by LIBRARIAN users".to_string(),
            ))
        }
    }

    /// Only the owner may mutate its own account
    pub fn require_self(&self, uid: Uuid) -> Result<(), AppError> {
        if self.uid == uid {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "unauthorized to mutate an unowned resource".to_string(),
            ))
        }
    }

    pub fn require_self_or_librarian(&self, uid: Uuid) -> Result<(), AppError> {
        if self.is_librarian() {
            return Ok(());
        }
        self.require_self(uid)
    }
}
