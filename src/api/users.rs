//! User management endpoints

use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::user::{CreateUser, UpdateUser, User},
};

use super::{AuthenticatedUser, Json, Path};

/// List users (librarians only)
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "List of users", body = Vec<User>),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Librarian role required")
    )
)]
pub async fn list_users(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<User>>> {
    claims.require_librarian()?;

    let users = state.services.users.list_users().await?;
    Ok(Json(users))
}

/// Get user by uid
#[utoipa::path(
    get,
    path = "/user/{uid}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("uid" = Uuid, Path, description = "User uid")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<crate::AppState>,
    Path(uid): Path<Uuid>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_by_uid(uid).await?;
    Ok(Json(user))
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/user",
    tag = "users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input or role"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn create_user(
    State(state): State<crate::AppState>,
    Json(user): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let created = state.services.users.register(user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a user (self only)
#[utoipa::path(
    patch,
    path = "/user/{uid}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("uid" = Uuid, Path, description = "User uid")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Not the owner of this account"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn update_user(
    State(state): State<crate::AppState>,
    Path(uid): Path<Uuid>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(update): Json<UpdateUser>,
) -> AppResult<Json<User>> {
    claims.require_self(uid)?;

    let updated = state.services.users.update_user(uid, update).await?;
    Ok(Json(updated))
}

/// Update the calling user
#[utoipa::path(
    patch,
    path = "/user",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn update_me(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(update): Json<UpdateUser>,
) -> AppResult<Json<User>> {
    let updated = state.services.users.update_user(claims.uid, update).await?;
    Ok(Json(updated))
}

/// Delete a user (self only)
#[utoipa::path(
    delete,
    path = "/user/{uid}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("uid" = Uuid, Path, description = "User uid")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Not the owner of this account"),
        (status = 404, description = "User not found"),
        (status = 409, description = "User still holds books")
    )
)]
pub async fn delete_user(
    State(state): State<crate::AppState>,
    Path(uid): Path<Uuid>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<StatusCode> {
    claims.require_self(uid)?;

    state.services.users.delete_user(uid).await?;
    Ok(StatusCode::NO_CONTENT)
}
