//! Checkout and return endpoints

use axum::extract::State;
use uuid::Uuid;

use crate::{error::AppResult, models::book::Book};

use super::{AuthenticatedUser, Json, Path};

/// Check out one copy of a book for the calling user
#[utoipa::path(
    post,
    path = "/checkout/{isbn}",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(
        ("isbn" = String, Path, description = "Book ISBN")
    ),
    responses(
        (status = 200, description = "Book checked out, updated book returned", body = Book),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No copy available")
    )
)]
pub async fn checkout_book(
    State(state): State<crate::AppState>,
    Path(isbn): Path<String>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Book>> {
    let book = state.services.circulation.checkout(&isbn, claims.uid).await?;
    Ok(Json(book))
}

/// Return one copy of a book held by the calling user
#[utoipa::path(
    post,
    path = "/return/{isbn}",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(
        ("isbn" = String, Path, description = "Book ISBN")
    ),
    responses(
        (status = 200, description = "Book returned, updated book returned", body = Book),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No active checkout")
    )
)]
pub async fn return_book(
    State(state): State<crate::AppState>,
    Path(isbn): Path<String>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Book>> {
    let book = state.services.circulation.return_copy(&isbn, claims.uid).await?;
    Ok(Json(book))
}

/// Books a user currently holds
#[utoipa::path(
    get,
    path = "/user/{uid}/checkouts",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(
        ("uid" = Uuid, Path, description = "User uid")
    ),
    responses(
        (status = 200, description = "Books with an open checkout by this user", body = Vec<Book>),
        (status = 403, description = "Not this user and not a librarian"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_checkouts(
    State(state): State<crate::AppState>,
    Path(uid): Path<Uuid>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Book>>> {
    claims.require_self_or_librarian(uid)?;

    let books = state.services.circulation.holds_of(uid).await?;
    Ok(Json(books))
}
