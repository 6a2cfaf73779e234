//! Checkout and return of book copies

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::Book,
    repository::Repository,
};

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
}

impl CirculationService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Lend one copy of a book to the calling user
    pub async fn checkout(&self, isbn: &str, user: Uuid) -> AppResult<Book> {
        let book = self.repository.books.checkout(isbn, user).await.map_err(|e| {
            if matches!(e, AppError::Unavailable(_)) {
                tracing::debug!(isbn = %isbn, user = %user, "Checkout refused, no copy left");
            }
            e
        })?;

        tracing::info!(
            isbn = %isbn,
            user = %user,
            inventory = book.inventory,
            open = book.open_checkouts().count(),
            "Book checked out"
        );
        Ok(book)
    }

    /// Take back one copy of a book from the calling user
    pub async fn return_copy(&self, isbn: &str, user: Uuid) -> AppResult<Book> {
        let book = self.repository.books.return_copy(isbn, user).await?;

        tracing::info!(
            isbn = %isbn,
            user = %user,
            inventory = book.inventory,
            open = book.open_checkouts().count(),
            "Book returned"
        );
        Ok(book)
    }

    /// Books the user currently holds
    pub async fn holds_of(&self, user: Uuid) -> AppResult<Vec<Book>> {
        self.repository.users.get_by_uid(user).await?;
        self.repository.books.held_by(user).await
    }
}
