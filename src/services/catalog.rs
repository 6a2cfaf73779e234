//! Catalog management service

use chrono::Utc;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, CreateBook, UpdateBook},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// All books with their checkout history
    pub async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.repository.books.list().await
    }

    /// Get book by ISBN
    pub async fn get_book(&self, isbn: &str) -> AppResult<Book> {
        self.repository.books.get_by_isbn(isbn).await
    }

    /// Create a new book
    pub async fn create_book(&self, book: CreateBook) -> AppResult<Book> {
        book.validate()?;

        if self.repository.books.exists(&book.isbn).await? {
            return Err(AppError::Conflict(format!("Book {} already exists", book.isbn)));
        }

        let created = self.repository.books.create(&book.into_book(Utc::now())).await?;
        tracing::info!(isbn = %created.isbn, inventory = created.inventory, "Book created");
        Ok(created)
    }

    /// Update catalog fields of a book
    pub async fn update_book(&self, isbn: &str, update: UpdateBook) -> AppResult<Book> {
        update.validate()?;

        if let Some(ref body_isbn) = update.isbn {
            if body_isbn != isbn {
                return Err(AppError::BadRequest(format!(
                    "ISBN {} in body does not match {}",
                    body_isbn, isbn
                )));
            }
        }

        let updated = self.repository.books.update(isbn, update).await?;
        tracing::info!(isbn = %updated.isbn, inventory = updated.inventory, "Book updated");
        Ok(updated)
    }

    /// Update a book addressed by the `isbn` field of the request body
    pub async fn update_book_from_body(&self, update: UpdateBook) -> AppResult<Book> {
        let isbn = update
            .isbn
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::BadRequest("invalid ISBN".to_string()))?;
        self.update_book(&isbn, update).await
    }

    /// Delete a book and its history
    pub async fn delete_book(&self, isbn: &str) -> AppResult<()> {
        self.repository.books.delete(isbn).await?;
        tracing::info!(isbn = %isbn, "Book deleted");
        Ok(())
    }
}
