//! Books repository for database operations

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{FromRow, Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookRow, CheckoutEvent, UpdateBook},
};

use super::{is_foreign_key_violation, is_unique_violation};

const BOOK_COLUMNS: &str =
    "isbn, title, author, image, description, inventory, updated_at";

const EVENT_COLUMNS: &str = r#"seq, user_uid AS "user", checked_out, returned, quantity, checkout_date, return_date"#;

#[derive(FromRow)]
struct EventRow {
    book_isbn: String,
    #[sqlx(flatten)]
    event: CheckoutEvent,
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get all books with their checkout events, ordered by title
    pub async fn list(&self) -> AppResult<Vec<Book>> {
        let rows = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {} FROM books ORDER BY title, isbn",
            BOOK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let events = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT book_isbn, {} FROM checkout_events ORDER BY book_isbn, seq",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut states: HashMap<String, Vec<CheckoutEvent>> = HashMap::new();
        for row in events {
            states.entry(row.book_isbn).or_default().push(row.event);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let events = states.remove(&row.isbn).unwrap_or_default();
                row.with_states(events)
            })
            .collect())
    }

    /// Get book by ISBN
    pub async fn get_by_isbn(&self, isbn: &str) -> AppResult<Book> {
        let row = sqlx::query_as::<_, BookRow>(&format!(
            "SELECT {} FROM books WHERE isbn = $1",
            BOOK_COLUMNS
        ))
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| book_not_found(isbn))?;

        let states = sqlx::query_as::<_, CheckoutEvent>(&format!(
            "SELECT {} FROM checkout_events WHERE book_isbn = $1 ORDER BY seq",
            EVENT_COLUMNS
        ))
        .bind(isbn)
        .fetch_all(&self.pool)
        .await?;

        Ok(row.with_states(states))
    }

    /// Books with at least one open checkout held by `user`
    pub async fn held_by(&self, user: Uuid) -> AppResult<Vec<Book>> {
        let isbns: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT b.isbn
            FROM books b
            JOIN checkout_events e ON e.book_isbn = b.isbn
            WHERE e.user_uid = $1 AND e.checked_out AND NOT e.returned
            ORDER BY b.isbn
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        let mut books = Vec::with_capacity(isbns.len());
        for isbn in isbns {
            books.push(self.get_by_isbn(&isbn).await?);
        }
        books.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(books)
    }

    /// Check if a book exists
    pub async fn exists(&self, isbn: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1)")
            .bind(isbn)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Insert a new book. States of a new book are always empty.
    pub async fn create(&self, book: &Book) -> AppResult<Book> {
        sqlx::query(
            r#"
            INSERT INTO books (isbn, title, author, image, description, inventory, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&book.isbn)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.image)
        .bind(&book.description)
        .bind(book.inventory)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Book {} already exists", book.isbn))
            } else {
                AppError::Database(e)
            }
        })?;

        self.get_by_isbn(&book.isbn).await
    }

    /// Update catalog fields of a book
    pub async fn update(&self, isbn: &str, update: UpdateBook) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        let mut book = lock_book(&mut tx, isbn).await?;

        book.apply(update, Utc::now());

        sqlx::query(
            r#"
            UPDATE books
            SET title = $1, author = $2, image = $3, description = $4, inventory = $5, updated_at = $6
            WHERE isbn = $7
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.image)
        .bind(&book.description)
        .bind(book.inventory)
        .bind(book.updated_at)
        .bind(isbn)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(book)
    }

    /// Delete a book and its checkout history
    pub async fn delete(&self, isbn: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE isbn = $1")
            .bind(isbn)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(book_not_found(isbn));
        }
        Ok(())
    }

    /// Lend one copy of `isbn` to `user`
    pub async fn checkout(&self, isbn: &str, user: Uuid) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        let mut book = lock_book(&mut tx, isbn).await?;

        let event = book.checkout(user, Utc::now())?.clone();

        sqlx::query(
            r#"
            INSERT INTO checkout_events
                (book_isbn, seq, user_uid, checked_out, returned, quantity, checkout_date, return_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(isbn)
        .bind(event.seq)
        .bind(event.user)
        .bind(event.checked_out)
        .bind(event.returned)
        .bind(event.quantity)
        .bind(event.checkout_date)
        .bind(event.return_date)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // account deleted after the token was checked
            if is_foreign_key_violation(&e) {
                AppError::Authentication("Unknown user".to_string())
            } else {
                AppError::Database(e)
            }
        })?;

        write_inventory(&mut tx, &book).await?;
        tx.commit().await?;

        Ok(book)
    }

    /// Take back one copy of `isbn` from `user`
    pub async fn return_copy(&self, isbn: &str, user: Uuid) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;
        let mut book = lock_book(&mut tx, isbn).await?;

        let event = book.return_copy(user, Utc::now())?.clone();

        sqlx::query(
            r#"
            UPDATE checkout_events
            SET checked_out = $1, returned = $2, return_date = $3
            WHERE book_isbn = $4 AND seq = $5
            "#,
        )
        .bind(event.checked_out)
        .bind(event.returned)
        .bind(event.return_date)
        .bind(isbn)
        .bind(event.seq)
        .execute(&mut *tx)
        .await?;

        write_inventory(&mut tx, &book).await?;
        tx.commit().await?;

        Ok(book)
    }
}

fn book_not_found(isbn: &str) -> AppError {
    AppError::NotFound(format!("Book {} does not exist", isbn))
}

/// Load a book under `FOR UPDATE` so concurrent ledger transitions serialize
async fn lock_book(tx: &mut Transaction<'_, Postgres>, isbn: &str) -> AppResult<Book> {
    let row = sqlx::query_as::<_, BookRow>(&format!(
        "SELECT {} FROM books WHERE isbn = $1 FOR UPDATE",
        BOOK_COLUMNS
    ))
    .bind(isbn)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| book_not_found(isbn))?;

    let states = sqlx::query_as::<_, CheckoutEvent>(&format!(
        "SELECT {} FROM checkout_events WHERE book_isbn = $1 ORDER BY seq",
        EVENT_COLUMNS
    ))
    .bind(isbn)
    .fetch_all(&mut **tx)
    .await?;

    Ok(row.with_states(states))
}

async fn write_inventory(tx: &mut Transaction<'_, Postgres>, book: &Book) -> AppResult<()> {
    sqlx::query("UPDATE books SET inventory = $1, updated_at = $2 WHERE isbn = $3")
        .bind(book.inventory)
        .bind(book.updated_at)
        .bind(&book.isbn)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
