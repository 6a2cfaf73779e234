//! Book model and the inventory ledger rules.
//!
//! A book owns an `inventory` count of copies on the shelf and an ordered,
//! append-only list of checkout events. Checkout and return are pure
//! transitions on [`Book`]; the repository persists their outcome inside a
//! transaction holding the book's row lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// One hold on a copy of a book. Closed in place on return, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutEvent {
    /// Position in the book's event list
    pub seq: i32,
    /// Borrower uid, `None` once the account has been deleted
    pub user: Option<Uuid>,
    pub checked_out: bool,
    pub returned: bool,
    pub quantity: i32,
    pub checkout_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
}

impl CheckoutEvent {
    pub fn is_open(&self) -> bool {
        self.checked_out && !self.returned
    }

    pub fn is_open_for(&self, user: Uuid) -> bool {
        self.is_open() && self.user == Some(user)
    }
}

/// Row structure for the `books` table
#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub image: Option<String>,
    pub description: Option<String>,
    pub inventory: i32,
    pub updated_at: DateTime<Utc>,
}

impl BookRow {
    pub fn with_states(self, states: Vec<CheckoutEvent>) -> Book {
        Book {
            isbn: self.isbn,
            title: self.title,
            author: self.author,
            image: self.image,
            description: self.description,
            inventory: self.inventory,
            states,
            updated_at: self.updated_at,
        }
    }
}

/// Catalog entry with its checkout history
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub image: Option<String>,
    pub description: Option<String>,
    /// Copies currently on the shelf
    pub inventory: i32,
    pub states: Vec<CheckoutEvent>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.inventory > 0
    }

    pub fn open_checkouts(&self) -> impl Iterator<Item = &CheckoutEvent> {
        self.states.iter().filter(|s| s.is_open())
    }

    fn next_seq(&self) -> i32 {
        self.states.iter().map(|s| s.seq).max().map_or(0, |seq| seq + 1)
    }

    /// Lend one copy to `user`.
    ///
    /// Fails with [`AppError::Unavailable`] and leaves the book untouched
    /// when no copy is on the shelf.
    pub fn checkout(&mut self, user: Uuid, at: DateTime<Utc>) -> AppResult<&CheckoutEvent> {
        if !self.is_available() {
            return Err(AppError::Unavailable(self.isbn.clone()));
        }

        let event = CheckoutEvent {
            seq: self.next_seq(),
            user: Some(user),
            checked_out: true,
            returned: false,
            quantity: 1,
            checkout_date: at,
            return_date: None,
        };

        self.inventory -= 1;
        self.updated_at = at;
        self.states.push(event);
        Ok(&self.states[self.states.len() - 1])
    }

    /// Take back one copy from `user`, closing its oldest open event.
    pub fn return_copy(&mut self, user: Uuid, at: DateTime<Utc>) -> AppResult<&CheckoutEvent> {
        let index = self
            .states
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_open_for(user))
            .min_by_key(|(_, s)| s.seq)
            .map(|(i, _)| i)
            .ok_or_else(|| AppError::NoActiveCheckout(self.isbn.clone()))?;

        self.inventory = self
            .inventory
            .checked_add(1)
            .ok_or_else(|| AppError::Internal(format!("Inventory overflow on book {}", self.isbn)))?;
        self.updated_at = at;

        let event = &mut self.states[index];
        event.checked_out = false;
        event.returned = true;
        event.return_date = Some(at);
        Ok(&*event)
    }

    /// Apply a librarian's partial update. The event list is never touched.
    pub fn apply(&mut self, update: UpdateBook, at: DateTime<Utc>) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(author) = update.author {
            self.author = author;
        }
        if let Some(image) = update.image {
            self.image = Some(image);
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(inventory) = update.inventory {
            self.inventory = inventory;
        }
        self.updated_at = at;
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 32, message = "ISBN must be 1 to 32 characters"))]
    pub isbn: String,
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    pub author: String,
    pub image: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Inventory cannot be negative"))]
    pub inventory: i32,
}

impl CreateBook {
    pub fn into_book(self, at: DateTime<Utc>) -> Book {
        Book {
            isbn: self.isbn,
            title: self.title,
            author: self.author,
            image: self.image,
            description: self.description,
            inventory: self.inventory,
            states: Vec::new(),
            updated_at: at,
        }
    }
}

/// Update book request. `isbn` is only read when the book is not addressed
/// by path.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    pub isbn: Option<String>,
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub author: Option<String>,
    pub image: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Inventory cannot be negative"))]
    pub inventory: Option<i32>,
}
