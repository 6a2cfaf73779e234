//! Data models for Stacks

pub mod book;
pub mod user;

// Re-export commonly used types
pub use book::{Book, CheckoutEvent, CreateBook, UpdateBook};
pub use user::{CreateUser, Role, UpdateUser, User, UserClaims};
