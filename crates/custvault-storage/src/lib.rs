//! Storage layer for custvault
//!
//! This crate provides:
//! - A pooled database handle (MySQL or SQLite through the sqlx `Any` driver)
//!   that reconnects once when the connection drops
//! - The `customers` schema and demo seed rows
//! - The customer repository, which routes every field through the codec

pub mod db;
pub mod error;
pub mod repository;
pub mod schema;

pub use db::{Database, DatabaseTarget};
pub use error::{Result, StorageError};
pub use repository::{CustomerRepository, DEFAULT_LIMIT};
pub use schema::DatabaseKind;
