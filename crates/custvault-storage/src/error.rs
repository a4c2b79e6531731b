//! Error types for custvault-storage

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Connection lost and the single reconnect-and-retry did not help.
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    #[error("Customer {0} not found")]
    NotFound(i64),

    #[error("Unsupported database URL scheme: {0}")]
    UnsupportedUrl(String),

    #[error("Invalid database name '{0}': only letters, digits and '_' are allowed")]
    InvalidDatabaseName(String),

    #[error(transparent)]
    Core(#[from] custvault_core::Error),
}
