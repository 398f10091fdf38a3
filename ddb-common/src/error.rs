//! Common error types for DiscourseDB

use thiserror::Error;

/// Common result type for DiscourseDB operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the DiscourseDB crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Precondition violated by a caller (empty name, empty type string, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Optimistic version check failed: the row changed since it was read
    #[error("Version conflict on {entity} {id}: expected version {expected}")]
    VersionConflict {
        entity: &'static str,
        id: i64,
        expected: i64,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for the common "empty argument" precondition
    pub fn empty(what: &str) -> Self {
        Error::InvalidInput(format!("{} cannot be empty", what))
    }
}
