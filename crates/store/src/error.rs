use thiserror::Error;

/// Errors that can occur when reading or mutating carts and orders.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested cart, order or food item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The row exists but belongs to another user.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The request conflicts with the current state of the row
    /// (inactive cart, mixed restaurants, duplicate session).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The request itself is malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The backing store rejected the operation before anything was committed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
