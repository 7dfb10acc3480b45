use thiserror::Error;

/// Database access failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("table {0} does not exist")]
    MissingTable(String),

    #[error("table {table} has the wrong shape for {operation}")]
    WrongTableKind { table: String, operation: String },

    #[error("bulk load into {table} failed: {reason}")]
    Load { table: String, reason: String },

    #[error("invalid geometry '{0}'")]
    InvalidGeometry(String),
}
