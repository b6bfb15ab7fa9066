//! Store error types.

use claims_core::PersistError;
use thiserror::Error;

/// Store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// LMDB error.
    #[error("database error: {0}")]
    Database(#[from] heed::Error),

    /// A record failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A key has the wrong length for its table.
    #[error("corrupt key in {table}: {len} bytes")]
    CorruptKey { table: &'static str, len: usize },

    /// The background writer has stopped.
    #[error("save queue is closed")]
    QueueClosed,
}

impl From<StoreError> for PersistError {
    fn from(err: StoreError) -> Self {
        Self::new(err)
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
