use thiserror::Error;

use crate::models::RecordKind;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Input rejected before any write was attempted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced record does not exist.
    #[error("{kind} record {id} not found")]
    NotFound { kind: RecordKind, id: i32 },

    /// The underlying database rejected or failed an operation.
    #[error("storage error: {0}")]
    Storage(#[from] diesel::result::Error),

    #[error("connection error: {0}")]
    Connection(#[from] diesel::result::ConnectionError),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("configuration error: {0}")]
    Config(String),
}
