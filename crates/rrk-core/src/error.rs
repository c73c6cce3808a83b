//! Error types for the reconciliation engine.
//!
//! Business-logic absence (a receipt arriving before its message) is never
//! an error here; it is the expected early-arrival path. Only storage and
//! system failures surface as [`Error`].

use rrk_storage_traits::RrkStorageError;

/// Errors raised by the reconciliation engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Message storage error
    #[error("Message error: {0}")]
    Message(String),

    /// Pending receipt storage error
    #[error("Receipt error: {0}")]
    Receipt(String),

    /// Settings storage error
    #[error("Settings error: {0}")]
    Settings(String),

    /// Snapshot/savepoint error from the storage provider
    #[error("Storage error: {0}")]
    Storage(#[from] RrkStorageError),
}
