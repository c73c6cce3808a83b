//! Provider-level storage errors.

/// Errors raised by the snapshot/savepoint surface of a storage provider.
#[derive(Debug, thiserror::Error)]
pub enum RrkStorageError {
    /// The named snapshot does not exist
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// Backend I/O failure. Fatal to the enclosing transaction.
    #[error("Database error: {0}")]
    Database(String),
}
