//! Read receipt storage - A set of storage provider traits and types for the
//! read-receipt reconciliation engine.
//!
//! It is designed to be used in conjunction with the `rrk-core` crate.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod address;
pub mod error;
pub mod messages;
pub mod receipts;
pub mod settings;
#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-export identity newtypes for convenience
pub use address::{ServiceAddress, ThreadId};
pub use error::RrkStorageError;

use self::messages::MessageStorage;
use self::receipts::PendingReceiptStorage;
use self::settings::SettingsStorage;

/// Backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// Memory
    Memory,
    /// SQLite
    SQLite,
}

impl Backend {
    /// Check if it's a persistent backend
    ///
    /// All values different from [`Backend::Memory`] are considered persistent
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Memory)
    }
}

/// Storage provider for the read-receipt reconciliation engine.
///
/// This trait combines the three storage concerns the engine reads and
/// writes through: message lookup/mutation, the pending ("early") receipt
/// tables, and the read-receipts settings flag.
///
/// Implementors must also provide named snapshots. Snapshots are the storage
/// half of the engine's write-transaction facility: the engine creates a
/// snapshot before a batch of writes, releases it on commit, and rolls back
/// to it if the batch fails partway through.
pub trait RrkStorageProvider: MessageStorage + PendingReceiptStorage + SettingsStorage {
    /// Returns the backend type.
    ///
    /// # Returns
    ///
    /// The storage backend type (e.g., [`Backend::Memory`] or [`Backend::SQLite`]).
    fn backend(&self) -> Backend;

    /// Create a named snapshot/savepoint
    ///
    /// This creates a point in time that can be rolled back to later.
    /// In SQLite, this corresponds to `SAVEPOINT name`.
    /// In Memory, this captures a snapshot of the current state.
    fn create_named_snapshot(&self, name: &str) -> Result<(), RrkStorageError>;

    /// Rollback to a previously created snapshot
    ///
    /// This restores the state to what it was when the snapshot was created.
    /// In SQLite, this corresponds to `ROLLBACK TO name`.
    /// In Memory, this restores the captured snapshot.
    fn rollback_to_snapshot(&self, name: &str) -> Result<(), RrkStorageError>;

    /// Release/commit a snapshot (no longer needed)
    ///
    /// This frees resources associated with the snapshot.
    /// In SQLite, this corresponds to `RELEASE name`.
    fn release_snapshot(&self, name: &str) -> Result<(), RrkStorageError>;
}
