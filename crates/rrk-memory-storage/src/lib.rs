//! Memory-based storage implementation for the read-receipt reconciliation kit.
//!
//! This module provides a memory-based storage implementation for the
//! reconciliation engine. It implements the `RrkStorageProvider` trait,
//! allowing it to be used wherever the engine expects a storage backend.
//!
//! Memory-based storage is non-persistent and will be cleared when the
//! application terminates. It's useful for testing or ephemeral applications
//! where persistence isn't required.
//!
//! # Snapshot Architecture
//!
//! This implementation supports named snapshot and restore operations for
//! rollback scenarios, analogous to SQLite savepoints. The engine's write
//! transactions are built on top of this surface.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::collections::HashMap;

use parking_lot::RwLock;
use rrk_storage_traits::messages::types::{IncomingMessage, OutgoingMessage};
use rrk_storage_traits::receipts::types::{LinkedDeviceReadReceipt, RecipientReadReceipt};
use rrk_storage_traits::{Backend, RrkStorageError, RrkStorageProvider, ServiceAddress};

mod messages;
mod receipts;
mod settings;
mod snapshot;

pub use self::snapshot::MemoryStorageSnapshot;

/// A memory-based storage implementation for the read-receipt
/// reconciliation kit.
///
/// This struct implements the `RrkStorageProvider` trait directly,
/// providing unified storage for messages, pending receipts, and the
/// read-receipts settings flag.
///
/// ## Table layout
///
/// The pending-receipt tables are durable state, not caches: an entry
/// exists exactly as long as no matching message has consumed it, so
/// nothing here may ever be evicted. Plain maps are used throughout.
///
/// ## Thread Safety
///
/// All tables are protected by `RwLock`s, which allow:
/// - Multiple concurrent readers (for find operations)
/// - Exclusive writers (for save/merge/take operations)
///
/// This approach optimizes for read-heavy workloads while still ensuring
/// data consistency.
#[derive(Debug)]
pub struct RrkMemoryStorage {
    /// Incoming messages, keyed by (sender, send timestamp)
    incoming_messages: RwLock<HashMap<(ServiceAddress, u64), IncomingMessage>>,
    /// Outgoing messages, keyed globally by sent timestamp
    outgoing_messages: RwLock<HashMap<u64, OutgoingMessage>>,
    /// Early linked-device receipts, keyed by (sender, message ID timestamp)
    linked_device_receipts: RwLock<HashMap<(ServiceAddress, u64), LinkedDeviceReadReceipt>>,
    /// Early recipient receipts, keyed by sent timestamp
    recipient_receipts: RwLock<HashMap<u64, RecipientReadReceipt>>,
    /// The persisted "read receipts enabled" flag; `None` until first write
    read_receipts_enabled: RwLock<Option<bool>>,
    /// Named snapshots for rollback support
    snapshots: RwLock<HashMap<String, MemoryStorageSnapshot>>,
}

impl Default for RrkMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl RrkMemoryStorage {
    /// Creates a new empty `RrkMemoryStorage`.
    pub fn new() -> Self {
        RrkMemoryStorage {
            incoming_messages: RwLock::new(HashMap::new()),
            outgoing_messages: RwLock::new(HashMap::new()),
            linked_device_receipts: RwLock::new(HashMap::new()),
            recipient_receipts: RwLock::new(HashMap::new()),
            read_receipts_enabled: RwLock::new(None),
            snapshots: RwLock::new(HashMap::new()),
        }
    }
}

impl RrkStorageProvider for RrkMemoryStorage {
    fn backend(&self) -> Backend {
        Backend::Memory
    }

    fn create_named_snapshot(&self, name: &str) -> Result<(), RrkStorageError> {
        let snapshot = self.capture_snapshot();
        self.snapshots.write().insert(name.to_string(), snapshot);
        Ok(())
    }

    fn rollback_to_snapshot(&self, name: &str) -> Result<(), RrkStorageError> {
        // The snapshot stays registered after a rollback, mirroring SQLite
        // ROLLBACK TO semantics; release frees it.
        let snapshot = self
            .snapshots
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RrkStorageError::SnapshotNotFound(name.to_string()))?;
        self.restore_snapshot(snapshot);
        Ok(())
    }

    fn release_snapshot(&self, name: &str) -> Result<(), RrkStorageError> {
        self.snapshots
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RrkStorageError::SnapshotNotFound(name.to_string()))
    }
}
