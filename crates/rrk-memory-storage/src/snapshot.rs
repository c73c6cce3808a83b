//! Snapshot and rollback support for memory storage.
//!
//! This module provides the ability to create snapshots of all in-memory
//! state and restore them later. This provides functionality analogous to
//! SQLite savepoints for the engine's write transactions.
//!
//! # Concurrency Warning
//!
//! Snapshot creation and restoration are **not atomic** with respect to
//! concurrent operations. These operations acquire multiple independent
//! locks sequentially, which means:
//!
//! - During capture: Concurrent writes may result in an inconsistent
//!   snapshot (some changes captured, others not).
//! - During restore: Concurrent reads may observe partial state (some data
//!   restored, some still from before the restore).
//!
//! **Callers must ensure no concurrent operations are in progress when
//! creating or restoring snapshots.** The engine guarantees this by holding
//! its write-serialization lock for the whole life of a transaction.

use std::collections::HashMap;

use rrk_storage_traits::ServiceAddress;
use rrk_storage_traits::messages::types::{IncomingMessage, OutgoingMessage};
use rrk_storage_traits::receipts::types::{LinkedDeviceReadReceipt, RecipientReadReceipt};

use crate::RrkMemoryStorage;

/// A snapshot of all in-memory state that can be restored later.
///
/// This enables rollback functionality similar to SQLite savepoints,
/// allowing you to:
/// 1. Create a snapshot before an operation
/// 2. Attempt the operation
/// 3. Restore the snapshot if the operation fails or needs to be undone
#[derive(Debug, Clone)]
pub struct MemoryStorageSnapshot {
    pub(crate) incoming_messages: HashMap<(ServiceAddress, u64), IncomingMessage>,
    pub(crate) outgoing_messages: HashMap<u64, OutgoingMessage>,
    pub(crate) linked_device_receipts: HashMap<(ServiceAddress, u64), LinkedDeviceReadReceipt>,
    pub(crate) recipient_receipts: HashMap<u64, RecipientReadReceipt>,
    pub(crate) read_receipts_enabled: Option<bool>,
}

impl RrkMemoryStorage {
    /// Clone all tables into a snapshot.
    pub(crate) fn capture_snapshot(&self) -> MemoryStorageSnapshot {
        MemoryStorageSnapshot {
            incoming_messages: self.incoming_messages.read().clone(),
            outgoing_messages: self.outgoing_messages.read().clone(),
            linked_device_receipts: self.linked_device_receipts.read().clone(),
            recipient_receipts: self.recipient_receipts.read().clone(),
            read_receipts_enabled: *self.read_receipts_enabled.read(),
        }
    }

    /// Replace all tables with the contents of a snapshot.
    pub(crate) fn restore_snapshot(&self, snapshot: MemoryStorageSnapshot) {
        *self.incoming_messages.write() = snapshot.incoming_messages;
        *self.outgoing_messages.write() = snapshot.outgoing_messages;
        *self.linked_device_receipts.write() = snapshot.linked_device_receipts;
        *self.recipient_receipts.write() = snapshot.recipient_receipts;
        *self.read_receipts_enabled.write() = snapshot.read_receipts_enabled;
    }
}
