//! Outbound receipt batching.
//!
//! Locally-generated "I read this" events accumulate in process-wide
//! in-memory state, keyed by conversation thread, and are flushed as
//! coalesced protocol messages: one receipt message per (thread, sender)
//! pair and one linked-device read sync per flush, bounding network chatter
//! when a burst of messages is read at once.
//!
//! Flush scheduling (timer/debounce) is host-driven; the engine only
//! guarantees that a flush never runs inside a storage transaction.

use std::collections::HashMap;

use rrk_storage_traits::receipts::types::LinkedDeviceReadReceipt;
use rrk_storage_traits::{RrkStorageProvider, ServiceAddress, ThreadId};

use crate::ReceiptManager;

/// Receipts queued for one original sender within one thread.
#[derive(Debug, Default, Clone)]
pub(crate) struct SenderReceiptBatch {
    /// Send timestamps of the messages read, deduplicated
    message_timestamps: Vec<u64>,
    /// The latest read timestamp seen for this batch
    read_timestamp: u64,
}

/// Accumulated outbound receipts awaiting flush.
#[derive(Debug, Default)]
pub(crate) struct OutboundReceiptState {
    /// thread -> original sender -> coalesced receipt batch
    to_sender: HashMap<ThreadId, HashMap<ServiceAddress, SenderReceiptBatch>>,
    /// Local reads to mirror to linked devices
    to_linked_devices: Vec<LinkedDeviceReadReceipt>,
}

impl OutboundReceiptState {
    fn is_empty(&self) -> bool {
        self.to_sender.is_empty() && self.to_linked_devices.is_empty()
    }

    /// Re-merge a drained state back in, preserving entries enqueued since
    /// the drain.
    fn merge(&mut self, other: OutboundReceiptState) {
        for (thread_id, senders) in other.to_sender {
            let thread_batches = self.to_sender.entry(thread_id).or_default();
            for (sender, batch) in senders {
                let existing = thread_batches.entry(sender).or_default();
                for timestamp in batch.message_timestamps {
                    if !existing.message_timestamps.contains(&timestamp) {
                        existing.message_timestamps.push(timestamp);
                    }
                }
                existing.read_timestamp = existing.read_timestamp.max(batch.read_timestamp);
            }
        }
        self.to_linked_devices.extend(other.to_linked_devices);
    }
}

/// A point-in-time view of the outbound queue, for hosts driving flush
/// scheduling and for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundQueueStats {
    /// Number of coalesced (thread, sender) receipt batches queued
    pub sender_receipt_batches: usize,
    /// Number of linked-device read-sync entries queued
    pub linked_device_entries: usize,
}

impl<Storage> ReceiptManager<Storage>
where
    Storage: RrkStorageProvider,
{
    /// Queue an "I read this" receipt for the sender of a message read in
    /// `thread_id`.
    pub(crate) fn enqueue_sender_receipt(
        &self,
        thread_id: ThreadId,
        sender: ServiceAddress,
        message_timestamp: u64,
        read_timestamp: u64,
    ) {
        let mut outbound = self.outbound.lock();
        let batch = outbound
            .to_sender
            .entry(thread_id)
            .or_default()
            .entry(sender)
            .or_default();
        if !batch.message_timestamps.contains(&message_timestamp) {
            batch.message_timestamps.push(message_timestamp);
        }
        batch.read_timestamp = batch.read_timestamp.max(read_timestamp);
    }

    /// Queue a local read for mirroring to the local user's linked devices.
    pub(crate) fn enqueue_linked_device_read_sync(&self, receipt: LinkedDeviceReadReceipt) {
        self.outbound.lock().to_linked_devices.push(receipt);
    }

    /// Flush accumulated outbound receipts to the transport.
    ///
    /// Emits one receipt message per (thread, sender) pair and at most one
    /// linked-device read sync. Returns the number of transport hand-offs.
    /// With no transport configured, the queue is left intact and 0 is
    /// returned.
    pub fn flush_outbound_receipts(&self) -> usize {
        let state = std::mem::take(&mut *self.outbound.lock());
        if state.is_empty() {
            return 0;
        }

        let Some(transport) = self.transport.clone() else {
            tracing::debug!(
                target: "rrk_core::outbound::flush",
                "no transport configured; keeping outbound receipts queued"
            );
            self.outbound.lock().merge(state);
            return 0;
        };

        let mut handed_off = 0;
        for (thread_id, senders) in state.to_sender {
            for (sender, batch) in senders {
                tracing::debug!(
                    target: "rrk_core::outbound::flush",
                    "sending read receipt to {} covering {} messages in thread {}",
                    sender,
                    batch.message_timestamps.len(),
                    thread_id
                );
                transport.send_read_receipts(
                    &sender,
                    &thread_id,
                    &batch.message_timestamps,
                    batch.read_timestamp,
                );
                handed_off += 1;
            }
        }

        if !state.to_linked_devices.is_empty() {
            let read_timestamp = state
                .to_linked_devices
                .iter()
                .map(|r| r.read_timestamp)
                .max()
                .unwrap_or(0);
            transport.send_read_sync_to_linked_devices(&state.to_linked_devices, read_timestamp);
            handed_off += 1;
        }

        handed_off
    }

    /// Current size of the outbound queue.
    pub fn outbound_queue_stats(&self) -> OutboundQueueStats {
        let outbound = self.outbound.lock();
        OutboundQueueStats {
            sender_receipt_batches: outbound.to_sender.values().map(|m| m.len()).sum(),
            linked_device_entries: outbound.to_linked_devices.len(),
        }
    }
}
