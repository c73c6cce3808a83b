//! Read-state reconciliation pipelines.
//!
//! Four asynchronous event sources feed the engine, with no ordering
//! guarantees between them:
//!
//! 1. receipts from recipients of messages the local user sent,
//! 2. read syncs from the local user's own linked devices,
//! 3. reads performed on this device, and
//! 4. batched local mark-as-read over a visible span of a thread.
//!
//! Receipts that arrive before their target message are persisted as
//! pending records and replayed when the message shows up, so the final
//! read state is independent of arrival order. Read state only ever moves
//! forward: a recorded read timestamp is never regressed and a read
//! circumstance is only replaced by a stronger one.

use rrk_storage_traits::messages::types::{
    IncomingMessage, OutgoingMessage, ReadCircumstance,
};
use rrk_storage_traits::receipts::types::LinkedDeviceReadReceipt;
use rrk_storage_traits::{RrkStorageProvider, ServiceAddress, ThreadId};

use crate::error::Error;
use crate::transaction::WriteTransaction;
use crate::util::now_timestamp_ms;
use crate::ReceiptManager;

type Result<T> = std::result::Result<T, Error>;

/// One entry of a linked-device read sync: a message the local user read on
/// another of their devices, identified the way incoming messages are
/// keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadSyncEntry {
    /// Identity of the message's original sender
    pub sender: ServiceAddress,
    /// The sender's send timestamp identifying the message
    pub message_id_timestamp: u64,
}

impl ReadSyncEntry {
    /// Create a read sync entry
    pub fn new(sender: ServiceAddress, message_id_timestamp: u64) -> Self {
        Self {
            sender,
            message_id_timestamp,
        }
    }
}

impl<Storage> ReceiptManager<Storage>
where
    Storage: RrkStorageProvider,
{
    /// Process read receipts reported by a recipient of messages the local
    /// user sent.
    ///
    /// One receipt protocol message carries one recipient, one read
    /// timestamp, and the sent timestamps of every message it covers. Each
    /// timestamp that matches a known outgoing message advances that
    /// message's per-recipient read state; the rest are stored as pending
    /// and replayed when the message is recorded.
    ///
    /// Runs in its own write transaction.
    pub fn process_read_receipts_from_recipient(
        &self,
        recipient: &ServiceAddress,
        sent_timestamps: &[u64],
        read_timestamp: u64,
    ) -> Result<()> {
        let mut txn = self.begin_write()?;
        for &sent_timestamp in sent_timestamps {
            self.apply_recipient_read_receipt(&mut txn, recipient, sent_timestamp, read_timestamp)?;
        }
        txn.commit()
    }

    /// Apply one recipient receipt: advance the outgoing message if it
    /// exists, otherwise persist the receipt as pending.
    fn apply_recipient_read_receipt(
        &self,
        txn: &mut WriteTransaction<'_, Storage>,
        recipient: &ServiceAddress,
        sent_timestamp: u64,
        read_timestamp: u64,
    ) -> Result<()> {
        let message = txn
            .storage()
            .find_outgoing_message(sent_timestamp)
            .map_err(|e| Error::Message(e.to_string()))?;

        match message {
            Some(message) => {
                self.mark_outgoing_message_read_by_recipient(txn, message, recipient, read_timestamp)
            }
            None => {
                tracing::debug!(
                    target: "rrk_core::receipts::recipient",
                    "read receipt from {} arrived before outgoing message {}; storing as pending",
                    recipient,
                    sent_timestamp
                );
                txn.storage()
                    .merge_recipient_receipt(sent_timestamp, recipient.clone(), read_timestamp)
                    .map_err(|e| Error::Receipt(e.to_string()))
            }
        }
    }

    /// Record that `recipient` read an outgoing message.
    ///
    /// No-op if the recorded read timestamp for this recipient is already at
    /// least `read_timestamp`. A read recipient is always also delivered.
    /// The first read of a message schedules a one-time linked-device status
    /// sync.
    fn mark_outgoing_message_read_by_recipient(
        &self,
        txn: &mut WriteTransaction<'_, Storage>,
        mut message: OutgoingMessage,
        recipient: &ServiceAddress,
        read_timestamp: u64,
    ) -> Result<()> {
        let state = message.recipient_states.entry(recipient.clone()).or_default();
        if state.read_at.is_some_and(|existing| existing >= read_timestamp) {
            tracing::debug!(
                target: "rrk_core::receipts::recipient",
                "ignoring receipt from {} for message {}: recorded read state is already newer",
                recipient,
                message.sent_timestamp
            );
            return Ok(());
        }
        state.read_at = Some(read_timestamp);
        if state.delivered_at.is_none() {
            state.delivered_at = Some(read_timestamp);
        }

        let sent_timestamp = message.sent_timestamp;
        let thread_id = message.thread_id.clone();
        // Without a transport there is no hand-off to record; the flag stays
        // unset so a later receipt can still schedule the sync
        let schedule_status_sync = !message.read_status_synced && self.transport.is_some();
        if schedule_status_sync {
            message.read_status_synced = true;
        }

        txn.storage()
            .save_outgoing_message(message)
            .map_err(|e| Error::Message(e.to_string()))?;

        if schedule_status_sync {
            if let Some(transport) = self.transport.clone() {
                txn.add_post_commit(move || transport.send_outgoing_read_status_sync(sent_timestamp));
            }
        }
        if let Some(callback) = self.callback.clone() {
            txn.add_post_commit(move || callback.on_outgoing_message_read_by_recipient(&thread_id));
        }
        Ok(())
    }

    /// Replay pending recipient receipts onto a newly recorded outgoing
    /// message, consuming them.
    ///
    /// Call inside the transaction that saved the message, after the save.
    /// No-op when nothing is pending for the message's sent timestamp.
    pub fn apply_early_read_receipts_for_outgoing_message(
        &self,
        txn: &mut WriteTransaction<'_, Storage>,
        message: &OutgoingMessage,
    ) -> Result<()> {
        let pending = txn
            .storage()
            .take_recipient_receipts(message.sent_timestamp)
            .map_err(|e| Error::Receipt(e.to_string()))?;
        let Some(pending) = pending else {
            return Ok(());
        };

        tracing::debug!(
            target: "rrk_core::receipts::recipient",
            "replaying {} early read receipts onto outgoing message {}",
            pending.recipient_map.len(),
            message.sent_timestamp
        );
        for (recipient, read_timestamp) in pending.recipient_map {
            self.apply_recipient_read_receipt(
                txn,
                &recipient,
                message.sent_timestamp,
                read_timestamp,
            )?;
        }
        Ok(())
    }

    /// Process a read sync from one of the local user's linked devices.
    ///
    /// Entries whose incoming message exists are marked read with a
    /// linked-device circumstance; the rest are persisted as pending
    /// receipts and replayed when the message arrives. Linked-device reads
    /// never trigger outbound receipts from this device.
    ///
    /// `has_pending_message_request` reports whether a thread still awaits
    /// the local user's consent; it selects the weaker circumstance so a
    /// later read on this device can still upgrade it.
    ///
    /// Runs inside the caller's transaction, which typically also covers
    /// the rest of the sync envelope.
    pub fn process_read_receipts_from_linked_device<F>(
        &self,
        txn: &mut WriteTransaction<'_, Storage>,
        entries: &[ReadSyncEntry],
        read_timestamp: u64,
        has_pending_message_request: F,
    ) -> Result<()>
    where
        F: Fn(&ThreadId) -> bool,
    {
        for entry in entries {
            let message = txn
                .storage()
                .find_incoming_message(&entry.sender, entry.message_id_timestamp)
                .map_err(|e| Error::Message(e.to_string()))?;

            match message {
                Some(message) => {
                    let circumstance = if has_pending_message_request(&message.thread_id) {
                        ReadCircumstance::ReadOnLinkedDeviceWhilePendingMessageRequest
                    } else {
                        ReadCircumstance::ReadOnLinkedDevice
                    };
                    self.mark_incoming_message_read(txn, message, circumstance, read_timestamp)?;
                }
                None => {
                    tracing::debug!(
                        target: "rrk_core::receipts::linked_device",
                        "read sync from linked device arrived before incoming message {}:{}; storing as pending",
                        entry.sender,
                        entry.message_id_timestamp
                    );
                    txn.storage()
                        .save_linked_device_receipt(LinkedDeviceReadReceipt::new(
                            entry.sender.clone(),
                            entry.message_id_timestamp,
                            read_timestamp,
                        ))
                        .map_err(|e| Error::Receipt(e.to_string()))?;
                }
            }
        }
        Ok(())
    }

    /// Replay a pending linked-device receipt onto a newly recorded
    /// incoming message, consuming it.
    ///
    /// Call inside the transaction that saved the message, after the save.
    /// No-op when nothing is pending for the message's key.
    pub fn apply_early_read_receipts_for_incoming_message(
        &self,
        txn: &mut WriteTransaction<'_, Storage>,
        message: &IncomingMessage,
        has_pending_message_request: bool,
    ) -> Result<()> {
        let receipt = txn
            .storage()
            .take_linked_device_receipt(&message.sender, message.timestamp)
            .map_err(|e| Error::Receipt(e.to_string()))?;
        let Some(receipt) = receipt else {
            return Ok(());
        };

        tracing::debug!(
            target: "rrk_core::receipts::linked_device",
            "replaying early linked-device receipt onto incoming message {}:{}",
            message.sender,
            message.timestamp
        );
        let circumstance = if has_pending_message_request {
            ReadCircumstance::ReadOnLinkedDeviceWhilePendingMessageRequest
        } else {
            ReadCircumstance::ReadOnLinkedDevice
        };
        // Mark the stored copy, which may be newer than the caller's
        let stored = txn
            .storage()
            .find_incoming_message(&message.sender, message.timestamp)
            .map_err(|e| Error::Message(e.to_string()))?
            .unwrap_or_else(|| message.clone());
        self.mark_incoming_message_read(txn, stored, circumstance, receipt.read_timestamp)
    }

    /// Record that the local user read an incoming message on this device.
    ///
    /// Runs inside the caller's transaction. Uses the current wall-clock
    /// time as the read timestamp. The stored copy of the message is
    /// authoritative; the caller's copy may be a stale snapshot and only
    /// supplies the key.
    pub fn message_was_read(
        &self,
        txn: &mut WriteTransaction<'_, Storage>,
        message: IncomingMessage,
        circumstance: ReadCircumstance,
    ) -> Result<()> {
        let stored = txn
            .storage()
            .find_incoming_message(&message.sender, message.timestamp)
            .map_err(|e| Error::Message(e.to_string()))?
            .unwrap_or(message);
        self.mark_incoming_message_read(txn, stored, circumstance, now_timestamp_ms())
    }

    /// Mark every unread incoming message in `thread_id` with
    /// `sort_id <= sort_id` as read on this device.
    ///
    /// Work is chunked into multiple transactions of
    /// [`ReceiptConfig::mark_as_read_chunk_size`](crate::ReceiptConfig)
    /// messages each, bounding transaction size for large spans. All
    /// messages in one call share a single read timestamp. `completion`
    /// runs exactly once, after the final chunk commits; it does not run if
    /// an error aborts the operation.
    ///
    /// Returns the number of messages marked.
    pub fn mark_as_read_locally_before_sort_id(
        &self,
        sort_id: u64,
        thread_id: &ThreadId,
        has_pending_message_request: bool,
        completion: impl FnOnce(),
    ) -> Result<usize> {
        let circumstance = if has_pending_message_request {
            ReadCircumstance::ReadOnThisDeviceWhilePendingMessageRequest
        } else {
            ReadCircumstance::ReadOnThisDevice
        };
        let chunk_size = self
            .config
            .mark_as_read_chunk_size
            .clamp(1, rrk_storage_traits::messages::MAX_UNREAD_PAGE_SIZE);
        let read_timestamp = now_timestamp_ms();
        let mut marked = 0usize;

        loop {
            let mut txn = self.begin_write()?;
            let page = txn
                .storage()
                .unread_incoming_messages_before(thread_id, sort_id, chunk_size)
                .map_err(|e| Error::Message(e.to_string()))?;
            if page.is_empty() {
                txn.commit()?;
                break;
            }
            let page_len = page.len();
            for message in page {
                self.mark_incoming_message_read(&mut txn, message, circumstance, read_timestamp)?;
            }
            txn.commit()?;
            marked += page_len;
            if page_len < chunk_size {
                break;
            }
        }

        tracing::debug!(
            target: "rrk_core::receipts::mark_read",
            "marked {} messages as read in thread {}",
            marked,
            thread_id
        );
        completion();
        Ok(marked)
    }

    /// The shared write path for incoming-message read state.
    ///
    /// The first read records the timestamp and, when the read happened on
    /// this device, queues outbound receipts and a post-commit
    /// notification. A later, stronger circumstance upgrades the recorded
    /// circumstance without repeating side effects; anything else is an
    /// idempotent no-op.
    fn mark_incoming_message_read(
        &self,
        txn: &mut WriteTransaction<'_, Storage>,
        mut message: IncomingMessage,
        circumstance: ReadCircumstance,
        read_timestamp: u64,
    ) -> Result<()> {
        if let Some(current) = message.read_circumstance {
            if current >= circumstance {
                tracing::debug!(
                    target: "rrk_core::receipts::mark_read",
                    "message {}:{} already read under {:?}; ignoring {:?}",
                    message.sender,
                    message.timestamp,
                    current,
                    circumstance
                );
                return Ok(());
            }
            // Upgrade only; the recorded first-read time stands and side
            // effects already ran
            message.read_circumstance = Some(circumstance);
            return txn
                .storage()
                .save_incoming_message(message)
                .map_err(|e| Error::Message(e.to_string()));
        }

        message.read_circumstance = Some(circumstance);
        message.read_at = Some(read_timestamp);
        let sender = message.sender.clone();
        let timestamp = message.timestamp;
        let thread_id = message.thread_id.clone();
        txn.storage()
            .save_incoming_message(message)
            .map_err(|e| Error::Message(e.to_string()))?;

        if circumstance.is_read_on_this_device() {
            // Linked devices always learn about local reads; the privacy
            // setting only gates receipts to the sender
            self.enqueue_linked_device_read_sync(LinkedDeviceReadReceipt::new(
                sender.clone(),
                timestamp,
                read_timestamp,
            ));
            if self.are_read_receipts_enabled() && !self.is_local_address(&sender) {
                self.enqueue_sender_receipt(thread_id.clone(), sender, timestamp, read_timestamp);
            }
            if let Some(callback) = self.callback.clone() {
                txn.add_post_commit(move || callback.on_incoming_message_marked_as_read(&thread_id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rrk_memory_storage::RrkMemoryStorage;
    use rrk_storage_traits::messages::types::{IncomingMessage, OutgoingMessage, ReadCircumstance};
    use rrk_storage_traits::messages::MessageStorage;
    use rrk_storage_traits::receipts::PendingReceiptStorage;
    use rrk_storage_traits::test_utils::{test_address, test_thread};

    use crate::tests::{
        create_test_manager, create_test_manager_with_config, RecordingCallback, RecordingTransport,
    };
    use crate::{ReceiptConfig, ReceiptManager};

    use super::*;

    fn manager_with_doubles() -> (
        ReceiptManager<RrkMemoryStorage>,
        Arc<RecordingTransport>,
        Arc<RecordingCallback>,
    ) {
        let transport = Arc::new(RecordingTransport::default());
        let callback = Arc::new(RecordingCallback::default());
        let manager = ReceiptManager::builder(RrkMemoryStorage::default())
            .with_transport(transport.clone())
            .with_callback(callback.clone())
            .build();
        (manager, transport, callback)
    }

    fn save_outgoing(
        manager: &ReceiptManager<RrkMemoryStorage>,
        message: OutgoingMessage,
    ) {
        let txn = manager.begin_write().unwrap();
        txn.storage().save_outgoing_message(message).unwrap();
        txn.commit().unwrap();
    }

    fn save_incoming(
        manager: &ReceiptManager<RrkMemoryStorage>,
        message: IncomingMessage,
    ) {
        let txn = manager.begin_write().unwrap();
        txn.storage().save_incoming_message(message).unwrap();
        txn.commit().unwrap();
    }

    #[test]
    fn test_recipient_receipt_splits_into_applied_and_pending() {
        // One receipt covering two sent timestamps, only one of which is a
        // known message
        let (manager, _transport, callback) = manager_with_doubles();
        let thread = test_thread(1);
        let recipient = test_address(1);
        save_outgoing(&manager, OutgoingMessage::new(1000, thread.clone(), 1));

        manager
            .process_read_receipts_from_recipient(&recipient, &[1000, 2000], 5000)
            .unwrap();

        let txn = manager.begin_write().unwrap();
        let applied = txn.storage().find_outgoing_message(1000).unwrap().unwrap();
        assert_eq!(applied.read_timestamp_for(&recipient), Some(5000));

        let pending = txn.storage().find_recipient_receipt(2000).unwrap().unwrap();
        assert_eq!(pending.recipient_map.get(&recipient), Some(&5000));
        txn.commit().unwrap();

        assert_eq!(callback.outgoing_read_by_recipient.lock().as_slice(), &[thread]);
    }

    #[test]
    fn test_recipient_receipt_is_idempotent() {
        let (manager, _transport, callback) = manager_with_doubles();
        let recipient = test_address(1);
        save_outgoing(&manager, OutgoingMessage::new(1000, test_thread(1), 1));

        manager
            .process_read_receipts_from_recipient(&recipient, &[1000], 5000)
            .unwrap();
        manager
            .process_read_receipts_from_recipient(&recipient, &[1000], 5000)
            .unwrap();

        let txn = manager.begin_write().unwrap();
        let message = txn.storage().find_outgoing_message(1000).unwrap().unwrap();
        assert_eq!(message.read_timestamp_for(&recipient), Some(5000));
        txn.commit().unwrap();

        // The duplicate was a no-op, so no second notification
        assert_eq!(callback.outgoing_read_by_recipient.lock().len(), 1);
    }

    #[test]
    fn test_recipient_read_timestamp_never_regresses() {
        let (manager, _transport, _callback) = manager_with_doubles();
        let recipient = test_address(1);
        save_outgoing(&manager, OutgoingMessage::new(1000, test_thread(1), 1));

        manager
            .process_read_receipts_from_recipient(&recipient, &[1000], 5000)
            .unwrap();
        manager
            .process_read_receipts_from_recipient(&recipient, &[1000], 4000)
            .unwrap();

        let txn = manager.begin_write().unwrap();
        let message = txn.storage().find_outgoing_message(1000).unwrap().unwrap();
        assert_eq!(message.read_timestamp_for(&recipient), Some(5000));
        txn.commit().unwrap();
    }

    #[test]
    fn test_read_implies_delivered() {
        let (manager, _transport, _callback) = manager_with_doubles();
        let recipient = test_address(1);
        save_outgoing(&manager, OutgoingMessage::new(1000, test_thread(1), 1));

        manager
            .process_read_receipts_from_recipient(&recipient, &[1000], 5000)
            .unwrap();

        let txn = manager.begin_write().unwrap();
        let message = txn.storage().find_outgoing_message(1000).unwrap().unwrap();
        let state = message.recipient_states.get(&recipient).unwrap();
        assert_eq!(state.delivered_at, Some(5000));
        assert_eq!(state.read_at, Some(5000));
        txn.commit().unwrap();
    }

    #[test]
    fn test_outgoing_status_sync_scheduled_once() {
        let (manager, transport, _callback) = manager_with_doubles();
        save_outgoing(&manager, OutgoingMessage::new(1000, test_thread(1), 1));

        manager
            .process_read_receipts_from_recipient(&test_address(1), &[1000], 5000)
            .unwrap();
        manager
            .process_read_receipts_from_recipient(&test_address(2), &[1000], 6000)
            .unwrap();

        assert_eq!(transport.outgoing_status_syncs.lock().as_slice(), &[1000]);
    }

    /// With no transport there is nothing to hand the status sync to; the
    /// synced flag must stay unset so a transport added later still gets
    /// the one-time sync.
    #[test]
    fn test_status_sync_not_recorded_without_transport() {
        let manager = create_test_manager();
        save_outgoing(&manager, OutgoingMessage::new(1000, test_thread(1), 1));

        manager
            .process_read_receipts_from_recipient(&test_address(1), &[1000], 5000)
            .unwrap();

        let txn = manager.begin_write().unwrap();
        let message = txn.storage().find_outgoing_message(1000).unwrap().unwrap();
        assert!(!message.read_status_synced);
        txn.commit().unwrap();
    }

    #[test]
    fn test_early_recipient_receipts_replay_onto_new_outgoing_message() {
        let (manager, _transport, callback) = manager_with_doubles();
        let thread = test_thread(1);
        let first = test_address(1);
        let second = test_address(2);

        // Receipts arrive before the message is recorded
        manager
            .process_read_receipts_from_recipient(&first, &[2000], 5000)
            .unwrap();
        manager
            .process_read_receipts_from_recipient(&second, &[2000], 6000)
            .unwrap();

        let message = OutgoingMessage::new(2000, thread.clone(), 2);
        let mut txn = manager.begin_write().unwrap();
        txn.storage().save_outgoing_message(message.clone()).unwrap();
        manager
            .apply_early_read_receipts_for_outgoing_message(&mut txn, &message)
            .unwrap();
        txn.commit().unwrap();

        let txn = manager.begin_write().unwrap();
        let stored = txn.storage().find_outgoing_message(2000).unwrap().unwrap();
        assert_eq!(stored.read_timestamp_for(&first), Some(5000));
        assert_eq!(stored.read_timestamp_for(&second), Some(6000));
        // Consumed, not re-playable
        assert!(txn.storage().find_recipient_receipt(2000).unwrap().is_none());
        txn.commit().unwrap();

        assert_eq!(callback.outgoing_read_by_recipient.lock().len(), 2);
    }

    #[test]
    fn test_linked_device_sync_marks_existing_incoming_message() {
        let (manager, _transport, _callback) = manager_with_doubles();
        let sender = test_address(1);
        let thread = test_thread(1);
        save_incoming(
            &manager,
            IncomingMessage::new(sender.clone(), 1000, thread, 1),
        );

        let mut txn = manager.begin_write().unwrap();
        manager
            .process_read_receipts_from_linked_device(
                &mut txn,
                &[ReadSyncEntry::new(sender.clone(), 1000)],
                5000,
                |_| false,
            )
            .unwrap();
        txn.commit().unwrap();

        let txn = manager.begin_write().unwrap();
        let message = txn.storage().find_incoming_message(&sender, 1000).unwrap().unwrap();
        assert_eq!(message.read_circumstance, Some(ReadCircumstance::ReadOnLinkedDevice));
        assert_eq!(message.read_at, Some(5000));
        txn.commit().unwrap();

        // Linked-device reads never produce outbound receipts from here
        let stats = manager.outbound_queue_stats();
        assert_eq!(stats.sender_receipt_batches, 0);
        assert_eq!(stats.linked_device_entries, 0);
    }

    #[test]
    fn test_linked_device_sync_uses_pending_request_circumstance() {
        let (manager, _transport, _callback) = manager_with_doubles();
        let sender = test_address(1);
        save_incoming(
            &manager,
            IncomingMessage::new(sender.clone(), 1000, test_thread(1), 1),
        );

        let mut txn = manager.begin_write().unwrap();
        manager
            .process_read_receipts_from_linked_device(
                &mut txn,
                &[ReadSyncEntry::new(sender.clone(), 1000)],
                5000,
                |_| true,
            )
            .unwrap();
        txn.commit().unwrap();

        let txn = manager.begin_write().unwrap();
        let message = txn.storage().find_incoming_message(&sender, 1000).unwrap().unwrap();
        assert_eq!(
            message.read_circumstance,
            Some(ReadCircumstance::ReadOnLinkedDeviceWhilePendingMessageRequest)
        );
        txn.commit().unwrap();
    }

    #[test]
    fn test_early_linked_device_receipt_replays_onto_new_incoming_message() {
        let (manager, _transport, _callback) = manager_with_doubles();
        let sender = test_address(1);

        // Sync arrives before the message
        let mut txn = manager.begin_write().unwrap();
        manager
            .process_read_receipts_from_linked_device(
                &mut txn,
                &[ReadSyncEntry::new(sender.clone(), 1000)],
                5000,
                |_| false,
            )
            .unwrap();
        txn.commit().unwrap();

        let message = IncomingMessage::new(sender.clone(), 1000, test_thread(1), 1);
        let mut txn = manager.begin_write().unwrap();
        txn.storage().save_incoming_message(message.clone()).unwrap();
        manager
            .apply_early_read_receipts_for_incoming_message(&mut txn, &message, false)
            .unwrap();
        txn.commit().unwrap();

        let txn = manager.begin_write().unwrap();
        let stored = txn.storage().find_incoming_message(&sender, 1000).unwrap().unwrap();
        assert_eq!(stored.read_circumstance, Some(ReadCircumstance::ReadOnLinkedDevice));
        assert_eq!(stored.read_at, Some(5000));
        // Consumed, not re-playable
        assert!(txn
            .storage()
            .find_linked_device_receipt(&sender, 1000)
            .unwrap()
            .is_none());
        txn.commit().unwrap();
    }

    #[test]
    fn test_linked_device_sync_never_downgrades_local_read() {
        let (manager, _transport, _callback) = manager_with_doubles();
        let sender = test_address(1);
        let message = IncomingMessage::new(sender.clone(), 1000, test_thread(1), 1);
        save_incoming(&manager, message.clone());

        let mut txn = manager.begin_write().unwrap();
        manager
            .message_was_read(&mut txn, message, ReadCircumstance::ReadOnThisDevice)
            .unwrap();
        txn.commit().unwrap();

        let local_read_at = {
            let txn = manager.begin_write().unwrap();
            let stored = txn.storage().find_incoming_message(&sender, 1000).unwrap().unwrap();
            txn.commit().unwrap();
            stored.read_at
        };

        let mut txn = manager.begin_write().unwrap();
        manager
            .process_read_receipts_from_linked_device(
                &mut txn,
                &[ReadSyncEntry::new(sender.clone(), 1000)],
                9999,
                |_| false,
            )
            .unwrap();
        txn.commit().unwrap();

        let txn = manager.begin_write().unwrap();
        let stored = txn.storage().find_incoming_message(&sender, 1000).unwrap().unwrap();
        assert_eq!(stored.read_circumstance, Some(ReadCircumstance::ReadOnThisDevice));
        assert_eq!(stored.read_at, local_read_at);
        txn.commit().unwrap();
    }

    #[test]
    fn test_local_read_upgrades_linked_device_circumstance() {
        let (manager, _transport, _callback) = manager_with_doubles();
        let sender = test_address(1);
        save_incoming(
            &manager,
            IncomingMessage::new(sender.clone(), 1000, test_thread(1), 1),
        );

        let mut txn = manager.begin_write().unwrap();
        manager
            .process_read_receipts_from_linked_device(
                &mut txn,
                &[ReadSyncEntry::new(sender.clone(), 1000)],
                5000,
                |_| false,
            )
            .unwrap();
        txn.commit().unwrap();

        let stored = {
            let txn = manager.begin_write().unwrap();
            let stored = txn.storage().find_incoming_message(&sender, 1000).unwrap().unwrap();
            txn.commit().unwrap();
            stored
        };
        let mut txn = manager.begin_write().unwrap();
        manager
            .message_was_read(&mut txn, stored, ReadCircumstance::ReadOnThisDevice)
            .unwrap();
        txn.commit().unwrap();

        let txn = manager.begin_write().unwrap();
        let upgraded = txn.storage().find_incoming_message(&sender, 1000).unwrap().unwrap();
        assert_eq!(upgraded.read_circumstance, Some(ReadCircumstance::ReadOnThisDevice));
        // The first-read time stands
        assert_eq!(upgraded.read_at, Some(5000));
        txn.commit().unwrap();
    }

    #[test]
    fn test_local_read_enqueues_receipts_and_notifies_when_enabled() {
        let (manager, transport, callback) = manager_with_doubles();
        manager.set_read_receipts_enabled_with_sync(true).unwrap();

        let sender = test_address(1);
        let thread = test_thread(1);
        let message = IncomingMessage::new(sender.clone(), 1000, thread.clone(), 1);
        save_incoming(&manager, message.clone());

        let mut txn = manager.begin_write().unwrap();
        manager
            .message_was_read(&mut txn, message, ReadCircumstance::ReadOnThisDevice)
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(callback.incoming_marked_read.lock().as_slice(), &[thread.clone()]);

        manager.flush_outbound_receipts();
        let receipts = transport.read_receipts.lock();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].0, sender);
        assert_eq!(receipts[0].2, vec![1000]);

        let syncs = transport.read_syncs.lock();
        assert_eq!(syncs.len(), 1);
        assert_eq!(syncs[0].0[0].message_id_timestamp, 1000);
    }

    #[test]
    fn test_local_read_with_receipts_disabled_skips_sender_receipt() {
        // The privacy setting gates receipts to the sender; linked devices
        // still learn about local reads
        let (manager, transport, _callback) = manager_with_doubles();

        let sender = test_address(1);
        let message = IncomingMessage::new(sender, 1000, test_thread(1), 1);
        save_incoming(&manager, message.clone());

        let mut txn = manager.begin_write().unwrap();
        manager
            .message_was_read(&mut txn, message, ReadCircumstance::ReadOnThisDevice)
            .unwrap();
        txn.commit().unwrap();

        manager.flush_outbound_receipts();
        assert!(transport.read_receipts.lock().is_empty());
        assert_eq!(transport.read_syncs.lock().len(), 1);
    }

    #[test]
    fn test_self_sent_message_never_receipts_sender() {
        let local = test_address(99);
        let transport = Arc::new(RecordingTransport::default());
        let manager = ReceiptManager::builder(RrkMemoryStorage::default())
            .with_config(ReceiptConfig::new().with_local_address(local.clone()))
            .with_transport(transport.clone())
            .build();
        manager.set_read_receipts_enabled_with_sync(true).unwrap();

        // A note-to-self style message, sent by the local user's own address
        let message = IncomingMessage::new(local, 1000, test_thread(1), 1);
        save_incoming(&manager, message.clone());

        let mut txn = manager.begin_write().unwrap();
        manager
            .message_was_read(&mut txn, message, ReadCircumstance::ReadOnThisDevice)
            .unwrap();
        txn.commit().unwrap();

        manager.flush_outbound_receipts();
        assert!(transport.read_receipts.lock().is_empty());
    }

    #[test]
    fn test_repeated_local_read_is_idempotent() {
        let (manager, transport, callback) = manager_with_doubles();
        manager.set_read_receipts_enabled_with_sync(true).unwrap();

        let sender = test_address(1);
        let message = IncomingMessage::new(sender, 1000, test_thread(1), 1);
        save_incoming(&manager, message.clone());

        for _ in 0..3 {
            let stored = {
                let txn = manager.begin_write().unwrap();
                let stored = txn
                    .storage()
                    .find_incoming_message(&message.sender, 1000)
                    .unwrap()
                    .unwrap();
                txn.commit().unwrap();
                stored
            };
            let mut txn = manager.begin_write().unwrap();
            manager
                .message_was_read(&mut txn, stored, ReadCircumstance::ReadOnThisDevice)
                .unwrap();
            txn.commit().unwrap();
        }

        assert_eq!(callback.incoming_marked_read.lock().len(), 1);
        manager.flush_outbound_receipts();
        assert_eq!(transport.read_receipts.lock().len(), 1);
        assert_eq!(transport.read_receipts.lock()[0].2, vec![1000]);
    }

    /// The stored copy is authoritative: re-reporting a read with a stale
    /// unread snapshot of the message must not repeat first-read side
    /// effects.
    #[test]
    fn test_stale_message_copy_does_not_repeat_side_effects() {
        let (manager, transport, callback) = manager_with_doubles();
        manager.set_read_receipts_enabled_with_sync(true).unwrap();

        let sender = test_address(1);
        let message = IncomingMessage::new(sender, 1000, test_thread(1), 1);
        save_incoming(&manager, message.clone());

        let mut txn = manager.begin_write().unwrap();
        manager
            .message_was_read(&mut txn, message.clone(), ReadCircumstance::ReadOnThisDevice)
            .unwrap();
        txn.commit().unwrap();

        // Same unread snapshot again, without re-fetching
        let mut txn = manager.begin_write().unwrap();
        manager
            .message_was_read(&mut txn, message, ReadCircumstance::ReadOnThisDevice)
            .unwrap();
        txn.commit().unwrap();

        assert_eq!(callback.incoming_marked_read.lock().len(), 1);
        manager.flush_outbound_receipts();
        assert_eq!(transport.read_receipts.lock().len(), 1);
        assert_eq!(transport.read_receipts.lock()[0].2, vec![1000]);
        assert_eq!(transport.read_syncs.lock().len(), 1);
    }

    #[test]
    fn test_mark_as_read_respects_cutoff_and_chunks() {
        let manager = create_test_manager_with_config(
            ReceiptConfig::new().with_mark_as_read_chunk_size(128),
        );
        let thread = test_thread(1);
        let sender = test_address(1);

        {
            let txn = manager.begin_write().unwrap();
            for sort_id in 1..=1000u64 {
                txn.storage()
                    .save_incoming_message(IncomingMessage::new(
                        sender.clone(),
                        sort_id,
                        thread.clone(),
                        sort_id,
                    ))
                    .unwrap();
            }
            txn.commit().unwrap();
        }

        let mut completions = 0;
        let marked = manager
            .mark_as_read_locally_before_sort_id(600, &thread, false, || completions += 1)
            .unwrap();
        assert_eq!(marked, 600);
        assert_eq!(completions, 1);

        let txn = manager.begin_write().unwrap();
        let below = txn.storage().find_incoming_message(&sender, 600).unwrap().unwrap();
        assert!(below.is_read());
        let above = txn.storage().find_incoming_message(&sender, 601).unwrap().unwrap();
        assert!(!above.is_read());
        txn.commit().unwrap();
    }

    #[test]
    fn test_mark_as_read_is_idempotent_across_calls() {
        let (manager, transport, _callback) = manager_with_doubles();
        manager.set_read_receipts_enabled_with_sync(true).unwrap();
        let thread = test_thread(1);
        let sender = test_address(1);

        for sort_id in 1..=10u64 {
            save_incoming(
                &manager,
                IncomingMessage::new(sender.clone(), sort_id, thread.clone(), sort_id),
            );
        }

        let first = manager
            .mark_as_read_locally_before_sort_id(10, &thread, false, || {})
            .unwrap();
        let second = manager
            .mark_as_read_locally_before_sort_id(10, &thread, false, || {})
            .unwrap();
        assert_eq!(first, 10);
        assert_eq!(second, 0);

        manager.flush_outbound_receipts();
        // One coalesced receipt covering all ten reads, not twenty entries
        let receipts = transport.read_receipts.lock();
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].2.len(), 10);
    }

    #[test]
    fn test_mark_as_read_with_pending_request_uses_weaker_circumstance() {
        let manager = create_test_manager();
        let thread = test_thread(1);
        let sender = test_address(1);
        save_incoming(
            &manager,
            IncomingMessage::new(sender.clone(), 1, thread.clone(), 1),
        );

        manager
            .mark_as_read_locally_before_sort_id(1, &thread, true, || {})
            .unwrap();

        let txn = manager.begin_write().unwrap();
        let message = txn.storage().find_incoming_message(&sender, 1).unwrap().unwrap();
        assert_eq!(
            message.read_circumstance,
            Some(ReadCircumstance::ReadOnThisDeviceWhilePendingMessageRequest)
        );
        txn.commit().unwrap();
    }

    #[test]
    fn test_arrival_order_does_not_change_final_state() {
        // Receipt-then-message must converge to the same state as
        // message-then-receipt
        let recipient = test_address(1);

        let early = create_test_manager();
        early
            .process_read_receipts_from_recipient(&recipient, &[1000], 5000)
            .unwrap();
        let message = OutgoingMessage::new(1000, test_thread(1), 1);
        let mut txn = early.begin_write().unwrap();
        txn.storage().save_outgoing_message(message.clone()).unwrap();
        early
            .apply_early_read_receipts_for_outgoing_message(&mut txn, &message)
            .unwrap();
        txn.commit().unwrap();

        let late = create_test_manager();
        let mut txn = late.begin_write().unwrap();
        txn.storage().save_outgoing_message(message.clone()).unwrap();
        late.apply_early_read_receipts_for_outgoing_message(&mut txn, &message)
            .unwrap();
        txn.commit().unwrap();
        late.process_read_receipts_from_recipient(&recipient, &[1000], 5000)
            .unwrap();

        let txn = early.begin_write().unwrap();
        let from_early = txn.storage().find_outgoing_message(1000).unwrap().unwrap();
        txn.commit().unwrap();
        let txn = late.begin_write().unwrap();
        let from_late = txn.storage().find_outgoing_message(1000).unwrap().unwrap();
        txn.commit().unwrap();
        assert_eq!(from_early.read_timestamp_for(&recipient), Some(5000));
        assert_eq!(from_early.recipient_states, from_late.recipient_states);
    }
}
