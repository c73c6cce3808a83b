//! Shared test functions for storage provider implementations.
//!
//! Backend crates run these generic functions against their own provider to
//! verify trait-contract behavior that must hold for every implementation.

use uuid::Uuid;

use crate::messages::MessageStorage;
use crate::messages::types::{IncomingMessage, OutgoingMessage};
use crate::receipts::PendingReceiptStorage;
use crate::receipts::types::LinkedDeviceReadReceipt;
use crate::settings::SettingsStorage;
use crate::{ServiceAddress, ThreadId};

/// Create a deterministic address for tests
pub fn test_address(n: u128) -> ServiceAddress {
    ServiceAddress::new(Uuid::from_u128(n))
}

/// Create a deterministic thread ID for tests
pub fn test_thread(n: u128) -> ThreadId {
    ThreadId::new(Uuid::from_u128(n))
}

/// Create an unread incoming message for tests
pub fn create_test_incoming_message(
    sender: ServiceAddress,
    timestamp: u64,
    thread_id: ThreadId,
    sort_id: u64,
) -> IncomingMessage {
    IncomingMessage::new(sender, timestamp, thread_id, sort_id)
}

/// Create an outgoing message with no recipient state for tests
pub fn create_test_outgoing_message(
    sent_timestamp: u64,
    thread_id: ThreadId,
    sort_id: u64,
) -> OutgoingMessage {
    OutgoingMessage::new(sent_timestamp, thread_id, sort_id)
}

/// Test basic incoming message save and find functionality
pub fn test_save_and_find_incoming_message<S>(storage: S)
where
    S: MessageStorage,
{
    let sender = test_address(1);
    let thread = test_thread(10);
    let message = create_test_incoming_message(sender.clone(), 1000, thread, 1);

    storage.save_incoming_message(message.clone()).unwrap();

    let found = storage.find_incoming_message(&sender, 1000).unwrap();
    assert!(found.is_some());
    let found = found.unwrap();
    assert_eq!(found.sender, message.sender);
    assert_eq!(found.timestamp, message.timestamp);
    assert!(!found.is_read());

    // Same timestamp, different sender is a different message
    let other_sender = test_address(2);
    let result = storage.find_incoming_message(&other_sender, 1000).unwrap();
    assert!(result.is_none());

    // Same sender, different timestamp is absent
    let result = storage.find_incoming_message(&sender, 2000).unwrap();
    assert!(result.is_none());
}

/// Test that outgoing lookup is global, keyed only by sent timestamp
pub fn test_save_and_find_outgoing_message<S>(storage: S)
where
    S: MessageStorage,
{
    let message = create_test_outgoing_message(5000, test_thread(10), 1);
    storage.save_outgoing_message(message.clone()).unwrap();

    let found = storage.find_outgoing_message(5000).unwrap();
    assert!(found.is_some());
    assert_eq!(found.unwrap().thread_id, message.thread_id);

    let result = storage.find_outgoing_message(5001).unwrap();
    assert!(result.is_none());
}

/// Test the unread page query: thread scoping, cutoff, descending order
pub fn test_unread_incoming_messages_before<S>(storage: S)
where
    S: MessageStorage,
{
    let thread = test_thread(10);
    let other_thread = test_thread(11);

    for sort_id in 1..=5u64 {
        let sender = test_address(sort_id as u128);
        storage
            .save_incoming_message(create_test_incoming_message(
                sender,
                1000 + sort_id,
                thread.clone(),
                sort_id,
            ))
            .unwrap();
    }
    // A message in another thread must never be returned
    storage
        .save_incoming_message(create_test_incoming_message(
            test_address(99),
            2000,
            other_thread,
            2,
        ))
        .unwrap();

    let page = storage
        .unread_incoming_messages_before(&thread, 3, 100)
        .unwrap();
    let sort_ids: Vec<u64> = page.iter().map(|m| m.sort_id).collect();
    assert_eq!(sort_ids, vec![3, 2, 1]);

    // Limit bounds the page
    let page = storage
        .unread_incoming_messages_before(&thread, 5, 2)
        .unwrap();
    let sort_ids: Vec<u64> = page.iter().map(|m| m.sort_id).collect();
    assert_eq!(sort_ids, vec![5, 4]);

    // A zero limit is rejected
    assert!(storage
        .unread_incoming_messages_before(&thread, 5, 0)
        .is_err());
}

/// Test linked-device receipt save, find and consume
pub fn test_linked_device_receipt_roundtrip<S>(storage: S)
where
    S: PendingReceiptStorage,
{
    let sender = test_address(1);
    let receipt = LinkedDeviceReadReceipt::new(sender.clone(), 1000, 5000);

    storage.save_linked_device_receipt(receipt.clone()).unwrap();

    let found = storage.find_linked_device_receipt(&sender, 1000).unwrap();
    assert_eq!(found, Some(receipt.clone()));

    // Consuming removes the record
    let taken = storage.take_linked_device_receipt(&sender, 1000).unwrap();
    assert_eq!(taken, Some(receipt));
    let found = storage.find_linked_device_receipt(&sender, 1000).unwrap();
    assert!(found.is_none());

    // Consuming an absent record is not an error
    let taken = storage.take_linked_device_receipt(&sender, 1000).unwrap();
    assert!(taken.is_none());
}

/// Test that the recipient pending merge is max-timestamp-wins per recipient
pub fn test_recipient_receipt_merge_is_monotonic<S>(storage: S)
where
    S: PendingReceiptStorage,
{
    let recipient = test_address(1);

    storage
        .merge_recipient_receipt(1000, recipient.clone(), 5000)
        .unwrap();
    // A stale reordered delivery must not regress the stored timestamp
    storage
        .merge_recipient_receipt(1000, recipient.clone(), 4000)
        .unwrap();

    let record = storage.find_recipient_receipt(1000).unwrap().unwrap();
    assert_eq!(record.recipient_map.get(&recipient), Some(&5000));

    storage
        .merge_recipient_receipt(1000, recipient.clone(), 6000)
        .unwrap();
    let record = storage.take_recipient_receipts(1000).unwrap().unwrap();
    assert_eq!(record.recipient_map.get(&recipient), Some(&6000));

    // Consumed
    assert!(storage.find_recipient_receipt(1000).unwrap().is_none());
}

/// Test that the settings flag defaults to unset and persists writes
pub fn test_settings_flag_roundtrip<S>(storage: S)
where
    S: SettingsStorage,
{
    assert_eq!(storage.read_receipts_enabled().unwrap(), None);

    storage.set_read_receipts_enabled(true).unwrap();
    assert_eq!(storage.read_receipts_enabled().unwrap(), Some(true));

    storage.set_read_receipts_enabled(false).unwrap();
    assert_eq!(storage.read_receipts_enabled().unwrap(), Some(false));
}
