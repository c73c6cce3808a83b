//! Pending receipts module
//!
//! This module is responsible for storing receipts that arrived before the
//! message they refer to existed ("early" receipts)
//!
//! Two independent tables are kept: receipts about messages the local user
//! sent (reported by recipients), and receipts about messages the local
//! user received (reported by the local user's own linked devices). Entries
//! are consumed once the referenced message arrives
//!
//! Here we also define the storage traits that are used to store and retrieve receipts

use crate::ServiceAddress;

pub mod error;
pub mod types;

use self::error::ReceiptError;
use self::types::*;

/// Storage traits for the pending receipts module
pub trait PendingReceiptStorage {
    /// Save a linked-device receipt for a message that has not arrived yet,
    /// replacing any existing receipt for the same
    /// (sender, message ID timestamp) key
    ///
    /// Last-write-wins; linked-device sync is assumed monotonic within a
    /// session, so ordering is not verified here.
    fn save_linked_device_receipt(
        &self,
        receipt: LinkedDeviceReadReceipt,
    ) -> Result<(), ReceiptError>;

    /// Find a linked-device receipt without consuming it
    fn find_linked_device_receipt(
        &self,
        sender: &ServiceAddress,
        message_id_timestamp: u64,
    ) -> Result<Option<LinkedDeviceReadReceipt>, ReceiptError>;

    /// Look up and atomically delete the linked-device receipt for
    /// (sender, message ID timestamp)
    ///
    /// Absence is a valid, commonly-hit result, not an error.
    fn take_linked_device_receipt(
        &self,
        sender: &ServiceAddress,
        message_id_timestamp: u64,
    ) -> Result<Option<LinkedDeviceReadReceipt>, ReceiptError>;

    /// Merge a recipient's read timestamp into the pending record for
    /// `sent_timestamp`, creating the record if absent
    ///
    /// The merge keeps the greater of the stored and reported timestamps
    /// per recipient, so reordered duplicate deliveries cannot regress a
    /// recorded read time.
    fn merge_recipient_receipt(
        &self,
        sent_timestamp: u64,
        recipient: ServiceAddress,
        read_timestamp: u64,
    ) -> Result<(), ReceiptError>;

    /// Find the pending recipient record for a sent timestamp without
    /// consuming it
    fn find_recipient_receipt(
        &self,
        sent_timestamp: u64,
    ) -> Result<Option<RecipientReadReceipt>, ReceiptError>;

    /// Look up and atomically delete the pending recipient record for a
    /// sent timestamp
    ///
    /// Absence is a valid, commonly-hit result, not an error.
    fn take_recipient_receipts(
        &self,
        sent_timestamp: u64,
    ) -> Result<Option<RecipientReadReceipt>, ReceiptError>;
}
