//! Outbound transport interface.
//!
//! This module provides the [`ReceiptTransport`] trait through which the
//! engine hands off outbound protocol messages: receipts to the senders of
//! messages the local user read, and sync messages to the local user's own
//! linked devices. Delivery, retry, and session security are the
//! transport's concern; the engine never performs network I/O inside a
//! storage transaction.

use std::fmt::Debug;

use rrk_storage_traits::receipts::types::LinkedDeviceReadReceipt;
use rrk_storage_traits::{ServiceAddress, ThreadId};

/// Outbound transport interface for receipt protocol messages.
pub trait ReceiptTransport: Send + Sync + Debug {
    /// Send one coalesced read receipt to `sender`, covering every listed
    /// message the local user read in `thread_id`.
    fn send_read_receipts(
        &self,
        sender: &ServiceAddress,
        thread_id: &ThreadId,
        message_timestamps: &[u64],
        read_timestamp: u64,
    );

    /// Mirror locally-read messages to the local user's linked devices.
    fn send_read_sync_to_linked_devices(
        &self,
        receipts: &[LinkedDeviceReadReceipt],
        read_timestamp: u64,
    );

    /// Mirror the read-by-recipient status of an outgoing message to the
    /// local user's linked devices.
    fn send_outgoing_read_status_sync(&self, sent_timestamp: u64);

    /// Propagate a change of the "read receipts enabled" setting to the
    /// local user's linked devices.
    fn send_configuration_sync(&self, read_receipts_enabled: bool);
}
