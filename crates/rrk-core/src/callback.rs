//! Callback interface for engine events.
//!
//! This module provides the [`ReceiptCallback`] trait that applications can
//! implement to receive UI-refresh notifications when read state changes.
//! Notifications are fire-and-forget and only ever delivered after the
//! transaction that produced them has committed.

use std::fmt::Debug;

use rrk_storage_traits::ThreadId;

/// Callback interface for engine events.
pub trait ReceiptCallback: Send + Sync + Debug {
    /// Notifies that an incoming message in the given thread was marked as
    /// read on this device.
    ///
    /// Fired once per message, after the marking transaction commits. Never
    /// fired if the transaction rolls back.
    fn on_incoming_message_marked_as_read(&self, thread_id: &ThreadId);

    /// Notifies that a recipient reported reading an outgoing message in
    /// the given thread.
    ///
    /// Fired after the transaction recording the recipient state commits.
    fn on_outgoing_message_read_by_recipient(&self, thread_id: &ThreadId);
}
