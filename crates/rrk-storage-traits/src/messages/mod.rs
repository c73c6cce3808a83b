//! Messages module
//!
//! This module is responsible for storing and retrieving messages
//!
//! Incoming messages are keyed by (sender, send timestamp); outgoing
//! messages are keyed globally by their sent timestamp, because read
//! receipts arrive without thread context
//!
//! Here we also define the storage traits that are used to store and retrieve messages

use crate::{ServiceAddress, ThreadId};

pub mod error;
pub mod types;

use self::error::MessageError;
use self::types::*;

/// Maximum allowed page size for unread-message queries to prevent
/// resource exhaustion
pub const MAX_UNREAD_PAGE_SIZE: usize = 10_000;

/// Storage traits for the messages module
pub trait MessageStorage {
    /// Save an incoming message, replacing any existing message with the
    /// same (sender, timestamp) key
    fn save_incoming_message(&self, message: IncomingMessage) -> Result<(), MessageError>;

    /// Find an incoming message by its sender and send timestamp
    fn find_incoming_message(
        &self,
        sender: &ServiceAddress,
        timestamp: u64,
    ) -> Result<Option<IncomingMessage>, MessageError>;

    /// Save an outgoing message, replacing any existing message with the
    /// same sent timestamp
    fn save_outgoing_message(&self, message: OutgoingMessage) -> Result<(), MessageError>;

    /// Find an outgoing message by its sent timestamp
    ///
    /// This is a global lookup across all threads: receipts from recipients
    /// carry only the sent timestamp, not the thread.
    fn find_outgoing_message(
        &self,
        sent_timestamp: u64,
    ) -> Result<Option<OutgoingMessage>, MessageError>;

    /// Get unread incoming messages in a thread with `sort_id <= sort_id`,
    /// ordered by sort ID descending, at most `limit` entries
    ///
    /// # Errors
    ///
    /// Returns [`MessageError::InvalidParameters`] if:
    /// - `limit` is 0
    /// - `limit` exceeds [`MAX_UNREAD_PAGE_SIZE`]
    fn unread_incoming_messages_before(
        &self,
        thread_id: &ThreadId,
        sort_id: u64,
        limit: usize,
    ) -> Result<Vec<IncomingMessage>, MessageError>;
}
