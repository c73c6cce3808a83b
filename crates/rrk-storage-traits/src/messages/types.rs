//! Types for the messages module

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ServiceAddress, ThreadId};

/// How an incoming message came to be read.
///
/// The variant order encodes receipt strength, weakest first. Read state is
/// only ever upgraded: a circumstance is applied to a message only when it
/// compares greater than the one already recorded. `Ord` derives from the
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReadCircumstance {
    /// A linked device reported the read while the thread still had a
    /// pending message request
    ReadOnLinkedDeviceWhilePendingMessageRequest,
    /// A linked device reported the read
    ReadOnLinkedDevice,
    /// This device read the message while the thread still had a pending
    /// message request
    ReadOnThisDeviceWhilePendingMessageRequest,
    /// This device read the message
    ReadOnThisDevice,
}

impl ReadCircumstance {
    /// Whether the read happened on this device (as opposed to being
    /// reported by a linked device)
    pub fn is_read_on_this_device(&self) -> bool {
        matches!(
            self,
            Self::ReadOnThisDevice | Self::ReadOnThisDeviceWhilePendingMessageRequest
        )
    }
}

/// An incoming message as the reconciliation engine sees it.
///
/// The message store owns the full message; the engine only reads and
/// advances the read-state fields. Uniquely identified by
/// (`sender`, `timestamp`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Identity of the message's original sender
    pub sender: ServiceAddress,
    /// The sender's send timestamp; composite key with `sender`
    pub timestamp: u64,
    /// The conversation thread this message belongs to
    pub thread_id: ThreadId,
    /// Position in the thread's durable total order
    pub sort_id: u64,
    /// How this message came to be read, if it has been read
    pub read_circumstance: Option<ReadCircumstance>,
    /// Wall-clock time of the first read, if the message has been read
    pub read_at: Option<u64>,
}

impl IncomingMessage {
    /// Create an unread incoming message
    pub fn new(sender: ServiceAddress, timestamp: u64, thread_id: ThreadId, sort_id: u64) -> Self {
        Self {
            sender,
            timestamp,
            thread_id,
            sort_id,
            read_circumstance: None,
            read_at: None,
        }
    }

    /// Whether this message has been marked read under any circumstance
    pub fn is_read(&self) -> bool {
        self.read_circumstance.is_some()
    }
}

/// Per-recipient delivery and read state of an outgoing message.
///
/// Timestamps only ever move forward; a read recipient is always also
/// delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientState {
    /// When the recipient's device acknowledged delivery, if it has
    pub delivered_at: Option<u64>,
    /// When the recipient read the message, if they have
    pub read_at: Option<u64>,
}

/// An outgoing message as the reconciliation engine sees it.
///
/// Uniquely identified by `sent_timestamp` across all threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// The send timestamp identifying this message
    pub sent_timestamp: u64,
    /// The conversation thread this message belongs to
    pub thread_id: ThreadId,
    /// Position in the thread's durable total order
    pub sort_id: u64,
    /// Delivery/read state per recipient
    pub recipient_states: HashMap<ServiceAddress, RecipientState>,
    /// Whether read state for this message has been mirrored to linked
    /// devices
    pub read_status_synced: bool,
}

impl OutgoingMessage {
    /// Create an outgoing message with no recipient state yet
    pub fn new(sent_timestamp: u64, thread_id: ThreadId, sort_id: u64) -> Self {
        Self {
            sent_timestamp,
            thread_id,
            sort_id,
            recipient_states: HashMap::new(),
            read_status_synced: false,
        }
    }

    /// The recorded read timestamp for a recipient, if any
    pub fn read_timestamp_for(&self, recipient: &ServiceAddress) -> Option<u64> {
        self.recipient_states
            .get(recipient)
            .and_then(|state| state.read_at)
    }
}
