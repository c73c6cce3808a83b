//! Types for the pending receipts module

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ServiceAddress;

/// An early receipt reported by one of the local user's own linked devices
/// about a message the local user received.
///
/// Immutable once created; uniquely identified by
/// (`sender`, `message_id_timestamp`); deleted once consumed by a matching
/// incoming message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedDeviceReadReceipt {
    /// Identity of the target message's original sender
    pub sender: ServiceAddress,
    /// The send timestamp identifying the target message
    pub message_id_timestamp: u64,
    /// When the linked device reported the message as read
    pub read_timestamp: u64,
}

impl LinkedDeviceReadReceipt {
    /// Create a linked-device receipt
    pub fn new(sender: ServiceAddress, message_id_timestamp: u64, read_timestamp: u64) -> Self {
        Self {
            sender,
            message_id_timestamp,
            read_timestamp,
        }
    }
}

/// Early receipts about a message the local user sent, reported by its
/// recipients.
///
/// Keyed by the sent timestamp of the target outgoing message. Mutated by
/// merging new recipient entries; deleted once consumed by the
/// corresponding outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientReadReceipt {
    /// The send timestamp identifying the target outgoing message
    pub sent_timestamp: u64,
    /// Recipient identity to read timestamp, one entry per distinct
    /// recipient who has read the message
    pub recipient_map: HashMap<ServiceAddress, u64>,
}

impl RecipientReadReceipt {
    /// Create an empty record for a sent timestamp
    pub fn new(sent_timestamp: u64) -> Self {
        Self {
            sent_timestamp,
            recipient_map: HashMap::new(),
        }
    }

    /// Merge a recipient's read timestamp, keeping the greater of the
    /// stored and reported values
    pub fn merge(&mut self, recipient: ServiceAddress, read_timestamp: u64) {
        let entry = self.recipient_map.entry(recipient).or_insert(read_timestamp);
        if *entry < read_timestamp {
            *entry = read_timestamp;
        }
    }
}
