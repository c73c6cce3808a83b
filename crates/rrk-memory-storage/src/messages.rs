//! Memory-based storage implementation of the message storage traits

use rrk_storage_traits::messages::error::MessageError;
use rrk_storage_traits::messages::types::*;
use rrk_storage_traits::messages::{MAX_UNREAD_PAGE_SIZE, MessageStorage};
use rrk_storage_traits::{ServiceAddress, ThreadId};

use crate::RrkMemoryStorage;

impl MessageStorage for RrkMemoryStorage {
    fn save_incoming_message(&self, message: IncomingMessage) -> Result<(), MessageError> {
        let key = (message.sender.clone(), message.timestamp);
        self.incoming_messages.write().insert(key, message);
        Ok(())
    }

    fn find_incoming_message(
        &self,
        sender: &ServiceAddress,
        timestamp: u64,
    ) -> Result<Option<IncomingMessage>, MessageError> {
        let messages = self.incoming_messages.read();
        Ok(messages.get(&(sender.clone(), timestamp)).cloned())
    }

    fn save_outgoing_message(&self, message: OutgoingMessage) -> Result<(), MessageError> {
        self.outgoing_messages
            .write()
            .insert(message.sent_timestamp, message);
        Ok(())
    }

    fn find_outgoing_message(
        &self,
        sent_timestamp: u64,
    ) -> Result<Option<OutgoingMessage>, MessageError> {
        let messages = self.outgoing_messages.read();
        Ok(messages.get(&sent_timestamp).cloned())
    }

    fn unread_incoming_messages_before(
        &self,
        thread_id: &ThreadId,
        sort_id: u64,
        limit: usize,
    ) -> Result<Vec<IncomingMessage>, MessageError> {
        if limit == 0 {
            return Err(MessageError::InvalidParameters(
                "limit must be greater than 0".to_string(),
            ));
        }
        if limit > MAX_UNREAD_PAGE_SIZE {
            return Err(MessageError::InvalidParameters(format!(
                "limit {} exceeds maximum of {}",
                limit, MAX_UNREAD_PAGE_SIZE
            )));
        }

        let messages = self.incoming_messages.read();
        let mut page: Vec<IncomingMessage> = messages
            .values()
            .filter(|m| m.thread_id == *thread_id && !m.is_read() && m.sort_id <= sort_id)
            .cloned()
            .collect();
        page.sort_by(|a, b| b.sort_id.cmp(&a.sort_id));
        page.truncate(limit);
        Ok(page)
    }
}
