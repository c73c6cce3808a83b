//! Memory-based storage implementation of the pending receipt storage traits

use rrk_storage_traits::ServiceAddress;
use rrk_storage_traits::receipts::PendingReceiptStorage;
use rrk_storage_traits::receipts::error::ReceiptError;
use rrk_storage_traits::receipts::types::*;

use crate::RrkMemoryStorage;

impl PendingReceiptStorage for RrkMemoryStorage {
    fn save_linked_device_receipt(
        &self,
        receipt: LinkedDeviceReadReceipt,
    ) -> Result<(), ReceiptError> {
        let key = (receipt.sender.clone(), receipt.message_id_timestamp);
        self.linked_device_receipts.write().insert(key, receipt);
        Ok(())
    }

    fn find_linked_device_receipt(
        &self,
        sender: &ServiceAddress,
        message_id_timestamp: u64,
    ) -> Result<Option<LinkedDeviceReadReceipt>, ReceiptError> {
        let receipts = self.linked_device_receipts.read();
        Ok(receipts
            .get(&(sender.clone(), message_id_timestamp))
            .cloned())
    }

    fn take_linked_device_receipt(
        &self,
        sender: &ServiceAddress,
        message_id_timestamp: u64,
    ) -> Result<Option<LinkedDeviceReadReceipt>, ReceiptError> {
        let mut receipts = self.linked_device_receipts.write();
        Ok(receipts.remove(&(sender.clone(), message_id_timestamp)))
    }

    fn merge_recipient_receipt(
        &self,
        sent_timestamp: u64,
        recipient: ServiceAddress,
        read_timestamp: u64,
    ) -> Result<(), ReceiptError> {
        let mut receipts = self.recipient_receipts.write();
        receipts
            .entry(sent_timestamp)
            .or_insert_with(|| RecipientReadReceipt::new(sent_timestamp))
            .merge(recipient, read_timestamp);
        Ok(())
    }

    fn find_recipient_receipt(
        &self,
        sent_timestamp: u64,
    ) -> Result<Option<RecipientReadReceipt>, ReceiptError> {
        let receipts = self.recipient_receipts.read();
        Ok(receipts.get(&sent_timestamp).cloned())
    }

    fn take_recipient_receipts(
        &self,
        sent_timestamp: u64,
    ) -> Result<Option<RecipientReadReceipt>, ReceiptError> {
        let mut receipts = self.recipient_receipts.write();
        Ok(receipts.remove(&sent_timestamp))
    }
}
