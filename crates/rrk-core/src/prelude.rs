//! Convenience re-exports for common usage of the engine.
//!
//! ```no_run
//! use rrk_core::prelude::*;
//! use rrk_memory_storage::RrkMemoryStorage;
//!
//! let manager = ReceiptManager::new(RrkMemoryStorage::default());
//! ```

pub use crate::callback::ReceiptCallback;
pub use crate::error::Error;
pub use crate::outbound::OutboundQueueStats;
pub use crate::receipts::ReadSyncEntry;
pub use crate::transaction::WriteTransaction;
pub use crate::transport::ReceiptTransport;
pub use crate::{ReceiptConfig, ReceiptManager, ReceiptManagerBuilder};

pub use rrk_storage_traits::messages::types::{
    IncomingMessage, OutgoingMessage, ReadCircumstance, RecipientState,
};
pub use rrk_storage_traits::receipts::types::{LinkedDeviceReadReceipt, RecipientReadReceipt};
pub use rrk_storage_traits::{RrkStorageProvider, ServiceAddress, ThreadId};
