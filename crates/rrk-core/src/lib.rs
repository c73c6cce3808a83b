//! A read-receipt reconciliation engine for messaging applications
//!
//! This crate reconciles read-state across four asynchronous, causally
//! unordered event sources: local reads, receipts from recipients of sent
//! messages, receipts from the local user's own linked devices, and the
//! linked-device sync of local reads. Receipts that arrive before their
//! target message are persisted and replayed idempotently once the message
//! arrives. All mutations run inside serialized write transactions with
//! post-commit notification delivery.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use parking_lot::{Mutex, RwLock};
use rrk_storage_traits::RrkStorageProvider;

pub mod callback;
pub mod error;
mod outbound;
pub mod prelude;
pub mod receipts;
pub mod settings;
pub mod transaction;
pub mod transport;
mod util;

pub use self::error::Error;
pub use self::outbound::OutboundQueueStats;
// Re-export identity newtypes for convenience
pub use rrk_storage_traits::{ServiceAddress, ThreadId};

use self::callback::ReceiptCallback;
use self::outbound::OutboundReceiptState;
use self::transport::ReceiptTransport;

/// Default number of messages marked read per transaction by the batched
/// mark-as-read operation
pub const DEFAULT_MARK_AS_READ_CHUNK_SIZE: usize = 500;

/// Configuration for engine behavior
#[derive(Debug, Clone)]
pub struct ReceiptConfig {
    /// Identity of the local user; messages sent by this address never
    /// trigger outbound receipts. When unset, no message is considered
    /// self-sent.
    pub local_address: Option<ServiceAddress>,
    /// Number of messages marked read per transaction by
    /// [`ReceiptManager::mark_as_read_locally_before_sort_id`]
    pub mark_as_read_chunk_size: usize,
}

impl Default for ReceiptConfig {
    fn default() -> Self {
        Self {
            local_address: None,
            mark_as_read_chunk_size: DEFAULT_MARK_AS_READ_CHUNK_SIZE,
        }
    }
}

impl ReceiptConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the local user's address
    pub fn with_local_address(mut self, address: ServiceAddress) -> Self {
        self.local_address = Some(address);
        self
    }

    /// Set the mark-as-read chunk size
    pub fn with_mark_as_read_chunk_size(mut self, chunk_size: usize) -> Self {
        self.mark_as_read_chunk_size = chunk_size;
        self
    }
}

/// Builder for constructing engine instances
///
/// This builder provides a fluent API for configuring and creating
/// [`ReceiptManager`] instances.
///
/// # Examples
///
/// ```no_run
/// use rrk_core::{ReceiptConfig, ReceiptManager};
/// use rrk_memory_storage::RrkMemoryStorage;
///
/// // Simple usage with defaults
/// let manager = ReceiptManager::new(RrkMemoryStorage::default());
///
/// // With custom configuration
/// let manager = ReceiptManager::builder(RrkMemoryStorage::default())
///     .with_config(ReceiptConfig::new())
///     .build();
/// ```
#[derive(Debug)]
pub struct ReceiptManagerBuilder<Storage> {
    storage: Storage,
    config: ReceiptConfig,
    callback: Option<Arc<dyn ReceiptCallback>>,
    transport: Option<Arc<dyn ReceiptTransport>>,
}

impl<Storage> ReceiptManagerBuilder<Storage>
where
    Storage: RrkStorageProvider,
{
    /// Create a new builder with the given storage
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            config: ReceiptConfig::default(),
            callback: None,
            transport: None,
        }
    }

    /// Set a custom configuration
    pub fn with_config(mut self, config: ReceiptConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the UI-notification callback
    pub fn with_callback(mut self, callback: Arc<dyn ReceiptCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Set the outbound transport
    pub fn with_transport(mut self, transport: Arc<dyn ReceiptTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the engine instance with the configured settings
    pub fn build(self) -> ReceiptManager<Storage> {
        ReceiptManager {
            storage: self.storage,
            config: self.config,
            callback: self.callback,
            transport: self.transport,
            write_lock: Mutex::new(()),
            savepoint_seq: AtomicU64::new(0),
            settings_cache: Arc::new(RwLock::new(None)),
            outbound: Mutex::new(OutboundReceiptState::default()),
        }
    }
}

/// The read-receipt reconciliation engine.
///
/// This struct provides the core functionality for read-state
/// reconciliation:
/// - Receipt processing (from recipients and from linked devices)
/// - Local read handling, including batched mark-as-read
/// - Early-receipt persistence and replay
/// - Outbound receipt batching and the read-receipts setting
///
/// It uses a generic storage provider that implements the
/// [`RrkStorageProvider`] trait, allowing for flexible storage backends.
///
/// All public mutating entry points either open their own serialized write
/// transaction or require one created by [`ReceiptManager::begin_write`];
/// see each method's documentation.
#[derive(Debug)]
pub struct ReceiptManager<Storage>
where
    Storage: RrkStorageProvider,
{
    storage: Storage,
    config: ReceiptConfig,
    callback: Option<Arc<dyn ReceiptCallback>>,
    transport: Option<Arc<dyn ReceiptTransport>>,
    /// The write-serialization backbone: every write transaction holds this
    /// for its whole life
    write_lock: Mutex<()>,
    /// Monotonic counter for unique savepoint names
    savepoint_seq: AtomicU64,
    /// Cached "read receipts enabled" flag; `None` until first load
    settings_cache: Arc<RwLock<Option<bool>>>,
    /// Accumulated outbound receipts awaiting flush
    outbound: Mutex<OutboundReceiptState>,
}

impl<Storage> ReceiptManager<Storage>
where
    Storage: RrkStorageProvider,
{
    /// Create a builder for constructing an engine instance
    ///
    /// This is the recommended way to create instances when you need a
    /// callback, a transport, or custom configuration.
    pub fn builder(storage: Storage) -> ReceiptManagerBuilder<Storage> {
        ReceiptManagerBuilder::new(storage)
    }

    /// Construct a new engine instance with default configuration
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use rrk_core::ReceiptManager;
    /// # use rrk_memory_storage::RrkMemoryStorage;
    /// let manager = ReceiptManager::new(RrkMemoryStorage::default());
    /// ```
    pub fn new(storage: Storage) -> Self {
        Self::builder(storage).build()
    }

    /// Get the storage provider
    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Whether an address is the local user's
    pub(crate) fn is_local_address(&self, address: &ServiceAddress) -> bool {
        self.config.local_address.as_ref() == Some(address)
    }
}
