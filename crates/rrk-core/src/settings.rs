//! The "read receipts enabled" setting.
//!
//! The persisted flag is cached in process-wide state after first load.
//! Cache updates ride the same transaction discipline as the persisted
//! value: settings changes refresh the cache from a post-commit hook, and
//! rolling back a transaction clears the cache, so a lazy load that
//! observed uncommitted state is discarded along with it. The cache can
//! never stay diverged from storage.

use std::sync::Arc;

use rrk_storage_traits::RrkStorageProvider;

use crate::error::Error;
use crate::transaction::WriteTransaction;
use crate::ReceiptManager;

impl<Storage> ReceiptManager<Storage>
where
    Storage: RrkStorageProvider,
{
    /// Load the persisted flag into the cache.
    ///
    /// Call once at process start; also serves as an explicit cache
    /// invalidation hook.
    pub fn prepare_cached_values(&self) -> Result<(), Error> {
        let enabled = self
            .storage()
            .read_receipts_enabled()
            .map_err(|e| Error::Settings(e.to_string()))?
            .unwrap_or(false);
        *self.settings_cache.write() = Some(enabled);
        Ok(())
    }

    /// Whether sending read receipts is enabled.
    ///
    /// Loads and caches the persisted flag on first access. A flag that has
    /// never been written reads as disabled. Storage failures read as
    /// disabled without poisoning the cache, so a later call retries the
    /// load.
    pub fn are_read_receipts_enabled(&self) -> bool {
        if let Some(enabled) = *self.settings_cache.read() {
            return enabled;
        }
        match self.storage().read_receipts_enabled() {
            Ok(value) => {
                let enabled = value.unwrap_or(false);
                *self.settings_cache.write() = Some(enabled);
                enabled
            }
            Err(e) => {
                tracing::warn!(
                    target: "rrk_core::settings",
                    "failed to load read receipts setting, treating as disabled: {}",
                    e
                );
                false
            }
        }
    }

    /// Persist the flag inside a caller-supplied transaction.
    ///
    /// The cache is refreshed from a post-commit hook and stays untouched
    /// if the transaction rolls back.
    pub fn set_read_receipts_enabled(
        &self,
        txn: &mut WriteTransaction<'_, Storage>,
        enabled: bool,
    ) -> Result<(), Error> {
        txn.storage()
            .set_read_receipts_enabled(enabled)
            .map_err(|e| Error::Settings(e.to_string()))?;

        let cache = Arc::clone(&self.settings_cache);
        txn.add_post_commit(move || {
            *cache.write() = Some(enabled);
        });
        Ok(())
    }

    /// Persist the flag in its own transaction and propagate the change to
    /// the local user's linked devices.
    pub fn set_read_receipts_enabled_with_sync(&self, enabled: bool) -> Result<(), Error> {
        let mut txn = self.begin_write()?;
        self.set_read_receipts_enabled(&mut txn, enabled)?;
        if let Some(transport) = self.transport.clone() {
            txn.add_post_commit(move || transport.send_configuration_sync(enabled));
        }
        txn.commit()
    }
}
