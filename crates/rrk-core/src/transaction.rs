//! Serialized write transactions over the storage provider.
//!
//! Every mutating operation in the engine runs inside a
//! [`WriteTransaction`]. A transaction holds the engine-wide write lock for
//! its whole life (the serialization backbone; there is no finer-grained
//! locking) and brackets its writes with a named storage snapshot: commit
//! releases the snapshot, and dropping an uncommitted transaction rolls the
//! storage back to it.
//!
//! Post-commit hooks registered on a transaction run only after a
//! successful commit, in registration order, after the write lock has been
//! released. They never run on rollback, which is what keeps UI
//! notifications and outbound sync hand-offs consistent with durable state.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use parking_lot::{MutexGuard, RwLock};
use rrk_storage_traits::RrkStorageProvider;

use crate::error::Error;
use crate::ReceiptManager;

/// An open write transaction.
///
/// Created by [`ReceiptManager::begin_write`]. Consumed by
/// [`commit`](WriteTransaction::commit); dropping it without committing
/// rolls back every write made through it.
pub struct WriteTransaction<'a, Storage>
where
    Storage: RrkStorageProvider,
{
    storage: &'a Storage,
    savepoint: String,
    finished: bool,
    post_commit: Vec<Box<dyn FnOnce() + Send + 'a>>,
    /// Cleared on rollback: the cached settings flag may have been loaded
    /// from state this transaction is about to discard
    settings_cache: Arc<RwLock<Option<bool>>>,
    _guard: MutexGuard<'a, ()>,
}

impl<Storage> ReceiptManager<Storage>
where
    Storage: RrkStorageProvider,
{
    /// Open a serialized write transaction.
    ///
    /// Blocks until any other write transaction on this engine has
    /// finished. Do not call from code already inside a transaction on the
    /// same engine; entry points that run inside a caller's transaction
    /// take `&mut WriteTransaction` instead.
    pub fn begin_write(&self) -> Result<WriteTransaction<'_, Storage>, Error> {
        let guard = self.write_lock.lock();
        let seq = self.savepoint_seq.fetch_add(1, Ordering::Relaxed);
        let savepoint = format!("rrk_write_{}", seq);
        self.storage().create_named_snapshot(&savepoint)?;
        Ok(WriteTransaction {
            storage: self.storage(),
            savepoint,
            finished: false,
            post_commit: Vec::new(),
            settings_cache: Arc::clone(&self.settings_cache),
            _guard: guard,
        })
    }
}

impl<'a, Storage> WriteTransaction<'a, Storage>
where
    Storage: RrkStorageProvider,
{
    /// Access the storage provider this transaction writes through
    pub fn storage(&self) -> &'a Storage {
        self.storage
    }

    /// Register a hook to run after this transaction commits.
    ///
    /// Hooks run in registration order, after the write lock is released.
    /// They never run if the transaction rolls back.
    pub fn add_post_commit(&mut self, hook: impl FnOnce() + Send + 'a) {
        self.post_commit.push(Box::new(hook));
    }

    /// Commit the transaction, releasing the savepoint and running
    /// post-commit hooks.
    pub fn commit(mut self) -> Result<(), Error> {
        self.storage.release_snapshot(&self.savepoint)?;
        self.finished = true;
        let hooks = std::mem::take(&mut self.post_commit);
        // Release the write lock before running hooks; hooks must never
        // execute inside the storage critical section.
        drop(self);
        for hook in hooks {
            hook();
        }
        Ok(())
    }
}

impl<'a, Storage> Drop for WriteTransaction<'a, Storage>
where
    Storage: RrkStorageProvider,
{
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // The settings cache may hold a value lazily loaded from state this
        // rollback discards; force a reload from storage on next access
        *self.settings_cache.write() = None;
        if let Err(e) = self.storage.rollback_to_snapshot(&self.savepoint) {
            tracing::error!(
                target: "rrk_core::transaction",
                "failed to roll back write transaction {}: {}",
                self.savepoint,
                e
            );
            return;
        }
        if let Err(e) = self.storage.release_snapshot(&self.savepoint) {
            tracing::error!(
                target: "rrk_core::transaction",
                "failed to release savepoint {} after rollback: {}",
                self.savepoint,
                e
            );
        }
    }
}
