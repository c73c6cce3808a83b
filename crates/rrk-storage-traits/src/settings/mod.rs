//! Settings module
//!
//! This module is responsible for persisting the "read receipts enabled"
//! flag. Caching lives in the engine, not here.

pub mod error;

use self::error::SettingsError;

/// Storage traits for the settings module
pub trait SettingsStorage {
    /// Read the persisted "read receipts enabled" flag
    ///
    /// Returns `Ok(None)` if the flag has never been written.
    fn read_receipts_enabled(&self) -> Result<Option<bool>, SettingsError>;

    /// Persist the "read receipts enabled" flag
    fn set_read_receipts_enabled(&self, enabled: bool) -> Result<(), SettingsError>;
}
