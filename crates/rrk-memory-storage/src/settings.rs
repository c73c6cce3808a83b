//! Memory-based storage implementation of the settings storage traits

use rrk_storage_traits::settings::SettingsStorage;
use rrk_storage_traits::settings::error::SettingsError;

use crate::RrkMemoryStorage;

impl SettingsStorage for RrkMemoryStorage {
    fn read_receipts_enabled(&self) -> Result<Option<bool>, SettingsError> {
        Ok(*self.read_receipts_enabled.read())
    }

    fn set_read_receipts_enabled(&self, enabled: bool) -> Result<(), SettingsError> {
        *self.read_receipts_enabled.write() = Some(enabled);
        Ok(())
    }
}
