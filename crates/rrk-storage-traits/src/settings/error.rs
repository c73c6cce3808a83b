//! Errors for the settings module

/// Errors raised by settings storage operations.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),
}
