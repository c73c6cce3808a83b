//! Errors for the messages module

/// Errors raised by message storage operations.
///
/// Absence of a message is not an error; lookups return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),
}
