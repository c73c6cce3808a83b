//! Errors for the pending receipts module

/// Errors raised by pending-receipt storage operations.
///
/// Absence of a record is not an error; lookups return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),
}
