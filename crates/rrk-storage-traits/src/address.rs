//! Identity newtypes shared across the storage traits.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a user (a sender, a recipient, or the local user).
///
/// Receipts are keyed by the address of whoever read a message or whoever
/// sent the message a receipt refers to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceAddress(Uuid);

impl ServiceAddress {
    /// Create an address from an existing UUID
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh random address
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ServiceAddress {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identity of a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ThreadId(Uuid);

impl ThreadId {
    /// Create a thread ID from an existing UUID
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh random thread ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ThreadId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip() {
        let uuid = Uuid::new_v4();
        let address = ServiceAddress::new(uuid);
        assert_eq!(address.as_uuid(), &uuid);
        assert_eq!(ServiceAddress::from(uuid), address);
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(ServiceAddress::generate(), ServiceAddress::generate());
        assert_ne!(ThreadId::generate(), ThreadId::generate());
    }
}
