use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one traversal session.
///
/// Every backend instance draws a fresh id at construction. Bookmarks and
/// lock handles carry the id of the session that produced them so that they
/// can be rejected when handed to a different session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new, time-ordered session id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Unique identifier of a traversal lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockId(Uuid);

impl LockId {
    /// Generate a new, time-ordered lock id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lock:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
        assert_ne!(LockId::generate(), LockId::generate());
    }

    #[test]
    fn display_is_prefixed() {
        assert!(SessionId::generate().to_string().starts_with("session:"));
        assert!(LockId::generate().to_string().starts_with("lock:"));
    }

    #[test]
    fn serde_roundtrip() {
        let id = LockId::generate();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: LockId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
