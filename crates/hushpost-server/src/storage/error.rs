//! Storage error type.

use thiserror::Error;

/// Errors from a storage backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Backend I/O or transaction failure. May succeed on retry.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Stored bytes could not be encoded or decoded
    #[error("storage serialization error: {0}")]
    Serialization(String),

    /// A uniqueness constraint was violated
    #[error("storage conflict: {0}")]
    Conflict(String),
}

impl StorageError {
    /// Returns true if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_io_is_transient() {
        assert!(StorageError::Io("disk full".to_string()).is_transient());
        assert!(!StorageError::Serialization("bad cbor".to_string()).is_transient());
        assert!(!StorageError::Conflict("username alice".to_string()).is_transient());
    }

    #[test]
    fn display() {
        let err = StorageError::Conflict("username alice".to_string());
        assert_eq!(err.to_string(), "storage conflict: username alice");
    }
}
