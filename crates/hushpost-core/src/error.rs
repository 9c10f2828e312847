//! Error types for the hybrid message protocol.
//!
//! Every crypto failure is typed and returned; nothing in the core is retried
//! or logged-and-ignored. Callers map these kinds to their own responses.

use hushpost_crypto::{CryptoError, KemError};
use thiserror::Error;

use crate::id::{SessionId, UserId};

/// Errors from the session cache, the message codec and record decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The KEM backend could not be loaded
    #[error("KEM unavailable: {0}")]
    KemUnavailable(String),

    /// The KEM primitive reported a failure
    #[error("KEM operation failed: {0}")]
    KemOperationFailed(String),

    /// Unseal failed: wrong key, wrong IV, or tampered data
    #[error("envelope corrupt")]
    EnvelopeCorrupt,

    /// No session with this id was ever opened (or its tombstone was evicted)
    #[error("session not found: {0:?}")]
    SessionNotFound(SessionId),

    /// The session lapsed or was closed
    #[error("session expired: {0:?}")]
    SessionExpired(SessionId),

    /// A live session already holds this id
    #[error("session already live: {0:?}")]
    SessionExists(SessionId),

    /// The user may not perform this operation
    #[error("unauthorized: {user} is not a participant")]
    Unauthorized {
        /// User that attempted the operation
        user: UserId,
    },

    /// A message cannot be addressed to this recipient
    #[error("invalid recipient: {0}")]
    InvalidRecipient(UserId),

    /// Fixed-size value has the wrong length
    #[error("invalid {what} length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Which value was malformed
        what: &'static str,
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// A storage-boundary field could not be decoded
    #[error("invalid encoding in {field}: {reason}")]
    InvalidEncoding {
        /// Record field that failed to decode
        field: &'static str,
        /// Decoder message
        reason: String,
    },
}

impl CoreError {
    /// Returns true if the process cannot continue serving requests.
    ///
    /// Only a missing KEM backend is fatal; every other error is scoped to
    /// one request or one session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::KemUnavailable(_))
    }

    /// Returns true if the caller must log in again to proceed.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::SessionNotFound(_) | Self::SessionExpired(_))
    }
}

impl From<KemError> for CoreError {
    fn from(err: KemError) -> Self {
        match err {
            KemError::Unavailable { backend } => Self::KemUnavailable(backend),
            KemError::OperationFailed { .. } => Self::KemOperationFailed(err.to_string()),
            KemError::InvalidLength { what, expected, actual } => {
                Self::InvalidLength { what, expected, actual }
            },
        }
    }
}

impl From<CryptoError> for CoreError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidLength { what, expected, actual } => {
                Self::InvalidLength { what, expected, actual }
            },
            // The core never stretches passwords, so parameter errors can
            // only come from a malformed envelope.
            CryptoError::EnvelopeCorrupt | CryptoError::InvalidParameters(_) => {
                Self::EnvelopeCorrupt
            },
        }
    }
}
