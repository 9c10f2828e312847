//! Server error types.
//!
//! Provides strongly-typed errors for the service layer:
//! - Account validation (username, password, confirmation)
//! - Authentication (unknown user and wrong password look the same)
//! - Messaging (unknown recipient, undecodable text)
//! - Wrapped failures from the core, crypto and storage layers

use std::fmt;

use hushpost_core::CoreError;
use hushpost_crypto::{CryptoError, KemError};

use crate::storage::StorageError;

/// Errors that can occur during service operations.
#[derive(Debug)]
pub enum ServerError {
    /// A required field was empty.
    MissingField,

    /// Username breaks the account rules. Carries the rule that failed.
    InvalidUsername(&'static str),

    /// Password breaks the account rules. Carries the rule that failed.
    InvalidPassword(&'static str),

    /// Password and confirmation differ.
    PasswordMismatch,

    /// Username is already registered.
    UsernameTaken(String),

    /// Login failed.
    ///
    /// Returned for both unknown usernames and wrong passwords so a caller
    /// cannot probe which accounts exist.
    InvalidCredentials,

    /// Recipient or conversation peer does not exist.
    UnknownUser(String),

    /// A message opened but its plaintext is not UTF-8 text.
    InvalidUtf8,

    /// Configuration is unusable (bad iteration count, unknown KEM backend).
    Config(String),

    /// Session, codec or record error from the protocol core.
    ///
    /// See `CoreError::is_fatal` and `CoreError::requires_login` for
    /// retryability.
    Core(CoreError),

    /// Symmetric crypto failure outside a message (secret key unwrap).
    Crypto(CryptoError),

    /// Storage operation failed.
    ///
    /// May be transient (I/O errors, see `StorageError::is_transient`) or
    /// fatal (serialization errors).
    Storage(StorageError),

    /// Password hashing backend failed. Indicates a bug or corrupt record.
    Internal(String),
}

impl ServerError {
    /// Whether the same call may succeed if simply retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_transient())
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField => write!(f, "all fields are required"),
            Self::InvalidUsername(rule) => write!(f, "invalid username: {rule}"),
            Self::InvalidPassword(rule) => write!(f, "invalid password: {rule}"),
            Self::PasswordMismatch => write!(f, "passwords do not match"),
            Self::UsernameTaken(name) => write!(f, "username already exists: {name}"),
            Self::InvalidCredentials => write!(f, "invalid username or password"),
            Self::UnknownUser(name) => write!(f, "unknown user: {name}"),
            Self::InvalidUtf8 => write!(f, "message is not valid UTF-8"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Core(err) => write!(f, "protocol error: {err}"),
            Self::Crypto(err) => write!(f, "crypto error: {err}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Core(err) => Some(err),
            Self::Crypto(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<CryptoError> for ServerError {
    fn from(err: CryptoError) -> Self {
        Self::Crypto(err)
    }
}

impl From<KemError> for ServerError {
    fn from(err: KemError) -> Self {
        Self::Core(CoreError::from(err))
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}
