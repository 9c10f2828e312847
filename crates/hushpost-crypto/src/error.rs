//! Error types for cryptographic operations

use thiserror::Error;

/// Errors from the KEM capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KemError {
    /// The requested backend is unknown or was not compiled in
    #[error("KEM backend unavailable: {backend}")]
    Unavailable {
        /// Backend name that was requested
        backend: String,
    },

    /// The primitive reported a non-success status
    #[error("KEM {operation} failed: {reason}")]
    OperationFailed {
        /// Operation that failed (keypair, encapsulate, decapsulate)
        operation: &'static str,
        /// Backend-provided reason
        reason: String,
    },

    /// Byte string does not match the fixed KEM size
    #[error("invalid {what} length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Which KEM value was malformed
        what: &'static str,
        /// Required length in bytes
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },
}

/// Errors from symmetric operations (envelope, key wrap).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Authentication tag, padding or framing check failed on unseal.
    ///
    /// Always means wrong key, wrong IV or tampered data.
    #[error("envelope corrupt: authentication or padding check failed")]
    EnvelopeCorrupt,

    /// Key or blob material has the wrong size
    #[error("invalid {what} length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Which value was malformed
        what: &'static str,
        /// Required length in bytes
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// Key derivation parameters are unusable
    #[error("invalid key derivation parameters: {0}")]
    InvalidParameters(&'static str),
}

impl From<KemError> for CryptoError {
    fn from(err: KemError) -> Self {
        match err {
            KemError::InvalidLength { what, expected, actual } => {
                Self::InvalidLength { what, expected, actual }
            },
            // A KEM value that fails to decode inside a sealed envelope means
            // the envelope content itself was not what we sealed.
            KemError::Unavailable { .. } | KemError::OperationFailed { .. } => {
                Self::EnvelopeCorrupt
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kem_error_display() {
        let err = KemError::InvalidLength { what: "public key", expected: 1184, actual: 12 };
        assert_eq!(err.to_string(), "invalid public key length: expected 1184, got 12");

        let err = KemError::Unavailable { backend: "kyber-9000".to_string() };
        assert_eq!(err.to_string(), "KEM backend unavailable: kyber-9000");
    }

    #[test]
    fn kem_length_error_keeps_its_shape() {
        let err: CryptoError =
            KemError::InvalidLength { what: "secret key", expected: 2400, actual: 2399 }.into();
        assert_eq!(err, CryptoError::InvalidLength {
            what: "secret key",
            expected: 2400,
            actual: 2399
        });
    }
}
