//! Key encapsulation capability.
//!
//! The KEM is treated as a black box with a fixed byte-size contract
//! (ML-KEM-768 / Kyber768 sizes). Protocol code only sees the [`Kem`] trait,
//! so the production backend and the deterministic test double are
//! interchangeable.
//!
//! # Contract
//!
//! For any `(pk, sk)` produced together and any `(ct, ss) = encapsulate(pk)`,
//! `decapsulate(ct, sk) == ss`. Encapsulation is randomized: two calls with
//! the same `pk` yield different `ct` and different `ss`.

#[cfg(feature = "ml-kem")]
mod mlkem;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use std::{fmt, sync::Arc};

use zeroize::Zeroize;

#[cfg(feature = "ml-kem")]
pub use self::mlkem::MlKem768;
use crate::error::KemError;

/// Encapsulation (public) key size in bytes
pub const PUBLIC_KEY_SIZE: usize = 1184;

/// Decapsulation (secret) key size in bytes
pub const SECRET_KEY_SIZE: usize = 2400;

/// KEM ciphertext size in bytes
pub const CIPHERTEXT_SIZE: usize = 1088;

/// Shared secret size in bytes
pub const SHARED_SECRET_SIZE: usize = 32;

macro_rules! kem_bytes {
    ($(#[$meta:meta])* $name:ident, $size:expr, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(Box<[u8; $size]>);

        impl $name {
            /// Size of this value in bytes.
            pub const SIZE: usize = $size;

            /// Wrap an array of the exact size.
            pub fn from_bytes(bytes: [u8; $size]) -> Self {
                Self(Box::new(bytes))
            }

            /// Copy from a slice, checking the length.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, KemError> {
                let array: [u8; $size] = bytes.try_into().map_err(|_| KemError::InvalidLength {
                    what: $what,
                    expected: $size,
                    actual: bytes.len(),
                })?;
                Ok(Self::from_bytes(array))
            }

            /// Raw bytes.
            pub fn as_bytes(&self) -> &[u8; $size] {
                &self.0
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                self.0.as_slice()
            }
        }
    };
}

kem_bytes!(
    /// Long-term public key a peer encapsulates against.
    KemPublicKey,
    PUBLIC_KEY_SIZE,
    "public key"
);

kem_bytes!(
    /// Long-term secret key. Zeroized on drop.
    KemSecretKey,
    SECRET_KEY_SIZE,
    "secret key"
);

kem_bytes!(
    /// Ciphertext produced by encapsulation.
    KemCiphertext,
    CIPHERTEXT_SIZE,
    "KEM ciphertext"
);

kem_bytes!(
    /// Shared secret agreed through the KEM. Zeroized on drop.
    ///
    /// Never used directly as a cipher key; see [`crate::derive_key`].
    SharedSecret,
    SHARED_SECRET_SIZE,
    "shared secret"
);

impl Drop for KemSecretKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for KemPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KemPublicKey({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0],
            self.0[1],
            self.0[2],
            self.0[3]
        )
    }
}

impl fmt::Debug for KemCiphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KemCiphertext({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0],
            self.0[1],
            self.0[2],
            self.0[3]
        )
    }
}

impl fmt::Debug for KemSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KemSecretKey(<redacted>)")
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// A public/secret keypair generated together.
#[derive(Debug, Clone)]
pub struct KemKeyPair {
    /// Public half, stored in plaintext
    pub public_key: KemPublicKey,
    /// Secret half, stored only in password-wrapped form
    pub secret_key: KemSecretKey,
}

/// Key encapsulation mechanism.
///
/// Implementations must be safe to share across request threads.
pub trait Kem: Send + Sync {
    /// Backend name, as accepted by [`load_backend`].
    fn name(&self) -> &'static str;

    /// Generate a fresh keypair.
    fn generate_keypair(&self) -> Result<KemKeyPair, KemError>;

    /// Encapsulate a fresh shared secret against `public_key`.
    ///
    /// Probabilistic: repeated calls with the same key yield different
    /// outputs.
    fn encapsulate(
        &self,
        public_key: &KemPublicKey,
    ) -> Result<(KemCiphertext, SharedSecret), KemError>;

    /// Recover the shared secret from `ciphertext`.
    ///
    /// With a non-matching secret key this returns an unrelated shared
    /// secret (implicit rejection); the mismatch surfaces later as an
    /// envelope failure.
    fn decapsulate(
        &self,
        ciphertext: &KemCiphertext,
        secret_key: &KemSecretKey,
    ) -> Result<SharedSecret, KemError>;
}

/// Resolve a KEM backend by name.
///
/// # Errors
///
/// - `Unavailable`: the name is unknown or the backend was not compiled in
pub fn load_backend(name: &str) -> Result<Arc<dyn Kem>, KemError> {
    match name {
        #[cfg(feature = "ml-kem")]
        MlKem768::NAME => Ok(Arc::new(MlKem768::new())),
        other => Err(KemError::Unavailable { backend: other.to_string() }),
    }
}
