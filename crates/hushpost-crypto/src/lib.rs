//! Hushpost Cryptographic Primitives
//!
//! Cryptographic building blocks for the Hushpost hybrid message protocol.
//! Symmetric operations are pure functions: callers provide IVs and salts so
//! that every output is reproducible under test. The KEM is the one
//! probabilistic primitive and sits behind the [`Kem`] trait so it can be
//! injected (production ML-KEM-768, or a deterministic double in tests).
//!
//! # Key Hierarchy
//!
//! Each login mints one random message key. Every message sent during that
//! login is sealed under it, and the message key itself is sealed once per
//! participant under a key derived from a fresh KEM encapsulation against
//! that participant's long-term public key.
//!
//! ```text
//! Participant Public Key
//!        │
//!        ▼
//! KEM Encapsulate → (KEM Ciphertext, Shared Secret)
//!        │
//!        ▼
//! SHA-256 → Wrapping Key
//!        │
//!        ▼
//! Envelope Seal(Message Key) → Wrap
//!
//! Message Key → Envelope Seal(Plaintext) → Message Blob
//! ```
//!
//! The long-term KEM secret key is kept at rest under a key derived from the
//! user's password with PBKDF2-HMAC-SHA256.
//!
//! # Security
//!
//! Confidentiality:
//! - AES-256-CBC with a fresh random IV per seal
//! - ML-KEM-768 for the per-participant key transport
//!
//! Integrity:
//! - Encrypt-then-MAC with HMAC-SHA256 over `iv || ciphertext`
//! - Tag is verified in constant time before any decryption happens
//! - Every failure (length, tag, padding) surfaces as one error kind
//!
//! Key hygiene:
//! - Secret keys, shared secrets and symmetric keys are zeroized on drop
//! - Fixed byte sizes are enforced at every construction boundary

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
mod error;
pub mod kdf;
pub mod kem;
pub mod password;

pub use envelope::{IV_SIZE, KEY_SIZE, SealedBlob, SymmetricKey, TAG_SIZE, seal, unseal};
pub use error::{CryptoError, KemError};
pub use kdf::derive_key;
pub use kem::{
    CIPHERTEXT_SIZE, Kem, KemCiphertext, KemKeyPair, KemPublicKey, KemSecretKey,
    PUBLIC_KEY_SIZE, SECRET_KEY_SIZE, SHARED_SECRET_SIZE, SharedSecret, load_backend,
};
pub use password::{
    DEFAULT_PBKDF2_ITERATIONS, Pbkdf2Params, SALT_SIZE, unwrap_secret_key, wrap_secret_key,
};
