//! Hushpost Protocol Core
//!
//! The hybrid message protocol: every message is sealed once under a
//! per-login message key, and that key is wrapped independently for the
//! sender and the receiver with a fresh KEM encapsulation each. Either
//! participant opens the same stored record with only their own secret key.
//!
//! # Architecture
//!
//! No I/O happens here. Time and randomness come from an injected
//! [`Environment`], the KEM from an injected [`hushpost_crypto::Kem`], and
//! persistence is the caller's job via the hex [`record`] types.
//!
//! - [`SessionCache`]: per-login secrets and memoized per-peer wraps
//! - [`HybridCodec`]: seal for two readers, unseal for either
//! - [`order_conversation`]: deterministic listing order
//!
//! # Invariants
//!
//! - A session's message key never changes once minted
//! - The two wraps in a message never share a KEM ciphertext
//! - Unseal returns the full plaintext or an error, never garbage

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod codec;
pub mod conversation;
pub mod env;
pub mod error;
pub mod id;
pub mod message;
pub mod record;
pub mod session;
pub mod wrap;

pub use codec::{HybridCodec, Participant, unseal_message};
pub use conversation::{StoredMessage, order_conversation};
pub use env::Environment;
pub use error::CoreError;
pub use id::{SessionId, UserId};
pub use message::EncryptedMessage;
pub use record::{MessageRecord, SessionRecord, UserRecord, WrapRecord};
pub use session::{DEFAULT_MAX_TOMBSTONES, DEFAULT_SESSION_TTL, SessionCache};
pub use wrap::Wrap;
