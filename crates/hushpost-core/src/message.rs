//! Sealed message as produced by the codec and persisted by callers.

use chrono::{DateTime, Utc};
use hushpost_crypto::SealedBlob;

use crate::{id::UserId, wrap::Wrap};

/// A message sealed for exactly two readers.
///
/// `message_blob` is the plaintext under the sender's session message key.
/// The same message key is wrapped twice with independent encapsulations:
/// once for the sender, once for the receiver. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedMessage {
    from: UserId,
    to: UserId,
    message_blob: SealedBlob,
    sender_wrap: Wrap,
    receiver_wrap: Wrap,
    timestamp: DateTime<Utc>,
}

impl EncryptedMessage {
    /// Assemble a message from its parts (codec output or decoded record).
    pub fn from_parts(
        from: UserId,
        to: UserId,
        message_blob: SealedBlob,
        sender_wrap: Wrap,
        receiver_wrap: Wrap,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { from, to, message_blob, sender_wrap, receiver_wrap, timestamp }
    }

    /// Sender.
    pub fn from(&self) -> &UserId {
        &self.from
    }

    /// Receiver.
    pub fn to(&self) -> &UserId {
        &self.to
    }

    /// Plaintext sealed under the session message key.
    pub fn message_blob(&self) -> &SealedBlob {
        &self.message_blob
    }

    /// Message key wrapped for the sender.
    pub fn sender_wrap(&self) -> &Wrap {
        &self.sender_wrap
    }

    /// Message key wrapped for the receiver.
    pub fn receiver_wrap(&self) -> &Wrap {
        &self.receiver_wrap
    }

    /// Time the message was sealed.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether `user` is the sender or the receiver.
    pub fn involves(&self, user: &UserId) -> bool {
        &self.from == user || &self.to == user
    }
}
