//! Hybrid message codec.
//!
//! Seals a plaintext once under the sender's session message key and wraps
//! that key twice: for the sender (self-readability) and for the receiver.
//! Either participant can then unseal the same persisted record with their
//! own secret key and nothing else.
//!
//! The codec is persistence-agnostic. Sealing the same logical message again
//! after a failed write is safe: both wraps come from the session cache, so
//! no further encapsulation happens.

use std::sync::Arc;

use hushpost_crypto::{Kem, KemPublicKey, KemSecretKey, envelope};

use crate::{
    env::Environment,
    error::CoreError,
    id::{SessionId, UserId},
    message::EncryptedMessage,
    session::SessionCache,
};

/// A participant as seen by the codec: id plus long-term public key.
#[derive(Debug, Clone, Copy)]
pub struct Participant<'a> {
    /// User id
    pub id: &'a UserId,
    /// Long-term KEM public key
    pub public_key: &'a KemPublicKey,
}

/// Seals and unseals messages against a shared [`SessionCache`].
pub struct HybridCodec<E: Environment> {
    sessions: Arc<SessionCache<E>>,
}

impl<E: Environment> HybridCodec<E> {
    /// Create a codec over `sessions`.
    pub fn new(sessions: Arc<SessionCache<E>>) -> Self {
        Self { sessions }
    }

    /// The session cache this codec draws keys from.
    pub fn sessions(&self) -> &Arc<SessionCache<E>> {
        &self.sessions
    }

    /// Seal `plaintext` from `sender` to `receiver` within a session.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` / `SessionExpired`: the session is not live
    /// - `Unauthorized`: `sender` does not own the session
    /// - `InvalidRecipient`: `receiver` is the sender
    /// - `KemOperationFailed`: encapsulation failed
    pub fn seal_message(
        &self,
        session_id: SessionId,
        sender: Participant<'_>,
        receiver: Participant<'_>,
        plaintext: &[u8],
    ) -> Result<EncryptedMessage, CoreError> {
        let owner = self.sessions.owner(session_id)?;
        if &owner != sender.id {
            return Err(CoreError::Unauthorized { user: sender.id.clone() });
        }
        if sender.id == receiver.id {
            return Err(CoreError::InvalidRecipient(receiver.id.clone()));
        }

        self.sessions.touch(session_id)?;
        let message_key = self.sessions.get_message_key(session_id)?;

        let sender_wrap =
            self.sessions.get_or_create_wrap(session_id, sender.id, sender.public_key)?;
        let receiver_wrap =
            self.sessions.get_or_create_wrap(session_id, receiver.id, receiver.public_key)?;

        let env = self.sessions.env();
        let message_blob = envelope::seal(&message_key, env.random_array(), plaintext);

        Ok(EncryptedMessage::from_parts(
            sender.id.clone(),
            receiver.id.clone(),
            message_blob,
            sender_wrap,
            receiver_wrap,
            env.wall_clock(),
        ))
    }

    /// Unseal `message` as the owner of `session_id`. A successful unseal
    /// refreshes the session TTL.
    pub fn unseal_for_session(
        &self,
        message: &EncryptedMessage,
        session_id: SessionId,
    ) -> Result<Vec<u8>, CoreError> {
        let requester = self.sessions.owner(session_id)?;
        let secret_key = self.sessions.get_secret_key(session_id)?;
        let plaintext = unseal_message(self.sessions.kem(), message, &requester, &secret_key)?;
        self.sessions.touch(session_id)?;
        Ok(plaintext)
    }
}

/// Unseal `message` for `requester` using their long-term secret key.
///
/// Picks the receiver wrap when the requester is the receiver and the sender
/// wrap when they are the sender. Both the wrap and the body must open;
/// no partial plaintext is ever returned.
///
/// # Errors
///
/// - `Unauthorized`: `requester` is neither sender nor receiver
/// - `EnvelopeCorrupt`: wrong secret key, or tampered wrap or body
pub fn unseal_message(
    kem: &dyn Kem,
    message: &EncryptedMessage,
    requester: &UserId,
    secret_key: &KemSecretKey,
) -> Result<Vec<u8>, CoreError> {
    let wrap = if requester == message.to() {
        message.receiver_wrap()
    } else if requester == message.from() {
        message.sender_wrap()
    } else {
        return Err(CoreError::Unauthorized { user: requester.clone() });
    };

    let message_key = wrap.open(kem, secret_key)?;
    Ok(envelope::unseal(&message_key, message.message_blob())?)
}
