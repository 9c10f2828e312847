//! Storage-boundary records.
//!
//! Typed values cross into storage and external caches only through these
//! records. Every byte field is lowercase hex; timestamps are RFC 3339 UTC.
//! Decoding checks hex and every fixed length before building typed values,
//! so a malformed record never reaches the crypto layer.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use hushpost_crypto::{
    KEY_SIZE, KemCiphertext, KemPublicKey, KemSecretKey, SALT_SIZE, SealedBlob,
    SymmetricKey,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::CoreError,
    id::{SessionId, UserId},
    message::EncryptedMessage,
    wrap::Wrap,
};

/// Persisted form of an [`EncryptedMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Sender id
    pub from: UserId,
    /// Receiver id
    pub to: UserId,
    /// Message body ciphertext
    pub message_ciphertext_hex: String,
    /// Message body IV
    pub message_iv_hex: String,
    /// KEM ciphertext of the sender wrap
    pub sender_ciphertext_hex: String,
    /// Sealed message key of the sender wrap
    pub sender_wrapped_key_hex: String,
    /// IV of the sender wrap
    pub sender_iv_hex: String,
    /// KEM ciphertext of the receiver wrap
    pub receiver_ciphertext_hex: String,
    /// Sealed message key of the receiver wrap
    pub receiver_wrapped_key_hex: String,
    /// IV of the receiver wrap
    pub receiver_iv_hex: String,
    /// Seal time, RFC 3339 UTC
    pub timestamp: String,
}

impl From<&EncryptedMessage> for MessageRecord {
    fn from(message: &EncryptedMessage) -> Self {
        let body = message.message_blob();
        let sender = message.sender_wrap();
        let receiver = message.receiver_wrap();

        Self {
            from: message.from().clone(),
            to: message.to().clone(),
            message_ciphertext_hex: hex::encode(body.ciphertext()),
            message_iv_hex: hex::encode(body.iv()),
            sender_ciphertext_hex: hex::encode(sender.kem_ciphertext()),
            sender_wrapped_key_hex: hex::encode(sender.sealed_key().ciphertext()),
            sender_iv_hex: hex::encode(sender.sealed_key().iv()),
            receiver_ciphertext_hex: hex::encode(receiver.kem_ciphertext()),
            receiver_wrapped_key_hex: hex::encode(receiver.sealed_key().ciphertext()),
            receiver_iv_hex: hex::encode(receiver.sealed_key().iv()),
            timestamp: format_timestamp(message.timestamp()),
        }
    }
}

impl MessageRecord {
    /// Decode into a typed message.
    ///
    /// # Errors
    ///
    /// - `InvalidEncoding`: a field is not hex, or the timestamp is not RFC 3339
    /// - `InvalidLength`: a fixed-size field has the wrong length
    pub fn decode(&self) -> Result<EncryptedMessage, CoreError> {
        let message_blob = SealedBlob::from_parts(
            &decode_hex("message_iv_hex", &self.message_iv_hex)?,
            decode_hex("message_ciphertext_hex", &self.message_ciphertext_hex)?,
        )?;

        let sender_wrap = decode_wrap(
            ("sender_ciphertext_hex", &self.sender_ciphertext_hex),
            ("sender_wrapped_key_hex", &self.sender_wrapped_key_hex),
            ("sender_iv_hex", &self.sender_iv_hex),
        )?;
        let receiver_wrap = decode_wrap(
            ("receiver_ciphertext_hex", &self.receiver_ciphertext_hex),
            ("receiver_wrapped_key_hex", &self.receiver_wrapped_key_hex),
            ("receiver_iv_hex", &self.receiver_iv_hex),
        )?;

        Ok(EncryptedMessage::from_parts(
            self.from.clone(),
            self.to.clone(),
            message_blob,
            sender_wrap,
            receiver_wrap,
            parse_timestamp(&self.timestamp)?,
        ))
    }
}

/// Persisted user account.
///
/// The secret key is only ever present password-wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Stable user id
    pub user_id: UserId,
    /// Login name
    pub username: String,
    /// Password hash (PHC string)
    pub password_hash: String,
    /// Long-term KEM public key
    pub public_key_hex: String,
    /// Password-wrapped KEM secret key
    pub encrypted_secret_key_hex: String,
    /// IV of the secret key wrap
    pub iv_hex: String,
    /// PBKDF2 salt of the secret key wrap
    pub salt_hex: String,
}

impl UserRecord {
    /// Build a record from typed key material.
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        public_key: &KemPublicKey,
        wrapped_secret_key: &SealedBlob,
        salt: &[u8; SALT_SIZE],
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            password_hash: password_hash.into(),
            public_key_hex: hex::encode(public_key),
            encrypted_secret_key_hex: hex::encode(wrapped_secret_key.ciphertext()),
            iv_hex: hex::encode(wrapped_secret_key.iv()),
            salt_hex: hex::encode(salt),
        }
    }

    /// Decode the long-term public key.
    pub fn public_key(&self) -> Result<KemPublicKey, CoreError> {
        Ok(KemPublicKey::from_slice(&decode_hex("public_key_hex", &self.public_key_hex)?)?)
    }

    /// Decode the password-wrapped secret key.
    pub fn wrapped_secret_key(&self) -> Result<SealedBlob, CoreError> {
        Ok(SealedBlob::from_parts(
            &decode_hex("iv_hex", &self.iv_hex)?,
            decode_hex("encrypted_secret_key_hex", &self.encrypted_secret_key_hex)?,
        )?)
    }

    /// Decode the password salt.
    pub fn salt(&self) -> Result<[u8; SALT_SIZE], CoreError> {
        decode_array("salt_hex", "salt", &self.salt_hex)
    }
}

/// One peer entry of an exported session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapRecord {
    /// Sealed message key
    pub encrypted_aes_key_hex: String,
    /// KEM ciphertext
    pub ciphertext_hex: String,
    /// IV of the sealed message key
    pub iv_hex: String,
}

impl From<&Wrap> for WrapRecord {
    fn from(wrap: &Wrap) -> Self {
        Self {
            encrypted_aes_key_hex: hex::encode(wrap.sealed_key().ciphertext()),
            ciphertext_hex: hex::encode(wrap.kem_ciphertext()),
            iv_hex: hex::encode(wrap.sealed_key().iv()),
        }
    }
}

impl WrapRecord {
    /// Decode into a typed wrap.
    pub fn decode(&self) -> Result<Wrap, CoreError> {
        decode_wrap(
            ("ciphertext_hex", &self.ciphertext_hex),
            ("encrypted_aes_key_hex", &self.encrypted_aes_key_hex),
            ("iv_hex", &self.iv_hex),
        )
    }
}

/// Session cache entry in its external form.
///
/// Holds the decrypted secret key and message key in hex: only hand it to a
/// cache that is as trusted as process memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session token
    pub session_id: String,
    /// Session owner
    pub owner: UserId,
    /// Decrypted long-term secret key
    pub secret_key_hex: String,
    /// Session message key
    pub message_key_hex: String,
    /// Memoized wraps of the message key, by peer
    pub peer_wraps: BTreeMap<UserId, WrapRecord>,
    /// Remaining lifetime in whole seconds
    pub expires_in_secs: u64,
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("owner", &self.owner)
            .field("peers", &self.peer_wraps.len())
            .field("expires_in_secs", &self.expires_in_secs)
            .finish_non_exhaustive()
    }
}

/// Decoded contents of a [`SessionRecord`].
pub(crate) struct SessionParts {
    pub(crate) session_id: SessionId,
    pub(crate) owner: UserId,
    pub(crate) secret_key: KemSecretKey,
    pub(crate) message_key: SymmetricKey,
    pub(crate) peer_wraps: Vec<(UserId, Wrap)>,
}

impl SessionRecord {
    pub(crate) fn decode(&self) -> Result<SessionParts, CoreError> {
        let secret_key =
            KemSecretKey::from_slice(&decode_hex("secret_key_hex", &self.secret_key_hex)?)?;
        let message_key = SymmetricKey::from_bytes(decode_array::<KEY_SIZE>(
            "message_key_hex",
            "message key",
            &self.message_key_hex,
        )?);

        let peer_wraps = self
            .peer_wraps
            .iter()
            .map(|(peer, record)| Ok((peer.clone(), record.decode()?)))
            .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(SessionParts {
            session_id: self.session_id.parse()?,
            owner: self.owner.clone(),
            secret_key,
            message_key,
            peer_wraps,
        })
    }
}

/// Render a timestamp the way records store it.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored RFC 3339 timestamp into UTC, at the microsecond precision
/// records are written with.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc).trunc_subsecs(6))
        .map_err(|e| CoreError::InvalidEncoding { field: "timestamp", reason: e.to_string() })
}

fn decode_wrap(
    kem_ciphertext: (&'static str, &str),
    sealed_key: (&'static str, &str),
    iv: (&'static str, &str),
) -> Result<Wrap, CoreError> {
    let kem_ciphertext =
        KemCiphertext::from_slice(&decode_hex(kem_ciphertext.0, kem_ciphertext.1)?)?;
    let sealed_key =
        SealedBlob::from_parts(&decode_hex(iv.0, iv.1)?, decode_hex(sealed_key.0, sealed_key.1)?)?;

    Ok(Wrap::from_parts(kem_ciphertext, sealed_key))
}

fn decode_hex(field: &'static str, value: &str) -> Result<Vec<u8>, CoreError> {
    hex::decode(value).map_err(|e| CoreError::InvalidEncoding { field, reason: e.to_string() })
}

fn decode_array<const N: usize>(
    field: &'static str,
    what: &'static str,
    value: &str,
) -> Result<[u8; N], CoreError> {
    let bytes = decode_hex(field, value)?;
    bytes.as_slice().try_into().map_err(|_| CoreError::InvalidLength {
        what,
        expected: N,
        actual: bytes.len(),
    })
}
