//! Symmetric envelope: AES-256-CBC with PKCS#7 padding, encrypt-then-MAC.
//!
//! All functions are pure - the IV must be provided by the caller. This
//! enables deterministic testing; production callers draw a fresh IV from a
//! CSPRNG for every seal.
//!
//! # Format
//!
//! ```text
//! cipher_key || mac_key = HKDF-SHA256(key)
//! body                  = AES-256-CBC(cipher_key, iv, PKCS7(plaintext))
//! tag                   = HMAC-SHA256(mac_key, iv || body)[..16]
//! ciphertext            = body || tag
//! ```
//!
//! The ciphertext stays a multiple of the 16-byte block size. The tag is
//! checked before decryption, so a single flipped bit anywhere in the IV or
//! ciphertext is rejected without touching the padding.

use std::fmt;

use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Symmetric key size (AES-256)
pub const KEY_SIZE: usize = 32;

/// IV size (one AES block)
pub const IV_SIZE: usize = 16;

/// Truncated HMAC-SHA256 tag size appended to every ciphertext
pub const TAG_SIZE: usize = 16;

const BLOCK_SIZE: usize = 16;

/// Label for the AES key half of the envelope key split
const CIPHER_KEY_LABEL: &[u8] = b"hushpostEnvelopeCipherV1";

/// Label for the MAC key half of the envelope key split
const MAC_KEY_LABEL: &[u8] = b"hushpostEnvelopeMacV1";

/// A 32-byte symmetric key. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct SymmetricKey([u8; KEY_SIZE]);

impl SymmetricKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy from a slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidLength {
            what: "symmetric key",
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(array))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl Drop for SymmetricKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Output of [`seal`]: an IV and the authenticated ciphertext.
///
/// Produced by [`seal`]; [`SealedBlob::from_parts`] only exists to rebuild a
/// blob read back from storage and checks the framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedBlob {
    iv: [u8; IV_SIZE],
    ciphertext: Vec<u8>,
}

impl SealedBlob {
    /// Rebuild a blob from stored parts.
    ///
    /// # Errors
    ///
    /// - `InvalidLength`: IV is not 16 bytes, or the ciphertext is shorter
    ///   than one block plus tag or not a multiple of the block size
    pub fn from_parts(iv: &[u8], ciphertext: Vec<u8>) -> Result<Self, CryptoError> {
        let iv: [u8; IV_SIZE] = iv.try_into().map_err(|_| CryptoError::InvalidLength {
            what: "IV",
            expected: IV_SIZE,
            actual: iv.len(),
        })?;

        if !is_well_framed(&ciphertext) {
            return Err(CryptoError::InvalidLength {
                what: "sealed ciphertext",
                expected: framed_len(ciphertext.len()),
                actual: ciphertext.len(),
            });
        }

        Ok(Self { iv, ciphertext })
    }

    /// The 16-byte IV used for this seal.
    pub fn iv(&self) -> &[u8; IV_SIZE] {
        &self.iv
    }

    /// CBC body followed by the authentication tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }
}

/// Seal `plaintext` under `key` with the caller-provided `iv`.
///
/// # Security
///
/// - Caller MUST provide a fresh IV from a CSPRNG for every call; reusing an
///   IV under the same key leaks plaintext prefix equality
pub fn seal(key: &SymmetricKey, iv: [u8; IV_SIZE], plaintext: &[u8]) -> SealedBlob {
    let (cipher_key, mac_key) = split_key(key);

    let mut ciphertext = Aes256CbcEnc::new((&*cipher_key).into(), (&iv).into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let tag = compute_tag(&mac_key, &iv, &ciphertext);
    ciphertext.extend_from_slice(&tag[..TAG_SIZE]);

    SealedBlob { iv, ciphertext }
}

/// Unseal a blob produced by [`seal`].
///
/// # Errors
///
/// - `EnvelopeCorrupt`: wrong key, wrong IV, or tampered ciphertext
pub fn unseal(key: &SymmetricKey, blob: &SealedBlob) -> Result<Vec<u8>, CryptoError> {
    unseal_parts(key, blob.iv(), blob.ciphertext())
}

/// Unseal from a raw IV and ciphertext.
///
/// Never returns partially decrypted data: either the tag and padding both
/// verify and the full plaintext is returned, or `EnvelopeCorrupt`.
pub fn unseal_parts(
    key: &SymmetricKey,
    iv: &[u8; IV_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if !is_well_framed(ciphertext) {
        return Err(CryptoError::EnvelopeCorrupt);
    }

    let (body, tag) = ciphertext.split_at(ciphertext.len() - TAG_SIZE);
    let (cipher_key, mac_key) = split_key(key);

    let mut mac = new_mac(&mac_key);
    mac.update(iv);
    mac.update(body);
    mac.verify_truncated_left(tag).map_err(|_| CryptoError::EnvelopeCorrupt)?;

    Aes256CbcDec::new((&*cipher_key).into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(body)
        .map_err(|_| CryptoError::EnvelopeCorrupt)
}

fn is_well_framed(ciphertext: &[u8]) -> bool {
    ciphertext.len() >= BLOCK_SIZE + TAG_SIZE && ciphertext.len() % BLOCK_SIZE == 0
}

/// Smallest well-framed length at or above `len`, for error reporting.
fn framed_len(len: usize) -> usize {
    len.max(BLOCK_SIZE + TAG_SIZE).next_multiple_of(BLOCK_SIZE)
}

/// Split the envelope key into independent cipher and MAC keys.
fn split_key(key: &SymmetricKey) -> (Zeroizing<[u8; KEY_SIZE]>, Zeroizing<[u8; KEY_SIZE]>) {
    let hkdf = Hkdf::<Sha256>::new(None, key.as_bytes());

    let mut cipher_key = Zeroizing::new([0u8; KEY_SIZE]);
    let mut mac_key = Zeroizing::new([0u8; KEY_SIZE]);

    let Ok(()) = hkdf.expand(CIPHER_KEY_LABEL, cipher_key.as_mut_slice()) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };
    let Ok(()) = hkdf.expand(MAC_KEY_LABEL, mac_key.as_mut_slice()) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    (cipher_key, mac_key)
}

fn new_mac(mac_key: &[u8; KEY_SIZE]) -> HmacSha256 {
    let Ok(mac) = <HmacSha256 as Mac>::new_from_slice(mac_key) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac
}

fn compute_tag(mac_key: &[u8; KEY_SIZE], iv: &[u8; IV_SIZE], body: &[u8]) -> [u8; 32] {
    let mut mac = new_mac(mac_key);
    mac.update(iv);
    mac.update(body);
    mac.finalize().into_bytes().into()
}
