//! Per-participant wraps of a symmetric key.
//!
//! A [`Wrap`] is a symmetric key sealed under a key derived from a fresh KEM
//! encapsulation against one participant's public key. Only the holder of
//! the matching secret key can recover the shared secret and open it.

use hushpost_crypto::{
    IV_SIZE, Kem, KemCiphertext, KemPublicKey, KemSecretKey, SealedBlob, SymmetricKey,
    derive_key, envelope,
};

use crate::error::CoreError;

/// A symmetric key, readable only by the owner of one KEM secret key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrap {
    kem_ciphertext: KemCiphertext,
    sealed_key: SealedBlob,
}

impl Wrap {
    /// Encapsulate against `public_key` and seal `key` under the result.
    ///
    /// Every call performs a fresh encapsulation, so two wraps of the same
    /// key never share a KEM ciphertext or shared secret.
    pub fn seal(
        kem: &dyn Kem,
        public_key: &KemPublicKey,
        key: &SymmetricKey,
        iv: [u8; IV_SIZE],
    ) -> Result<Self, CoreError> {
        let (kem_ciphertext, shared_secret) = kem.encapsulate(public_key)?;
        let wrapping_key = derive_key(&shared_secret);
        let sealed_key = envelope::seal(&wrapping_key, iv, key.as_bytes());

        Ok(Self { kem_ciphertext, sealed_key })
    }

    /// Recover the wrapped key with `secret_key`.
    ///
    /// # Errors
    ///
    /// - `EnvelopeCorrupt`: `secret_key` does not match, or the wrap was
    ///   tampered with
    pub fn open(
        &self,
        kem: &dyn Kem,
        secret_key: &KemSecretKey,
    ) -> Result<SymmetricKey, CoreError> {
        let shared_secret = kem.decapsulate(&self.kem_ciphertext, secret_key)?;
        let wrapping_key = derive_key(&shared_secret);

        let key_bytes = envelope::unseal(&wrapping_key, &self.sealed_key)?;
        SymmetricKey::from_slice(&key_bytes).map_err(|_| CoreError::EnvelopeCorrupt)
    }

    /// Rebuild a wrap from its stored parts.
    pub fn from_parts(kem_ciphertext: KemCiphertext, sealed_key: SealedBlob) -> Self {
        Self { kem_ciphertext, sealed_key }
    }

    /// KEM ciphertext the wrapping key was derived from.
    pub fn kem_ciphertext(&self) -> &KemCiphertext {
        &self.kem_ciphertext
    }

    /// The sealed symmetric key.
    pub fn sealed_key(&self) -> &SealedBlob {
        &self.sealed_key
    }
}

#[cfg(test)]
mod tests {
    use hushpost_crypto::kem::testing::DeterministicKem;

    use super::*;

    #[test]
    fn owner_recovers_wrapped_key() {
        let kem = DeterministicKem::new();
        let pair = kem.generate_keypair().unwrap();
        let key = SymmetricKey::from_bytes([0x33; 32]);

        let wrap = Wrap::seal(&kem, &pair.public_key, &key, [1; IV_SIZE]).unwrap();

        assert_eq!(wrap.open(&kem, &pair.secret_key).unwrap(), key);
    }

    #[test]
    fn other_secret_key_cannot_open() {
        let kem = DeterministicKem::new();
        let alice = kem.generate_keypair().unwrap();
        let bob = kem.generate_keypair().unwrap();
        let key = SymmetricKey::from_bytes([0x33; 32]);

        let wrap = Wrap::seal(&kem, &alice.public_key, &key, [1; IV_SIZE]).unwrap();

        assert_eq!(wrap.open(&kem, &bob.secret_key), Err(CoreError::EnvelopeCorrupt));
    }

    #[test]
    fn two_wraps_use_distinct_encapsulations() {
        let kem = DeterministicKem::new();
        let pair = kem.generate_keypair().unwrap();
        let key = SymmetricKey::from_bytes([0x33; 32]);

        let a = Wrap::seal(&kem, &pair.public_key, &key, [1; IV_SIZE]).unwrap();
        let b = Wrap::seal(&kem, &pair.public_key, &key, [1; IV_SIZE]).unwrap();

        assert_ne!(a.kem_ciphertext(), b.kem_ciphertext());
        assert_ne!(a.sealed_key(), b.sealed_key());
        assert_eq!(kem.encapsulations(), 2);
    }

    #[test]
    fn tampered_sealed_key_is_corrupt() {
        let kem = DeterministicKem::new();
        let pair = kem.generate_keypair().unwrap();
        let key = SymmetricKey::from_bytes([0x33; 32]);
        let wrap = Wrap::seal(&kem, &pair.public_key, &key, [1; IV_SIZE]).unwrap();

        let mut bytes = wrap.sealed_key().ciphertext().to_vec();
        bytes[0] ^= 0x80;
        let sealed = SealedBlob::from_parts(wrap.sealed_key().iv(), bytes).unwrap();
        let tampered = Wrap::from_parts(wrap.kem_ciphertext().clone(), sealed);

        assert_eq!(tampered.open(&kem, &pair.secret_key), Err(CoreError::EnvelopeCorrupt));
    }
}
