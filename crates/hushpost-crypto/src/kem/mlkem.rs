//! ML-KEM-768 backend (the standardised Kyber768 parameter set).
//!
//! Byte sizes match the KEM contract exactly: 1184-byte encapsulation key,
//! 2400-byte decapsulation key, 1088-byte ciphertext, 32-byte shared secret.
//! Randomness comes from the OS RNG.

use ml_kem::{
    Ciphertext, Encoded, EncodedSizeUser, KemCore, MlKem768 as Suite,
    kem::{Decapsulate, Encapsulate},
};
use rand::rngs::OsRng;

use super::{Kem, KemCiphertext, KemKeyPair, KemPublicKey, KemSecretKey, SharedSecret};
use crate::error::KemError;

type EncapsulationKey = <Suite as KemCore>::EncapsulationKey;
type DecapsulationKey = <Suite as KemCore>::DecapsulationKey;

/// Production KEM backed by the pure-Rust `ml-kem` implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MlKem768;

impl MlKem768 {
    /// Name accepted by [`super::load_backend`].
    pub const NAME: &'static str = "ml-kem-768";

    /// Create the backend.
    pub fn new() -> Self {
        Self
    }
}

impl Kem for MlKem768 {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn generate_keypair(&self) -> Result<KemKeyPair, KemError> {
        let (dk, ek) = Suite::generate(&mut OsRng);

        let public_key = KemPublicKey::from_slice(ek.as_bytes().as_slice())?;
        let secret_key = KemSecretKey::from_slice(dk.as_bytes().as_slice())?;

        Ok(KemKeyPair { public_key, secret_key })
    }

    fn encapsulate(
        &self,
        public_key: &KemPublicKey,
    ) -> Result<(KemCiphertext, SharedSecret), KemError> {
        let encoded = Encoded::<EncapsulationKey>::try_from(public_key.as_ref()).map_err(|_| {
            KemError::InvalidLength {
                what: "public key",
                expected: KemPublicKey::SIZE,
                actual: public_key.as_ref().len(),
            }
        })?;
        let ek = EncapsulationKey::from_bytes(&encoded);

        let (ct, ss) = ek.encapsulate(&mut OsRng).map_err(|_| KemError::OperationFailed {
            operation: "encapsulate",
            reason: "ml-kem rejected the encapsulation key".to_string(),
        })?;

        Ok((KemCiphertext::from_slice(ct.as_slice())?, SharedSecret::from_slice(ss.as_slice())?))
    }

    fn decapsulate(
        &self,
        ciphertext: &KemCiphertext,
        secret_key: &KemSecretKey,
    ) -> Result<SharedSecret, KemError> {
        let encoded = Encoded::<DecapsulationKey>::try_from(secret_key.as_ref()).map_err(|_| {
            KemError::InvalidLength {
                what: "secret key",
                expected: KemSecretKey::SIZE,
                actual: secret_key.as_ref().len(),
            }
        })?;
        let dk = DecapsulationKey::from_bytes(&encoded);

        let ct = Ciphertext::<Suite>::try_from(ciphertext.as_ref()).map_err(|_| {
            KemError::InvalidLength {
                what: "KEM ciphertext",
                expected: KemCiphertext::SIZE,
                actual: ciphertext.as_ref().len(),
            }
        })?;

        let ss = dk.decapsulate(&ct).map_err(|_| KemError::OperationFailed {
            operation: "decapsulate",
            reason: "ml-kem rejected the ciphertext".to_string(),
        })?;

        SharedSecret::from_slice(ss.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_sizes_match_contract() {
        let pair = MlKem768::new().generate_keypair().unwrap();
        assert_eq!(pair.public_key.as_bytes().len(), 1184);
        assert_eq!(pair.secret_key.as_bytes().len(), 2400);
    }

    #[test]
    fn encapsulate_decapsulate_roundtrip() {
        let kem = MlKem768::new();
        let pair = kem.generate_keypair().unwrap();

        let (ct, ss) = kem.encapsulate(&pair.public_key).unwrap();
        let recovered = kem.decapsulate(&ct, &pair.secret_key).unwrap();

        assert_eq!(ss, recovered);
    }

    #[test]
    fn encapsulation_is_randomized() {
        let kem = MlKem768::new();
        let pair = kem.generate_keypair().unwrap();

        let (ct1, ss1) = kem.encapsulate(&pair.public_key).unwrap();
        let (ct2, ss2) = kem.encapsulate(&pair.public_key).unwrap();

        assert_ne!(ct1, ct2);
        assert_ne!(ss1, ss2);
    }

    #[test]
    fn wrong_secret_key_yields_different_secret() {
        let kem = MlKem768::new();
        let alice = kem.generate_keypair().unwrap();
        let mallory = kem.generate_keypair().unwrap();

        let (ct, ss) = kem.encapsulate(&alice.public_key).unwrap();
        let rejected = kem.decapsulate(&ct, &mallory.secret_key).unwrap();

        assert_ne!(ss, rejected);
    }
}
