//! Property tests for the symmetric envelope and KDF.
//!
//! These tests verify:
//! - Seal then unseal returns the original plaintext for any key and message
//! - Flipping any single ciphertext or IV byte is rejected as corrupt
//! - Key derivation is deterministic and sensitive to every input byte

use hushpost_crypto::{
    CryptoError, IV_SIZE, KEY_SIZE, SharedSecret, SymmetricKey, derive_key,
    envelope::{seal, unseal, unseal_parts},
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_envelope_roundtrip(
        key in any::<[u8; KEY_SIZE]>(),
        iv in any::<[u8; IV_SIZE]>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let key = SymmetricKey::from_bytes(key);
        let blob = seal(&key, iv, &plaintext);

        prop_assert_eq!(unseal(&key, &blob), Ok(plaintext));
    }

    #[test]
    fn prop_ciphertext_flip_is_corrupt(
        key in any::<[u8; KEY_SIZE]>(),
        iv in any::<[u8; IV_SIZE]>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..128),
        index in any::<prop::sample::Index>(),
        mask in 1u8..=255,
    ) {
        let key = SymmetricKey::from_bytes(key);
        let blob = seal(&key, iv, &plaintext);

        let mut tampered = blob.ciphertext().to_vec();
        let at = index.index(tampered.len());
        tampered[at] ^= mask;

        prop_assert_eq!(
            unseal_parts(&key, blob.iv(), &tampered),
            Err(CryptoError::EnvelopeCorrupt)
        );
    }

    #[test]
    fn prop_iv_flip_is_corrupt(
        key in any::<[u8; KEY_SIZE]>(),
        iv in any::<[u8; IV_SIZE]>(),
        plaintext in prop::collection::vec(any::<u8>(), 0..128),
        at in 0..IV_SIZE,
        mask in 1u8..=255,
    ) {
        let key = SymmetricKey::from_bytes(key);
        let blob = seal(&key, iv, &plaintext);

        let mut bad_iv = *blob.iv();
        bad_iv[at] ^= mask;

        prop_assert_eq!(
            unseal_parts(&key, &bad_iv, blob.ciphertext()),
            Err(CryptoError::EnvelopeCorrupt)
        );
    }

    #[test]
    fn prop_kdf_deterministic(secret in any::<[u8; 32]>()) {
        let ss = SharedSecret::from_bytes(secret);
        prop_assert_eq!(derive_key(&ss), derive_key(&ss));
    }

    #[test]
    fn prop_kdf_separates_inputs(
        secret in any::<[u8; 32]>(),
        at in 0usize..32,
        mask in 1u8..=255,
    ) {
        let mut other = secret;
        other[at] ^= mask;

        let a = derive_key(&SharedSecret::from_bytes(secret));
        let b = derive_key(&SharedSecret::from_bytes(other));
        prop_assert_ne!(a, b);
    }
}
