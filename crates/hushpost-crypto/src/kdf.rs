//! Shared-secret to symmetric-key derivation.
//!
//! `derive_key(ss) = SHA-256(ss)`. Deterministic, so both sides of an
//! encapsulation arrive at the same envelope key.

use sha2::{Digest, Sha256};

use crate::{envelope::SymmetricKey, kem::SharedSecret};

/// Derive the envelope key from a KEM shared secret.
pub fn derive_key(shared_secret: &SharedSecret) -> SymmetricKey {
    SymmetricKey::from_bytes(Sha256::digest(shared_secret.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let ss = SharedSecret::from_bytes([0x11; 32]);
        assert_eq!(derive_key(&ss), derive_key(&ss));
    }

    #[test]
    fn distinct_secrets_give_distinct_keys() {
        let a = derive_key(&SharedSecret::from_bytes([0x11; 32]));
        let b = derive_key(&SharedSecret::from_bytes([0x12; 32]));
        assert_ne!(a, b);
    }

    #[test]
    fn matches_plain_sha256() {
        let key = derive_key(&SharedSecret::from_bytes([0; 32]));
        assert_eq!(
            hex::encode(key.as_bytes()),
            "66687aadf862bd776c8fc18b8e9f8e20089714856ee233b3902a591d0d5f2925"
        );
    }
}
