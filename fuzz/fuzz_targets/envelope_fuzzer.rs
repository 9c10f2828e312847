//! Fuzz target for envelope unsealing
//!
//! # Strategy
//!
//! - Arbitrary: unseal attacker-chosen IV and ciphertext bytes
//! - Tamper: seal a real plaintext, then flip, truncate or extend it
//!
//! # Invariants
//!
//! - Unseal NEVER panics, whatever the input
//! - Arbitrary bytes never authenticate under a key the attacker lacks
//! - Any modification of a sealed blob is rejected as `EnvelopeCorrupt`
//! - The untouched blob always opens to the original plaintext

#![no_main]

use arbitrary::Arbitrary;
use hushpost_crypto::{
    envelope::{seal, unseal, unseal_parts},
    CryptoError, SymmetricKey,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum EnvelopeAttack {
    Arbitrary { key: [u8; 32], iv: [u8; 16], ciphertext: Vec<u8> },
    Tamper { key: [u8; 32], iv: [u8; 16], plaintext: Vec<u8>, edit: Edit },
}

#[derive(Debug, Clone, Arbitrary)]
enum Edit {
    FlipCiphertext { index: usize, mask: u8 },
    FlipIv { index: usize, mask: u8 },
    Truncate { len: usize },
    Append { extra: Vec<u8> },
}

fuzz_target!(|attack: EnvelopeAttack| {
    match attack {
        EnvelopeAttack::Arbitrary { key, iv, ciphertext } => {
            let key = SymmetricKey::from_bytes(key);
            // A 16-byte tag forgery succeeding here would be a finding.
            assert!(unseal_parts(&key, &iv, &ciphertext).is_err());
        }

        EnvelopeAttack::Tamper { key, iv, plaintext, edit } => {
            let key = SymmetricKey::from_bytes(key);
            let blob = seal(&key, iv, &plaintext);
            assert_eq!(unseal(&key, &blob).unwrap(), plaintext);

            let mut iv = *blob.iv();
            let mut ciphertext = blob.ciphertext().to_vec();
            match edit {
                Edit::FlipCiphertext { index, mask } => {
                    let mask = mask.max(1);
                    let index = index % ciphertext.len();
                    ciphertext[index] ^= mask;
                }
                Edit::FlipIv { index, mask } => {
                    iv[index % iv.len()] ^= mask.max(1);
                }
                Edit::Truncate { len } => {
                    ciphertext.truncate(len % ciphertext.len());
                }
                Edit::Append { extra } => {
                    if extra.is_empty() {
                        return;
                    }
                    ciphertext.extend_from_slice(&extra);
                }
            }

            assert_eq!(unseal_parts(&key, &iv, &ciphertext), Err(CryptoError::EnvelopeCorrupt));
        }
    }
});
