//! Deterministic KEM double for tests.
//!
//! Size-correct and contract-correct, but derived entirely from SHA-256 and
//! internal counters, so every run produces the same bytes. Call counters
//! let tests observe how many asymmetric operations a code path performed.
//!
//! Layout:
//! - secret key = public key (1184) || filler (1216)
//! - ciphertext = counter (8) || SHA-256(public key) (32) || filler (1048)
//! - shared secret = SHA-256("ss" || SHA-256(public key) || counter)
//!
//! A ciphertext opened with a non-matching secret key yields an unrelated
//! shared secret, mirroring ML-KEM's implicit rejection.

use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use super::{
    CIPHERTEXT_SIZE, Kem, KemCiphertext, KemKeyPair, KemPublicKey, KemSecretKey,
    PUBLIC_KEY_SIZE, SECRET_KEY_SIZE, SharedSecret,
};
use crate::error::KemError;

/// Deterministic, size-correct KEM with call counters.
#[derive(Debug, Default)]
pub struct DeterministicKem {
    keypairs: AtomicU64,
    encapsulations: AtomicU64,
    decapsulations: AtomicU64,
}

impl DeterministicKem {
    /// Name reported by [`Kem::name`].
    pub const NAME: &'static str = "deterministic-test-kem";

    /// Create a double with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `generate_keypair` calls so far.
    pub fn keypairs(&self) -> u64 {
        self.keypairs.load(Ordering::SeqCst)
    }

    /// Number of `encapsulate` calls so far.
    pub fn encapsulations(&self) -> u64 {
        self.encapsulations.load(Ordering::SeqCst)
    }

    /// Number of `decapsulate` calls so far.
    pub fn decapsulations(&self) -> u64 {
        self.decapsulations.load(Ordering::SeqCst)
    }
}

impl Kem for DeterministicKem {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn generate_keypair(&self) -> Result<KemKeyPair, KemError> {
        let counter = self.keypairs.fetch_add(1, Ordering::SeqCst);
        let seed = counter.to_be_bytes();

        let mut sk = [0u8; SECRET_KEY_SIZE];
        let (pk_part, filler) = sk.split_at_mut(PUBLIC_KEY_SIZE);
        expand(b"pk", &seed, pk_part);
        expand(b"sk", &seed, filler);

        let public_key = KemPublicKey::from_slice(&sk[..PUBLIC_KEY_SIZE])?;
        Ok(KemKeyPair { public_key, secret_key: KemSecretKey::from_bytes(sk) })
    }

    fn encapsulate(
        &self,
        public_key: &KemPublicKey,
    ) -> Result<(KemCiphertext, SharedSecret), KemError> {
        let counter = self.encapsulations.fetch_add(1, Ordering::SeqCst).to_be_bytes();
        let pk_digest: [u8; 32] = Sha256::digest(public_key.as_bytes()).into();

        let mut ct = [0u8; CIPHERTEXT_SIZE];
        ct[..8].copy_from_slice(&counter);
        ct[8..40].copy_from_slice(&pk_digest);
        let (header, filler) = ct.split_at_mut(40);
        expand(b"ct", header, filler);

        Ok((KemCiphertext::from_bytes(ct), accepted_secret(&pk_digest, &counter)))
    }

    fn decapsulate(
        &self,
        ciphertext: &KemCiphertext,
        secret_key: &KemSecretKey,
    ) -> Result<SharedSecret, KemError> {
        self.decapsulations.fetch_add(1, Ordering::SeqCst);

        let ct = ciphertext.as_bytes();
        let sk = secret_key.as_bytes();
        let pk_digest: [u8; 32] = Sha256::digest(&sk[..PUBLIC_KEY_SIZE]).into();

        if ct[8..40] == pk_digest {
            return Ok(accepted_secret(&pk_digest, &ct[..8]));
        }

        let rejected: [u8; 32] = Sha256::new()
            .chain_update(b"reject")
            .chain_update(Sha256::digest(sk))
            .chain_update(ct)
            .finalize()
            .into();
        Ok(SharedSecret::from_bytes(rejected))
    }
}

fn accepted_secret(pk_digest: &[u8; 32], counter: &[u8]) -> SharedSecret {
    let ss: [u8; 32] = Sha256::new()
        .chain_update(b"ss")
        .chain_update(pk_digest)
        .chain_update(counter)
        .finalize()
        .into();
    SharedSecret::from_bytes(ss)
}

/// SHA-256 in counter mode, filling `out`.
fn expand(label: &[u8], seed: &[u8], out: &mut [u8]) {
    for (block, chunk) in out.chunks_mut(32).enumerate() {
        let digest = Sha256::new()
            .chain_update(label)
            .chain_update(seed)
            .chain_update((block as u32).to_be_bytes())
            .finalize();
        chunk.copy_from_slice(&digest[..chunk.len()]);
    }
}
