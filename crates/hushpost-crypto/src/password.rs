//! Password wrap for the long-term KEM secret key.
//!
//! The secret key is never stored raw. It is sealed with the envelope under
//! a key stretched from the user's password:
//!
//! ```text
//! wrap_key = PBKDF2-HMAC-SHA256(password, salt, iterations, 32)
//! wrapped  = seal(wrap_key, iv, secret_key)
//! ```
//!
//! Salt and IV are supplied by the caller, same as [`crate::envelope::seal`].

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{
    envelope::{self, IV_SIZE, KEY_SIZE, SealedBlob, SymmetricKey},
    error::CryptoError,
    kem::KemSecretKey,
};

/// Salt size for the password KDF
pub const SALT_SIZE: usize = 16;

/// Default PBKDF2 iteration count
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

/// PBKDF2 parameters used to stretch a password into a wrap key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pbkdf2Params {
    iterations: u32,
}

impl Pbkdf2Params {
    /// Build parameters with an explicit iteration count.
    ///
    /// # Errors
    ///
    /// - `InvalidParameters`: zero iterations
    pub fn new(iterations: u32) -> Result<Self, CryptoError> {
        if iterations == 0 {
            return Err(CryptoError::InvalidParameters("PBKDF2 iterations must be non-zero"));
        }
        Ok(Self { iterations })
    }

    /// Iteration count.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Default for Pbkdf2Params {
    fn default() -> Self {
        Self { iterations: DEFAULT_PBKDF2_ITERATIONS }
    }
}

/// Stretch a password into an envelope key.
fn wrap_key(password: &str, salt: &[u8; SALT_SIZE], params: Pbkdf2Params) -> SymmetricKey {
    let mut out = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, params.iterations, out.as_mut_slice());
    SymmetricKey::from_bytes(*out)
}

/// Seal a KEM secret key under a password.
pub fn wrap_secret_key(
    secret_key: &KemSecretKey,
    password: &str,
    salt: &[u8; SALT_SIZE],
    iv: [u8; IV_SIZE],
    params: Pbkdf2Params,
) -> SealedBlob {
    let key = wrap_key(password, salt, params);
    envelope::seal(&key, iv, secret_key.as_bytes())
}

/// Recover a KEM secret key sealed by [`wrap_secret_key`].
///
/// # Errors
///
/// - `EnvelopeCorrupt`: wrong password, wrong salt, or tampered blob
/// - `InvalidLength`: the blob opened but did not hold a secret key
pub fn unwrap_secret_key(
    wrapped: &SealedBlob,
    password: &str,
    salt: &[u8; SALT_SIZE],
    params: Pbkdf2Params,
) -> Result<KemSecretKey, CryptoError> {
    let key = wrap_key(password, salt, params);
    let plaintext = Zeroizing::new(envelope::unseal(&key, wrapped)?);
    Ok(KemSecretKey::from_slice(&plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kem::SECRET_KEY_SIZE;

    // Keep unit tests fast; the iteration count does not change the contract.
    fn fast() -> Pbkdf2Params {
        Pbkdf2Params::new(10).unwrap()
    }

    fn sample_secret() -> KemSecretKey {
        let mut bytes = [0u8; SECRET_KEY_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        KemSecretKey::from_bytes(bytes)
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let sk = sample_secret();
        let wrapped = wrap_secret_key(&sk, "Correct#Horse9", &[1; SALT_SIZE], [2; IV_SIZE], fast());

        let recovered = unwrap_secret_key(&wrapped, "Correct#Horse9", &[1; SALT_SIZE], fast());
        assert_eq!(recovered.unwrap(), sk);
    }

    #[test]
    fn dummy_password_zero_salt_zero_iv_roundtrip() {
        let sk = sample_secret();
        let params = Pbkdf2Params::default();
        let wrapped =
            wrap_secret_key(&sk, "dummy_password", &[0; SALT_SIZE], [0; IV_SIZE], params);

        let recovered = unwrap_secret_key(&wrapped, "dummy_password", &[0; SALT_SIZE], params);
        assert_eq!(recovered.unwrap(), sk);
    }

    #[test]
    fn dummy_password_zero_salt_zero_iv_is_fixed() {
        use sha2::Digest;

        let sk = sample_secret();
        let params = Pbkdf2Params::default();
        let first = wrap_secret_key(&sk, "dummy_password", &[0; SALT_SIZE], [0; IV_SIZE], params);
        let second = wrap_secret_key(&sk, "dummy_password", &[0; SALT_SIZE], [0; IV_SIZE], params);

        assert_eq!(first, second);
        assert_eq!(first.ciphertext().len(), 2432);
        assert_eq!(
            hex::encode(Sha256::digest(first.ciphertext())),
            "60e57eba67235468b3afbc55e7c3282f6ee96e2cef90b43a15a1d78e8297d838"
        );
    }

    #[test]
    fn wrong_password_is_corrupt() {
        let wrapped =
            wrap_secret_key(&sample_secret(), "right", &[1; SALT_SIZE], [2; IV_SIZE], fast());

        let result = unwrap_secret_key(&wrapped, "wrong", &[1; SALT_SIZE], fast());
        assert_eq!(result.unwrap_err(), CryptoError::EnvelopeCorrupt);
    }

    #[test]
    fn wrong_salt_is_corrupt() {
        let wrapped =
            wrap_secret_key(&sample_secret(), "right", &[1; SALT_SIZE], [2; IV_SIZE], fast());

        let result = unwrap_secret_key(&wrapped, "right", &[9; SALT_SIZE], fast());
        assert_eq!(result.unwrap_err(), CryptoError::EnvelopeCorrupt);
    }

    #[test]
    fn iteration_count_is_part_of_the_key() {
        let wrapped =
            wrap_secret_key(&sample_secret(), "right", &[1; SALT_SIZE], [2; IV_SIZE], fast());

        let other = Pbkdf2Params::new(11).unwrap();
        let result = unwrap_secret_key(&wrapped, "right", &[1; SALT_SIZE], other);
        assert_eq!(result.unwrap_err(), CryptoError::EnvelopeCorrupt);
    }

    #[test]
    fn non_secret_key_payload_is_rejected() {
        let key = wrap_key("pw", &[0; SALT_SIZE], fast());
        let blob = envelope::seal(&key, [0; IV_SIZE], b"not a key");

        let result = unwrap_secret_key(&blob, "pw", &[0; SALT_SIZE], fast());
        assert!(matches!(result, Err(CryptoError::InvalidLength { what: "secret key", .. })));
    }

    #[test]
    fn zero_iterations_rejected() {
        assert!(matches!(Pbkdf2Params::new(0), Err(CryptoError::InvalidParameters(_))));
        assert_eq!(Pbkdf2Params::default().iterations(), 100_000);
    }
}
