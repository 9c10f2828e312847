//! Service configuration.

use std::time::Duration;

use hushpost_core::{DEFAULT_MAX_TOMBSTONES, DEFAULT_SESSION_TTL};
use hushpost_crypto::{DEFAULT_PBKDF2_ITERATIONS, Pbkdf2Params};

use crate::error::ServerError;

/// Name of the production KEM backend.
pub const DEFAULT_KEM_BACKEND: &str = "ml-kem-768";

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// PBKDF2 iterations for the password wrap of secret keys
    pub pbkdf2_iterations: u32,
    /// Lifetime of a login session without activity
    pub session_ttl: Duration,
    /// KEM backend name, resolved with `hushpost_crypto::load_backend`
    pub kem_backend: String,
    /// How many expired session ids are remembered as expired
    pub max_tombstones: usize,
}

impl ServerConfig {
    /// Validated PBKDF2 parameters.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Config` if the iteration count is zero.
    pub fn pbkdf2_params(&self) -> Result<Pbkdf2Params, ServerError> {
        Pbkdf2Params::new(self.pbkdf2_iterations)
            .map_err(|e| ServerError::Config(format!("pbkdf2_iterations: {e}")))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: DEFAULT_PBKDF2_ITERATIONS,
            session_ttl: DEFAULT_SESSION_TTL,
            kem_backend: DEFAULT_KEM_BACKEND.to_string(),
            max_tombstones: DEFAULT_MAX_TOMBSTONES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();

        assert_eq!(config.pbkdf2_iterations, 100_000);
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.kem_backend, "ml-kem-768");
        assert_eq!(config.max_tombstones, 10_000);
        assert_eq!(config.pbkdf2_params().unwrap().iterations(), 100_000);
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = ServerConfig { pbkdf2_iterations: 0, ..ServerConfig::default() };
        assert!(matches!(config.pbkdf2_params(), Err(ServerError::Config(_))));
    }
}
