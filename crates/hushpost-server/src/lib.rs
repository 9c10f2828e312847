//! Hushpost service layer.
//!
//! Wraps the [`hushpost_core`] protocol with the collaborators it needs in
//! practice: account registration and login, a messaging service, durable
//! storage and a production environment.
//!
//! # Architecture
//!
//! [`Server`] owns one [`SessionCache`] and one [`HybridCodec`] sharing it.
//! Every operation is synchronous and takes `&self`, so a `Server` can be
//! shared across threads behind an `Arc`.
//!
//! ```text
//! register ─► validate ─► KEM keypair ─► password wrap ─► Storage
//! login    ─► verify hash ─► unwrap secret key ─► SessionCache::open
//! send     ─► HybridCodec::seal_message ─► Storage::append_message
//! read     ─► Storage::messages_between ─► order ─► unseal as owner
//! ```
//!
//! # Components
//!
//! - [`Server`]: accounts (`register`, `login`, `logout`) and messaging
//!   (`send`, `conversation`)
//! - [`Storage`]: storage trait with [`MemoryStorage`], [`RedbStorage`] and
//!   the fault-injecting [`ChaoticStorage`]
//! - [`SystemEnv`]: production environment (real time, OS RNG)
//! - [`ServerConfig`]: tunables with their defaults

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod accounts;
mod config;
mod error;
mod service;
pub mod storage;
mod system_env;

use std::sync::Arc;

pub use accounts::{validate_password, validate_username};
pub use config::{DEFAULT_KEM_BACKEND, ServerConfig};
pub use error::ServerError;
use hushpost_core::{Environment, HybridCodec, SessionCache};
use hushpost_crypto::{Kem, Pbkdf2Params, load_backend};
pub use service::ConversationEntry;
pub use storage::{ChaoticStorage, MemoryStorage, RedbStorage, Storage, StorageError};
pub use system_env::SystemEnv;

/// Accounts and messaging over a storage backend.
pub struct Server<E: Environment, S: Storage> {
    storage: S,
    sessions: Arc<SessionCache<E>>,
    codec: HybridCodec<E>,
    pbkdf2: Pbkdf2Params,
}

impl<E: Environment, S: Storage> Server<E, S> {
    /// Create a server, loading the KEM backend named in `config`.
    ///
    /// # Errors
    ///
    /// - `Core(KemUnavailable)`: the backend is unknown or not compiled in
    /// - `Config`: the PBKDF2 iteration count is zero
    pub fn new(storage: S, env: E, config: &ServerConfig) -> Result<Self, ServerError> {
        let kem = load_backend(&config.kem_backend)?;
        Self::with_kem(storage, env, kem, config)
    }

    /// Create a server with an explicit KEM implementation.
    ///
    /// `config.kem_backend` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the PBKDF2 iteration count is zero.
    pub fn with_kem(
        storage: S,
        env: E,
        kem: Arc<dyn Kem>,
        config: &ServerConfig,
    ) -> Result<Self, ServerError> {
        let pbkdf2 = config.pbkdf2_params()?;
        let sessions = Arc::new(
            SessionCache::new(env, kem)
                .with_ttl(config.session_ttl)
                .with_max_tombstones(config.max_tombstones),
        );
        let codec = HybridCodec::new(Arc::clone(&sessions));

        Ok(Self { storage, sessions, codec, pbkdf2 })
    }

    /// The storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The session cache, for sweeps and session export.
    pub fn sessions(&self) -> &Arc<SessionCache<E>> {
        &self.sessions
    }
}
