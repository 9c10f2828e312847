//! Session key cache.
//!
//! Holds per-login ephemeral secrets: the owner's decrypted long-term secret
//! key, a random message key minted once per session, and memoized wraps of
//! that message key for each peer the owner has written to.
//!
//! # Locking
//!
//! The session table sits behind an `RwLock` taken only to look up, insert or
//! remove a session. Each session carries its own `Mutex` over the mutable
//! part (expiry and peer wraps), so get-or-create of a wrap is atomic per
//! session without any cross-session locking. The table lock is never
//! acquired while a session mutex is held.
//!
//! # Expiry
//!
//! Passive: TTL is checked on access. An expired or explicitly closed session
//! leaves a tombstone so later lookups report `SessionExpired`. Tombstones
//! are bounded; once the oldest is evicted its id reports `SessionNotFound`.

#![allow(clippy::expect_used, reason = "Lock poisoning should cause a panic")]

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use hushpost_crypto::{KEY_SIZE, Kem, KemPublicKey, KemSecretKey, SymmetricKey};

use crate::{
    env::Environment,
    error::CoreError,
    id::{SessionId, UserId},
    record::{SessionRecord, WrapRecord},
    wrap::Wrap,
};

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// Default number of expired session ids remembered.
pub const DEFAULT_MAX_TOMBSTONES: usize = 10_000;

/// Immutable half of a session plus its locked mutable state.
struct Session<I> {
    owner: UserId,
    secret_key: KemSecretKey,
    message_key: SymmetricKey,
    state: Mutex<SessionState<I>>,
}

struct SessionState<I> {
    expires_at: I,
    peer_wraps: HashMap<UserId, Wrap>,
}

/// Bounded FIFO set of retired session ids.
struct Tombstones {
    order: VecDeque<SessionId>,
    ids: HashSet<SessionId>,
    capacity: usize,
}

impl Tombstones {
    fn new(capacity: usize) -> Self {
        Self { order: VecDeque::new(), ids: HashSet::new(), capacity }
    }

    fn insert(&mut self, id: SessionId) {
        if self.capacity == 0 || !self.ids.insert(id) {
            return;
        }
        self.order.push_back(id);

        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    fn contains(&self, id: SessionId) -> bool {
        self.ids.contains(&id)
    }
}

/// Per-login store of ephemeral key material.
///
/// Shared across request threads; all methods take `&self`.
pub struct SessionCache<E: Environment> {
    env: E,
    kem: Arc<dyn Kem>,
    ttl: Duration,
    sessions: RwLock<HashMap<SessionId, Arc<Session<E::Instant>>>>,
    tombstones: Mutex<Tombstones>,
}

impl<E: Environment> SessionCache<E> {
    /// Create an empty cache with the default TTL and tombstone bound.
    pub fn new(env: E, kem: Arc<dyn Kem>) -> Self {
        Self {
            env,
            kem,
            ttl: DEFAULT_SESSION_TTL,
            sessions: RwLock::new(HashMap::new()),
            tombstones: Mutex::new(Tombstones::new(DEFAULT_MAX_TOMBSTONES)),
        }
    }

    /// Set the session lifetime.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set how many expired session ids are remembered.
    #[must_use]
    pub fn with_max_tombstones(mut self, capacity: usize) -> Self {
        self.tombstones = Mutex::new(Tombstones::new(capacity));
        self
    }

    /// Environment used for time and randomness.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// KEM backend used for wraps.
    pub fn kem(&self) -> &dyn Kem {
        self.kem.as_ref()
    }

    /// Session lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a session for `owner`, minting a fresh message key.
    pub fn open(&self, owner: UserId, secret_key: KemSecretKey) -> SessionId {
        let message_key = SymmetricKey::from_bytes(self.env.random_array::<KEY_SIZE>());
        let session = Arc::new(Session {
            owner,
            secret_key,
            message_key,
            state: Mutex::new(SessionState {
                expires_at: self.env.now() + self.ttl,
                peer_wraps: HashMap::new(),
            }),
        });

        let id = {
            let mut sessions = self.sessions.write().expect("session table poisoned");
            let tombstones = self.tombstones.lock().expect("tombstones poisoned");
            let id = loop {
                let candidate = SessionId::from_u128(self.env.random_u128());
                if !sessions.contains_key(&candidate) && !tombstones.contains(candidate) {
                    break candidate;
                }
            };
            sessions.insert(id, Arc::clone(&session));
            id
        };

        tracing::debug!(session = ?id, owner = %session.owner, "session opened");
        id
    }

    /// Refresh the TTL of a live session.
    pub fn touch(&self, id: SessionId) -> Result<(), CoreError> {
        let now = self.env.now();
        self.with_live(id, |_, state| state.expires_at = now + self.ttl)
    }

    /// Close a session. Closing an already expired session is a no-op.
    pub fn expire(&self, id: SessionId) -> Result<(), CoreError> {
        let removed = self.sessions.write().expect("session table poisoned").remove(&id);
        if removed.is_some() {
            self.tombstones.lock().expect("tombstones poisoned").insert(id);
            tracing::debug!(session = ?id, "session closed");
            return Ok(());
        }

        if self.tombstones.lock().expect("tombstones poisoned").contains(id) {
            Ok(())
        } else {
            Err(CoreError::SessionNotFound(id))
        }
    }

    /// Owner of a live session.
    pub fn owner(&self, id: SessionId) -> Result<UserId, CoreError> {
        self.with_live(id, |session, _| session.owner.clone())
    }

    /// The owner's decrypted long-term secret key.
    pub fn get_secret_key(&self, id: SessionId) -> Result<KemSecretKey, CoreError> {
        self.with_live(id, |session, _| session.secret_key.clone())
    }

    /// The session message key.
    pub fn get_message_key(&self, id: SessionId) -> Result<SymmetricKey, CoreError> {
        self.with_live(id, |session, _| session.message_key.clone())
    }

    /// Return the memoized wrap of the message key for `peer`, creating it
    /// on first use.
    ///
    /// Atomic per session: concurrent callers for the same peer all receive
    /// the single wrap that was stored, and only one encapsulation happens.
    pub fn get_or_create_wrap(
        &self,
        id: SessionId,
        peer: &UserId,
        peer_public_key: &KemPublicKey,
    ) -> Result<Wrap, CoreError> {
        self.with_live(id, |session, state| {
            if let Some(wrap) = state.peer_wraps.get(peer) {
                tracing::trace!(session = ?id, peer = %peer, "wrap cache hit");
                return Ok(wrap.clone());
            }

            let wrap = Wrap::seal(
                self.kem.as_ref(),
                peer_public_key,
                &session.message_key,
                self.env.random_array(),
            )?;
            state.peer_wraps.insert(peer.clone(), wrap.clone());

            tracing::debug!(session = ?id, peer = %peer, "wrap created");
            Ok(wrap)
        })?
    }

    /// Number of sessions that have not yet lapsed.
    pub fn active_sessions(&self) -> usize {
        let now = self.env.now();
        let sessions = self.sessions.read().expect("session table poisoned");
        sessions
            .values()
            .filter(|s| now < s.state.lock().expect("session poisoned").expires_at)
            .count()
    }

    /// Drop every lapsed session, returning how many were removed.
    ///
    /// Lookups already treat lapsed sessions as expired; this only reclaims
    /// their memory.
    pub fn purge_expired(&self) -> usize {
        let now = self.env.now();
        let expired: Vec<SessionId> = {
            let mut sessions = self.sessions.write().expect("session table poisoned");
            let expired: Vec<SessionId> = sessions
                .iter()
                .filter(|(_, s)| now >= s.state.lock().expect("session poisoned").expires_at)
                .map(|(id, _)| *id)
                .collect();
            for id in &expired {
                sessions.remove(id);
            }
            expired
        };

        let mut tombstones = self.tombstones.lock().expect("tombstones poisoned");
        for id in &expired {
            tombstones.insert(*id);
        }

        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "purged expired sessions");
        }
        expired.len()
    }

    /// Export a live session in its external cache form.
    pub fn export(&self, id: SessionId) -> Result<SessionRecord, CoreError> {
        let now = self.env.now();
        self.with_live(id, |session, state| SessionRecord {
            session_id: id.to_string(),
            owner: session.owner.clone(),
            secret_key_hex: hex::encode(&session.secret_key),
            message_key_hex: hex::encode(session.message_key.as_bytes()),
            peer_wraps: state
                .peer_wraps
                .iter()
                .map(|(peer, wrap)| (peer.clone(), WrapRecord::from(wrap)))
                .collect::<BTreeMap<_, _>>(),
            expires_in_secs: (state.expires_at - now).as_secs(),
        })
    }

    /// Install a session exported by [`SessionCache::export`].
    ///
    /// # Errors
    ///
    /// - `SessionExpired`: the record has no lifetime left, or its id was
    ///   already retired here
    /// - `SessionExists`: a live session already holds the id
    /// - `InvalidEncoding` / `InvalidLength`: malformed record
    pub fn import(&self, record: &SessionRecord) -> Result<SessionId, CoreError> {
        let parts = record.decode()?;
        let id = parts.session_id;
        if record.expires_in_secs == 0 {
            return Err(CoreError::SessionExpired(id));
        }

        let session = Arc::new(Session {
            owner: parts.owner,
            secret_key: parts.secret_key,
            message_key: parts.message_key,
            state: Mutex::new(SessionState {
                expires_at: self.env.now() + Duration::from_secs(record.expires_in_secs),
                peer_wraps: parts.peer_wraps.into_iter().collect(),
            }),
        });

        let mut sessions = self.sessions.write().expect("session table poisoned");
        if self.tombstones.lock().expect("tombstones poisoned").contains(id) {
            return Err(CoreError::SessionExpired(id));
        }
        if sessions.contains_key(&id) {
            return Err(CoreError::SessionExists(id));
        }
        sessions.insert(id, session);
        drop(sessions);

        tracing::debug!(session = ?id, "session imported");
        Ok(id)
    }

    /// Run `f` against a session that is present and not lapsed.
    ///
    /// The session mutex is held while `f` runs. A lapsed session is retired
    /// after the mutex is released.
    fn with_live<T>(
        &self,
        id: SessionId,
        f: impl FnOnce(&Session<E::Instant>, &mut SessionState<E::Instant>) -> T,
    ) -> Result<T, CoreError> {
        let session = self.lookup(id)?;

        {
            let mut state = session.state.lock().expect("session poisoned");
            if self.env.now() < state.expires_at {
                return Ok(f(&session, &mut state));
            }
        }

        self.retire(id, &session);
        Err(CoreError::SessionExpired(id))
    }

    fn lookup(&self, id: SessionId) -> Result<Arc<Session<E::Instant>>, CoreError> {
        let found = self.sessions.read().expect("session table poisoned").get(&id).cloned();
        match found {
            Some(session) => Ok(session),
            None if self.tombstones.lock().expect("tombstones poisoned").contains(id) => {
                Err(CoreError::SessionExpired(id))
            },
            None => Err(CoreError::SessionNotFound(id)),
        }
    }

    /// Remove a lapsed session, unless it was replaced by an import meanwhile.
    fn retire(&self, id: SessionId, session: &Arc<Session<E::Instant>>) {
        let mut sessions = self.sessions.write().expect("session table poisoned");
        if sessions.get(&id).is_some_and(|current| Arc::ptr_eq(current, session)) {
            sessions.remove(&id);
            self.tombstones.lock().expect("tombstones poisoned").insert(id);
            tracing::debug!(session = ?id, "session expired");
        }
    }
}
