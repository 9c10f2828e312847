//! Chaotic storage wrapper for fault injection testing
//!
//! Wraps another backend and fails a configurable share of calls with a
//! transient I/O error. Used to check that a failed write leaves no partial
//! state behind and that a retried `send` reuses the session's cached wraps.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use hushpost_core::{MessageRecord, UserId, UserRecord};

use super::{Storage, StorageError};

/// Storage wrapper that injects failures at a fixed rate.
///
/// Failures are decided by a seeded generator, so a given seed reproduces
/// the same failure pattern. Clones share the generator and counter.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<Mutex<ChaoticRng>>,
    operation_count: Arc<AtomicUsize>,
}

/// Linear congruential generator; reproducible for a given seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes constants
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = A.wrapping_mul(self.state).wrapping_add(C) % M;
        self.state as f64 / M as f64
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Wrap `inner` with the default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Wrap `inner` with an explicit seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng { state: seed })),
            operation_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying storage, for checking state after chaos.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage calls attempted, failed ones included.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    /// Count the call and decide whether it fails.
    fn roll(&self, operation: &'static str) -> Result<(), StorageError> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);

        #[allow(clippy::expect_used)]
        let value = self.rng.lock().expect("ChaoticRng mutex poisoned").next();
        if value < self.failure_rate {
            tracing::debug!(operation, "injecting storage failure");
            return Err(StorageError::Io(format!("injected failure in {operation}")));
        }
        Ok(())
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn insert_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        self.roll("insert_user")?;
        self.inner.insert_user(user)
    }

    fn user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StorageError> {
        self.roll("user_by_id")?;
        self.inner.user_by_id(id)
    }

    fn user_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        self.roll("user_by_username")?;
        self.inner.user_by_username(username)
    }

    fn append_message(&self, message: &MessageRecord) -> Result<u64, StorageError> {
        self.roll("append_message")?;
        self.inner.append_message(message)
    }

    fn messages_between(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Vec<(u64, MessageRecord)>, StorageError> {
        self.roll("messages_between")?;
        self.inner.messages_between(a, b)
    }
}
