//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (time, randomness). The
//! session cache reads the monotonic clock for TTL checks, the codec reads
//! the wall clock for message timestamps, and every IV, message key and
//! session id comes from `random_bytes`.

use std::{
    ops::{Add, Sub},
    time::Duration,
};

use chrono::{DateTime, Utc};

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type used for session expiry.
    type Instant: Copy
        + Ord
        + Send
        + Sync
        + Sub<Output = Duration>
        + Add<Duration, Output = Self::Instant>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Current wall-clock time, used for message timestamps.
    fn wall_clock(&self) -> DateTime<Utc>;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u128`.
    fn random_u128(&self) -> u128 {
        let mut bytes = [0u8; 16];
        self.random_bytes(&mut bytes);
        u128::from_be_bytes(bytes)
    }

    /// Generates a random fixed-size array (IVs, salts, keys).
    fn random_array<const N: usize>(&self) -> [u8; N] {
        let mut bytes = [0u8; N];
        self.random_bytes(&mut bytes);
        bytes
    }
}

/// Test environments with a manually driven clock.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    #![allow(clippy::expect_used, reason = "Mutex poisoning should cause a panic")]

    use std::{
        ops::{Add, Sub},
        sync::{Arc, Mutex},
        time::Duration,
    };

    use chrono::{DateTime, TimeDelta, Utc};

    use super::Environment;

    /// Wall-clock origin of every [`MockEnv`]: 2024-01-01T00:00:00Z.
    pub const MOCK_EPOCH_SECS: i64 = 1_704_067_200;

    /// Virtual instant: time elapsed since the mock environment was created.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    pub struct MockInstant(Duration);

    impl Sub for MockInstant {
        type Output = Duration;

        fn sub(self, rhs: Self) -> Duration {
            self.0.saturating_sub(rhs.0)
        }
    }

    impl Add<Duration> for MockInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self {
            Self(self.0.saturating_add(rhs))
        }
    }

    struct MockState {
        elapsed: Duration,
        rng: u64,
    }

    /// Deterministic environment: time only moves on [`MockEnv::advance`]
    /// and randomness is a seeded splitmix64 stream.
    ///
    /// Clones share the same clock and RNG.
    #[derive(Clone)]
    pub struct MockEnv {
        state: Arc<Mutex<MockState>>,
    }

    impl MockEnv {
        /// Create an environment with the given RNG seed.
        pub fn with_seed(seed: u64) -> Self {
            Self { state: Arc::new(Mutex::new(MockState { elapsed: Duration::ZERO, rng: seed })) }
        }

        /// Move both clocks forward.
        pub fn advance(&self, by: Duration) {
            let mut state = self.state.lock().expect("Mutex poisoned");
            state.elapsed = state.elapsed.saturating_add(by);
        }
    }

    impl Default for MockEnv {
        fn default() -> Self {
            Self::with_seed(0x5EED)
        }
    }

    impl Environment for MockEnv {
        type Instant = MockInstant;

        fn now(&self) -> MockInstant {
            MockInstant(self.state.lock().expect("Mutex poisoned").elapsed)
        }

        fn wall_clock(&self) -> DateTime<Utc> {
            let elapsed = self.state.lock().expect("Mutex poisoned").elapsed;
            let origin = DateTime::from_timestamp(MOCK_EPOCH_SECS, 0).unwrap_or_default();
            let delta = TimeDelta::from_std(elapsed).unwrap_or(TimeDelta::MAX);
            origin.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            let mut state = self.state.lock().expect("Mutex poisoned");
            for chunk in buffer.chunks_mut(8) {
                state.rng = state.rng.wrapping_add(0x9E37_79B9_7F4A_7C15);
                let mut z = state.rng;
                z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
                z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
                z ^= z >> 31;
                chunk.copy_from_slice(&z.to_be_bytes()[..chunk.len()]);
            }
        }
    }
}
