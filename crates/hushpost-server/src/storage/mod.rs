//! Storage abstraction for accounts and sealed messages.
//!
//! Storage only ever sees hex records: public keys, password-wrapped secret
//! keys and sealed messages. Nothing it holds is readable without a user's
//! password or secret key. The trait is synchronous, like every other layer.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
use hushpost_core::{MessageRecord, UserId, UserRecord};
pub use memory::MemoryStorage;

pub use self::redb::RedbStorage;

/// Storage abstraction for user accounts and the message log.
///
/// Must be Clone (shared by every request handler), Send + Sync, and
/// synchronous. Implementations share internal state via Arc, so clones see
/// the same data.
///
/// # Panics
///
/// Implementations may panic if internal synchronization primitives are
/// poisoned.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Persist a new user.
    ///
    /// # Errors
    ///
    /// - `Conflict`: the username or user id already exists
    fn insert_user(&self, user: &UserRecord) -> Result<(), StorageError>;

    /// Look up a user by id.
    fn user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StorageError>;

    /// Look up a user by exact username.
    fn user_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    /// Append a sealed message, returning its sequence number.
    ///
    /// # Invariants
    ///
    /// - Sequence numbers are unique and strictly increasing per store
    fn append_message(&self, message: &MessageRecord) -> Result<u64, StorageError>;

    /// All messages exchanged between `a` and `b`, in either direction,
    /// with their sequence numbers. Order is by sequence.
    fn messages_between(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Vec<(u64, MessageRecord)>, StorageError>;
}
