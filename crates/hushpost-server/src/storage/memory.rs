//! In-memory storage backend.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use hushpost_core::{MessageRecord, UserId, UserRecord};

use super::{Storage, StorageError};

/// In-memory storage implementation for testing and simulation
///
/// Users are indexed by id and by username; messages live in one
/// append-only log whose index is the sequence number. All state is wrapped
/// in Arc<Mutex<>> to allow Clone and concurrent access. Uses
/// `lock().expect()`, which panics if the mutex is poisoned - acceptable for
/// test code. `messages_between` is O(total messages).
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

#[derive(Default)]
struct MemoryStorageInner {
    /// Users by id
    users: HashMap<UserId, UserRecord>,

    /// Username -> user id
    usernames: HashMap<String, UserId>,

    /// Message log, index = sequence
    messages: Vec<MessageRecord>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn user_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").users.len()
    }

    /// Number of stored messages.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn message_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").messages.len()
    }
}

#[allow(clippy::expect_used)]
impl Storage for MemoryStorage {
    fn insert_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        if inner.usernames.contains_key(&user.username) {
            return Err(StorageError::Conflict(format!("username {}", user.username)));
        }
        if inner.users.contains_key(&user.user_id) {
            return Err(StorageError::Conflict(format!("user id {}", user.user_id)));
        }

        inner.usernames.insert(user.username.clone(), user.user_id.clone());
        inner.users.insert(user.user_id.clone(), user.clone());
        Ok(())
    }

    fn user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").users.get(id).cloned())
    }

    fn user_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.usernames.get(username).and_then(|id| inner.users.get(id)).cloned())
    }

    fn append_message(&self, message: &MessageRecord) -> Result<u64, StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        let sequence = inner.messages.len() as u64;
        inner.messages.push(message.clone());
        Ok(sequence)
    }

    fn messages_between(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Vec<(u64, MessageRecord)>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| (&m.from == a && &m.to == b) || (&m.from == b && &m.to == a))
            .map(|(seq, m)| (seq as u64, m.clone()))
            .collect())
    }
}
