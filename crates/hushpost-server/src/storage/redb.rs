//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety.
//! All accounts and messages survive restarts.

use std::{path::Path, sync::Arc};

use hushpost_core::{MessageRecord, UserId, UserRecord};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Serialize, de::DeserializeOwned};

use super::{Storage, StorageError};

/// Table: users
/// Key: user id (UTF-8)
/// Value: CBOR-encoded `UserRecord`
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Table: usernames
/// Key: username (UTF-8)
/// Value: user id (UTF-8)
const USERNAMES: TableDefinition<&str, &str> = TableDefinition::new("usernames");

/// Table: messages
/// Key: sequence as big-endian bytes [8 bytes]
/// Value: CBOR-encoded `MessageRecord`
const MESSAGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("messages");

/// Table: conversations
/// Key: conversation key + sequence (see `encode_conversation_key`)
/// Value: empty
const CONVERSATIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("conversations");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (USERS, USERNAMES, MESSAGES,
    /// CONVERSATIONS).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(USERS).map_err(io)?;
            let _ = txn.open_table(USERNAMES).map_err(io)?;
            let _ = txn.open_table(MESSAGES).map_err(io)?;
            let _ = txn.open_table(CONVERSATIONS).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Storage for RedbStorage {
    fn insert_user(&self, user: &UserRecord) -> Result<(), StorageError> {
        let bytes = to_cbor(user)?;
        let txn = self.db.begin_write().map_err(io)?;

        {
            let mut usernames = txn.open_table(USERNAMES).map_err(io)?;
            let mut users = txn.open_table(USERS).map_err(io)?;

            if usernames.get(user.username.as_str()).map_err(io)?.is_some() {
                return Err(StorageError::Conflict(format!("username {}", user.username)));
            }
            if users.get(user.user_id.as_str()).map_err(io)?.is_some() {
                return Err(StorageError::Conflict(format!("user id {}", user.user_id)));
            }

            usernames.insert(user.username.as_str(), user.user_id.as_str()).map_err(io)?;
            users.insert(user.user_id.as_str(), bytes.as_slice()).map_err(io)?;
        }

        txn.commit().map_err(io)?;

        Ok(())
    }

    fn user_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let users = txn.open_table(USERS).map_err(io)?;

        match users.get(id.as_str()).map_err(io)? {
            Some(value) => Ok(Some(from_cbor(value.value())?)),
            None => Ok(None),
        }
    }

    fn user_by_username(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let usernames = txn.open_table(USERNAMES).map_err(io)?;
        let users = txn.open_table(USERS).map_err(io)?;

        let Some(id) = usernames.get(username).map_err(io)? else {
            return Ok(None);
        };

        match users.get(id.value()).map_err(io)? {
            Some(value) => Ok(Some(from_cbor(value.value())?)),
            None => Err(StorageError::Serialization(format!(
                "username {username} points at missing user {}",
                id.value()
            ))),
        }
    }

    fn append_message(&self, message: &MessageRecord) -> Result<u64, StorageError> {
        let bytes = to_cbor(message)?;
        let txn = self.db.begin_write().map_err(io)?;

        let sequence = {
            let mut messages = txn.open_table(MESSAGES).map_err(io)?;
            let mut conversations = txn.open_table(CONVERSATIONS).map_err(io)?;

            let sequence = match messages.last().map_err(io)? {
                Some((key, _)) => decode_sequence(key.value())? + 1,
                None => 0,
            };

            messages.insert(sequence.to_be_bytes().as_slice(), bytes.as_slice()).map_err(io)?;

            let index_key = encode_conversation_key(&message.from, &message.to, sequence);
            let empty: &[u8] = &[];
            conversations.insert(index_key.as_slice(), empty).map_err(io)?;

            sequence
        };

        txn.commit().map_err(io)?;

        Ok(sequence)
    }

    fn messages_between(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Vec<(u64, MessageRecord)>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let conversations = txn.open_table(CONVERSATIONS).map_err(io)?;
        let messages = txn.open_table(MESSAGES).map_err(io)?;

        let start_key = encode_conversation_key(a, b, 0);
        let end_key = encode_conversation_key(a, b, u64::MAX);

        let mut found = Vec::new();
        for entry in conversations.range(start_key.as_slice()..=end_key.as_slice()).map_err(io)? {
            let (key, _) = entry.map_err(io)?;
            let sequence = decode_sequence(&key.value()[start_key.len() - 8..])?;

            let Some(value) = messages.get(sequence.to_be_bytes().as_slice()).map_err(io)? else {
                return Err(StorageError::Serialization(format!(
                    "conversation index points at missing message {sequence}"
                )));
            };
            found.push((sequence, from_cbor(value.value())?));
        }

        Ok(found)
    }
}

/// Encode the conversation index key for a pair of users.
///
/// Layout: [lo id][0x00][hi id][0x00][sequence: 8 bytes BE], where lo/hi are
/// the two ids in sorted order so both directions share one prefix. Ids
/// never contain NUL, so prefixes of different pairs cannot collide.
fn encode_conversation_key(a: &UserId, b: &UserId, sequence: u64) -> Vec<u8> {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

    let mut key = Vec::with_capacity(lo.as_str().len() + hi.as_str().len() + 10);
    key.extend_from_slice(lo.as_str().as_bytes());
    key.push(0);
    key.extend_from_slice(hi.as_str().as_bytes());
    key.push(0);
    key.extend_from_slice(&sequence.to_be_bytes());
    key
}

fn decode_sequence(bytes: &[u8]) -> Result<u64, StorageError> {
    let array: [u8; 8] = bytes.try_into().map_err(|_| {
        StorageError::Serialization(format!("sequence key must be 8 bytes, got {}", bytes.len()))
    })?;
    Ok(u64::from_be_bytes(array))
}

fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[allow(clippy::needless_pass_by_value)]
fn io(err: impl ToString) -> StorageError {
    StorageError::Io(err.to_string())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::storage::memory::tests::{message, user};

    #[test]
    fn conversation_key_is_direction_independent() {
        let a = UserId::from("alice");
        let b = UserId::from("bob");

        assert_eq!(encode_conversation_key(&a, &b, 7), encode_conversation_key(&b, &a, 7));
        assert_eq!(decode_sequence(&encode_conversation_key(&a, &b, 7)[10..]).unwrap(), 7);
    }

    #[test]
    fn users_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        let record = user("u1", "alice");
        storage.insert_user(&record).unwrap();

        assert_eq!(storage.user_by_username("alice").unwrap(), Some(record.clone()));
        assert_eq!(storage.user_by_id(&UserId::from("u1")).unwrap(), Some(record));
        assert_eq!(storage.user_by_username("bob").unwrap(), None);
    }

    #[test]
    fn duplicate_username_conflicts() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        storage.insert_user(&user("u1", "alice")).unwrap();
        let err = storage.insert_user(&user("u2", "alice")).unwrap_err();

        assert_eq!(err, StorageError::Conflict("username alice".to_string()));
        assert_eq!(storage.user_by_id(&UserId::from("u2")).unwrap(), None);
    }

    #[test]
    fn sequences_increase_and_conversations_filter() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        assert_eq!(storage.append_message(&message("alice", "bob", "1")).unwrap(), 0);
        assert_eq!(storage.append_message(&message("alice", "carol", "2")).unwrap(), 1);
        assert_eq!(storage.append_message(&message("bob", "alice", "3")).unwrap(), 2);
        assert_eq!(storage.append_message(&message("bob", "alicea", "4")).unwrap(), 3);

        let between =
            storage.messages_between(&UserId::from("bob"), &UserId::from("alice")).unwrap();
        let markers: Vec<_> =
            between.iter().map(|(seq, m)| (*seq, m.message_ciphertext_hex.as_str())).collect();

        assert_eq!(markers, vec![(0, "1"), (2, "3")]);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");

        {
            let storage = RedbStorage::open(&path).unwrap();
            storage.insert_user(&user("u1", "alice")).unwrap();
            storage.append_message(&message("u1", "u2", "kept")).unwrap();
        }

        let storage = RedbStorage::open(&path).unwrap();
        assert!(storage.user_by_username("alice").unwrap().is_some());
        assert_eq!(storage.append_message(&message("u2", "u1", "next")).unwrap(), 1);
        let between = storage.messages_between(&UserId::from("u1"), &UserId::from("u2")).unwrap();
        assert_eq!(between.len(), 2);
    }
}
