//! Messaging: send a text to a user, read a conversation.
//!
//! Text is UTF-8 at this layer; the core only sees bytes. Storage only ever
//! receives sealed records.

use chrono::{DateTime, Utc};
use hushpost_core::{
    CoreError, Environment, MessageRecord, Participant, SessionId, StoredMessage, UserId,
    UserRecord, order_conversation, unseal_message,
};

use crate::{Server, error::ServerError, storage::Storage};

/// One decrypted message of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationEntry {
    /// Storage sequence number
    pub sequence: u64,
    /// When the message was sealed
    pub timestamp: DateTime<Utc>,
    /// Sender username
    pub from: String,
    /// Receiver username
    pub to: String,
    /// Message text
    pub text: String,
}

impl<E: Environment, S: Storage> Server<E, S> {
    /// Seal `text` for `recipient` and persist it. Returns the sequence
    /// number storage assigned.
    ///
    /// A failed write leaves nothing behind and may simply be retried: the
    /// session's wraps are cached, so the retry does no KEM work.
    ///
    /// # Errors
    ///
    /// - `UnknownUser`: no account named `recipient`
    /// - `Core(SessionExpired | SessionNotFound)`: log in again
    /// - `Core(InvalidRecipient)`: `recipient` is the sender
    /// - `Storage`: lookup or write failed
    pub fn send(
        &self,
        session: SessionId,
        recipient: &str,
        text: &str,
    ) -> Result<u64, ServerError> {
        let sender = self.session_user(session)?;
        let receiver = self.user_named(recipient)?;
        let sender_key = sender.public_key()?;
        let receiver_key = receiver.public_key()?;

        let sealed = self.codec.seal_message(
            session,
            Participant { id: &sender.user_id, public_key: &sender_key },
            Participant { id: &receiver.user_id, public_key: &receiver_key },
            text.as_bytes(),
        )?;

        let sequence = self.storage.append_message(&MessageRecord::from(&sealed))?;
        tracing::debug!(
            from = %sender.user_id,
            to = %receiver.user_id,
            sequence,
            "message stored"
        );
        Ok(sequence)
    }

    /// Every message between the session owner and `peer`, decrypted,
    /// oldest first.
    ///
    /// All-or-nothing: one message that fails to open fails the call.
    ///
    /// # Errors
    ///
    /// - `UnknownUser`: no account named `peer`
    /// - `Core(EnvelopeCorrupt)`: a stored message was tampered with
    /// - `Core(InvalidEncoding | InvalidLength)`: a stored record is malformed
    /// - `InvalidUtf8`: a message opened but is not text
    pub fn conversation(
        &self,
        session: SessionId,
        peer: &str,
    ) -> Result<Vec<ConversationEntry>, ServerError> {
        let owner = self.session_user(session)?;
        let peer = self.user_named(peer)?;
        self.sessions.touch(session)?;
        let secret_key = self.sessions.get_secret_key(session)?;

        let stored = self
            .storage
            .messages_between(&owner.user_id, &peer.user_id)?
            .into_iter()
            .map(|(sequence, record)| {
                Ok::<_, CoreError>(StoredMessage { sequence, message: record.decode()? })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let username_of = |id: &UserId| {
            if id == &owner.user_id { owner.username.clone() } else { peer.username.clone() }
        };

        let mut entries = Vec::with_capacity(stored.len());
        for StoredMessage { sequence, message } in order_conversation(stored) {
            let plaintext =
                unseal_message(self.sessions.kem(), &message, &owner.user_id, &secret_key)?;
            let text = String::from_utf8(plaintext).map_err(|_| ServerError::InvalidUtf8)?;

            entries.push(ConversationEntry {
                sequence,
                timestamp: message.timestamp(),
                from: username_of(message.from()),
                to: username_of(message.to()),
                text,
            });
        }

        tracing::debug!(user = %owner.user_id, count = entries.len(), "conversation read");
        Ok(entries)
    }

    /// Account record of a live session's owner.
    fn session_user(&self, session: SessionId) -> Result<UserRecord, ServerError> {
        let id = self.sessions.owner(session)?;
        self.storage.user_by_id(&id)?.ok_or_else(|| ServerError::UnknownUser(id.to_string()))
    }

    fn user_named(&self, username: &str) -> Result<UserRecord, ServerError> {
        let username = username.trim();
        self.storage
            .user_by_username(username)?
            .ok_or_else(|| ServerError::UnknownUser(username.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use hushpost_core::env::test_utils::MockEnv;
    use hushpost_crypto::kem::testing::DeterministicKem;

    use super::*;
    use crate::{ServerConfig, storage::MemoryStorage};

    const PASSWORD: &str = "Sup3r#secret";

    struct Fixture {
        env: MockEnv,
        kem: Arc<DeterministicKem>,
        server: Server<MockEnv, MemoryStorage>,
    }

    fn fixture(names: &[&str]) -> Fixture {
        let env = MockEnv::default();
        let kem = Arc::new(DeterministicKem::new());
        let config = ServerConfig {
            pbkdf2_iterations: 10,
            session_ttl: Duration::from_secs(60),
            ..ServerConfig::default()
        };
        let server =
            Server::with_kem(MemoryStorage::new(), env.clone(), kem.clone(), &config).unwrap();
        for name in names {
            server.register(name, PASSWORD, PASSWORD).unwrap();
        }
        Fixture { env, kem, server }
    }

    #[test]
    fn both_sides_read_the_same_conversation() {
        let Fixture { env, server, .. } = fixture(&["alice", "bob"]);
        let alice = server.login("alice", PASSWORD).unwrap();
        let bob = server.login("bob", PASSWORD).unwrap();

        server.send(alice, "bob", "hi bob").unwrap();
        env.advance(Duration::from_secs(1));
        server.send(bob, "alice", "hi alice").unwrap();

        let as_alice = server.conversation(alice, "bob").unwrap();
        let as_bob = server.conversation(bob, "alice").unwrap();

        let texts: Vec<_> = as_alice.iter().map(|e| (e.from.as_str(), e.text.as_str())).collect();
        assert_eq!(texts, vec![("alice", "hi bob"), ("bob", "hi alice")]);
        assert_eq!(as_alice, as_bob);
    }

    #[test]
    fn sender_reads_own_message_after_new_login() {
        let Fixture { server, .. } = fixture(&["alice", "bob"]);
        let first = server.login("alice", PASSWORD).unwrap();
        server.send(first, "bob", "remember this").unwrap();
        server.logout(first).unwrap();

        let second = server.login("alice", PASSWORD).unwrap();
        let entries = server.conversation(second, "bob").unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "remember this");
        assert_eq!(entries[0].to, "bob");
    }

    #[test]
    fn third_party_conversations_stay_separate() {
        let Fixture { server, .. } = fixture(&["alice", "bob", "carol"]);
        let alice = server.login("alice", PASSWORD).unwrap();
        let carol = server.login("carol", PASSWORD).unwrap();

        server.send(alice, "bob", "for bob").unwrap();
        server.send(carol, "alice", "for alice").unwrap();

        let with_bob = server.conversation(alice, "bob").unwrap();
        let carol_with_bob = server.conversation(carol, "bob").unwrap();

        assert_eq!(with_bob.len(), 1);
        assert!(carol_with_bob.is_empty());
    }

    #[test]
    fn repeated_sends_reuse_wraps() {
        let Fixture { kem, server, .. } = fixture(&["alice", "bob"]);
        let alice = server.login("alice", PASSWORD).unwrap();
        let before = kem.encapsulations();

        for i in 0..5 {
            server.send(alice, "bob", &format!("message {i}")).unwrap();
        }

        assert_eq!(kem.encapsulations() - before, 2);
    }

    #[test]
    fn unknown_recipient_and_self_send_rejected() {
        let Fixture { server, .. } = fixture(&["alice"]);
        let alice = server.login("alice", PASSWORD).unwrap();

        assert!(matches!(
            server.send(alice, "nobody", "hello"),
            Err(ServerError::UnknownUser(name)) if name == "nobody"
        ));
        assert!(matches!(
            server.send(alice, "alice", "hello me"),
            Err(ServerError::Core(CoreError::InvalidRecipient(_)))
        ));
        assert_eq!(server.storage().message_count(), 0);
    }

    #[test]
    fn expired_session_must_log_in_again() {
        let Fixture { env, server, .. } = fixture(&["alice", "bob"]);
        let alice = server.login("alice", PASSWORD).unwrap();

        env.advance(Duration::from_secs(61));

        let err = server.send(alice, "bob", "too late").unwrap_err();
        assert!(matches!(err, ServerError::Core(ref core) if core.requires_login()));
        assert!(server.conversation(alice, "bob").is_err());
    }

    #[test]
    fn activity_keeps_session_alive() {
        let Fixture { env, server, .. } = fixture(&["alice", "bob"]);
        let alice = server.login("alice", PASSWORD).unwrap();

        for _ in 0..3 {
            env.advance(Duration::from_secs(45));
            server.send(alice, "bob", "still here").unwrap();
        }
        env.advance(Duration::from_secs(45));
        assert_eq!(server.conversation(alice, "bob").unwrap().len(), 3);
    }

    #[test]
    fn non_text_plaintext_is_invalid_utf8() {
        let Fixture { server, .. } = fixture(&["alice", "bob"]);
        let alice = server.login("alice", PASSWORD).unwrap();
        let sender = server.storage().user_by_username("alice").unwrap().unwrap();
        let receiver = server.storage().user_by_username("bob").unwrap().unwrap();

        let sealed = server
            .codec
            .seal_message(
                alice,
                Participant { id: &sender.user_id, public_key: &sender.public_key().unwrap() },
                Participant { id: &receiver.user_id, public_key: &receiver.public_key().unwrap() },
                &[0xff, 0xfe],
            )
            .unwrap();
        server.storage().append_message(&MessageRecord::from(&sealed)).unwrap();

        assert!(matches!(server.conversation(alice, "bob"), Err(ServerError::InvalidUtf8)));
    }
}
