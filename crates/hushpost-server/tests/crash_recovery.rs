//! Restart tests over `RedbStorage` with the production KEM.
//!
//! Accounts and sealed messages persist across a database close/reopen;
//! sessions do not. After a restart every user logs in again and can still
//! read their whole history, including messages they sent themselves.

use std::time::Duration;

use hushpost_core::env::test_utils::MockEnv;
use hushpost_server::{RedbStorage, Server, ServerConfig, ServerError, Storage};
use tempfile::tempdir;

const ALICE_PASSWORD: &str = "Alice#pass1";
const BOB_PASSWORD: &str = "Bob#pass22";

fn config() -> ServerConfig {
    ServerConfig { pbkdf2_iterations: 1_000, ..ServerConfig::default() }
}

fn open(path: &std::path::Path, env: &MockEnv) -> Server<MockEnv, RedbStorage> {
    Server::new(RedbStorage::open(path).unwrap(), env.clone(), &config()).unwrap()
}

#[test]
fn accounts_and_messages_survive_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hushpost.redb");
    let env = MockEnv::default();

    {
        let server = open(&path, &env);
        server.register("alice", ALICE_PASSWORD, ALICE_PASSWORD).unwrap();
        server.register("bob", BOB_PASSWORD, BOB_PASSWORD).unwrap();

        let alice = server.login("alice", ALICE_PASSWORD).unwrap();
        assert_eq!(server.send(alice, "bob", "before restart").unwrap(), 0);
        env.advance(Duration::from_secs(5));
        // Server dropped without logout
    }

    let server = open(&path, &env);

    let bob = server.login("bob", BOB_PASSWORD).unwrap();
    assert_eq!(server.send(bob, "alice", "after restart").unwrap(), 1);

    let alice = server.login("alice", ALICE_PASSWORD).unwrap();
    let history = server.conversation(alice, "bob").unwrap();
    let lines: Vec<_> =
        history.iter().map(|e| (e.from.as_str(), e.to.as_str(), e.text.as_str())).collect();

    assert_eq!(
        lines,
        vec![("alice", "bob", "before restart"), ("bob", "alice", "after restart")]
    );
    assert!(history[0].timestamp < history[1].timestamp);
}

#[test]
fn usernames_stay_taken_after_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hushpost.redb");
    let env = MockEnv::default();

    let id = open(&path, &env).register("alice", ALICE_PASSWORD, ALICE_PASSWORD).unwrap();

    let server = open(&path, &env);
    assert!(matches!(
        server.register("alice", BOB_PASSWORD, BOB_PASSWORD),
        Err(ServerError::UsernameTaken(_))
    ));
    assert_eq!(server.storage().user_by_username("alice").unwrap().unwrap().user_id, id);
}

#[test]
fn stored_records_hold_no_plaintext() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hushpost.redb");
    let env = MockEnv::default();

    {
        let server = open(&path, &env);
        server.register("alice", ALICE_PASSWORD, ALICE_PASSWORD).unwrap();
        server.register("bob", BOB_PASSWORD, BOB_PASSWORD).unwrap();
        let alice = server.login("alice", ALICE_PASSWORD).unwrap();
        server.send(alice, "bob", "attack at dawn").unwrap();
    }

    let raw = std::fs::read(&path).unwrap();
    assert!(!raw.windows(b"attack at dawn".len()).any(|w| w == b"attack at dawn"));
    assert!(!raw.windows(ALICE_PASSWORD.len()).any(|w| w == ALICE_PASSWORD.as_bytes()));
}

#[test]
fn pbkdf2_iterations_must_match_registration() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hushpost.redb");
    let env = MockEnv::default();

    open(&path, &env).register("alice", ALICE_PASSWORD, ALICE_PASSWORD).unwrap();

    let other = ServerConfig { pbkdf2_iterations: 2_000, ..config() };
    let server = Server::new(RedbStorage::open(&path).unwrap(), env, &other).unwrap();

    assert!(matches!(server.login("alice", ALICE_PASSWORD), Err(ServerError::Crypto(_))));
}
