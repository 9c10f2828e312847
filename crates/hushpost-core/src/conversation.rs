//! Conversation ordering.

use crate::message::EncryptedMessage;

/// A message together with the sequence number storage assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Insertion sequence, unique and increasing per store
    pub sequence: u64,
    /// The sealed message
    pub message: EncryptedMessage,
}

/// Order a conversation by timestamp, ties broken by insertion sequence.
///
/// Deterministic for any input order, so repeated listings agree.
pub fn order_conversation(mut messages: Vec<StoredMessage>) -> Vec<StoredMessage> {
    messages.sort_by(|a, b| {
        a.message
            .timestamp()
            .cmp(&b.message.timestamp())
            .then_with(|| a.sequence.cmp(&b.sequence))
    });
    messages
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use hushpost_crypto::{Kem, kem::testing::DeterministicKem};
    use proptest::prelude::*;

    use super::*;
    use crate::{
        codec::{HybridCodec, Participant},
        env::test_utils::MockEnv,
        id::UserId,
        session::SessionCache,
    };

    /// Seal `count` messages, advancing the clock by `gaps[i]` seconds first.
    fn conversation(gaps: &[u64]) -> Vec<StoredMessage> {
        let env = MockEnv::default();
        let kem = Arc::new(DeterministicKem::new());
        let sessions = Arc::new(SessionCache::new(env.clone(), kem.clone()));
        let codec = HybridCodec::new(Arc::clone(&sessions));

        let alice = kem.generate_keypair().unwrap();
        let bob = kem.generate_keypair().unwrap();
        let (alice_id, bob_id) = (UserId::from("alice"), UserId::from("bob"));
        let session = sessions.open(alice_id.clone(), alice.secret_key);

        gaps.iter()
            .enumerate()
            .map(|(i, gap)| {
                env.advance(Duration::from_secs(*gap));
                let message = codec
                    .seal_message(
                        session,
                        Participant { id: &alice_id, public_key: &alice.public_key },
                        Participant { id: &bob_id, public_key: &bob.public_key },
                        format!("message {i}").as_bytes(),
                    )
                    .unwrap();
                StoredMessage { sequence: i as u64, message }
            })
            .collect()
    }

    #[test]
    fn equal_timestamps_fall_back_to_sequence() {
        let mut messages = conversation(&[0, 0, 0]);
        messages.reverse();

        let ordered = order_conversation(messages);
        let sequences: Vec<u64> = ordered.iter().map(|m| m.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_order_is_independent_of_input_order(
            gaps in prop::collection::vec(0u64..3, 1..8),
            seed in any::<u64>(),
        ) {
            let messages = conversation(&gaps);

            let mut shuffled = messages.clone();
            let len = shuffled.len();
            for i in 0..len {
                let j = (seed.rotate_left(i as u32) as usize) % len;
                shuffled.swap(i, j);
            }

            let ordered = order_conversation(shuffled);
            prop_assert_eq!(&ordered, &messages);

            for pair in ordered.windows(2) {
                prop_assert!(pair[0].message.timestamp() <= pair[1].message.timestamp());
            }
        }
    }
}
