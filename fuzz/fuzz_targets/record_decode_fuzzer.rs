//! Fuzz target for storage record decoding
//!
//! Records come back from storage, which is outside the trust boundary.
//!
//! # Strategy
//!
//! - Fields: arbitrary strings in every `MessageRecord` field
//! - Near-valid: hex of arbitrary bytes, so length checks are reached
//! - CBOR: arbitrary bytes deserialized as a `MessageRecord`
//!
//! # Invariants
//!
//! - Decoding NEVER panics
//! - A record that decodes re-encodes to one that decodes to the same message
//!   (hex case and timestamp offsets may normalize)

#![no_main]

use arbitrary::Arbitrary;
use hushpost_core::{MessageRecord, UserId};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum RecordInput {
    Fields([String; 9]),
    NearValid { fields: [Vec<u8>; 8], timestamp: String },
    Cbor(Vec<u8>),
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn check(record: &MessageRecord) {
    if let Ok(message) = record.decode() {
        let normalized = MessageRecord::from(&message);
        assert_eq!(normalized.decode().unwrap(), message);
    }
}

fuzz_target!(|input: RecordInput| {
    match input {
        RecordInput::Fields([a, b, c, d, e, f, g, h, timestamp]) => {
            check(&MessageRecord {
                from: UserId::from("alice"),
                to: UserId::from("bob"),
                message_ciphertext_hex: a,
                message_iv_hex: b,
                sender_ciphertext_hex: c,
                sender_wrapped_key_hex: d,
                sender_iv_hex: e,
                receiver_ciphertext_hex: f,
                receiver_wrapped_key_hex: g,
                receiver_iv_hex: h,
                timestamp,
            });
        }

        RecordInput::NearValid { fields, timestamp } => {
            let [a, b, c, d, e, f, g, h] = fields.map(|bytes| hex(&bytes));
            check(&MessageRecord {
                from: UserId::from("alice"),
                to: UserId::from("bob"),
                message_ciphertext_hex: a,
                message_iv_hex: b,
                sender_ciphertext_hex: c,
                sender_wrapped_key_hex: d,
                sender_iv_hex: e,
                receiver_ciphertext_hex: f,
                receiver_wrapped_key_hex: g,
                receiver_iv_hex: h,
                timestamp,
            });
        }

        RecordInput::Cbor(bytes) => {
            if let Ok(record) = ciborium::from_reader::<MessageRecord, _>(bytes.as_slice()) {
                check(&record);
            }
        }
    }
});
