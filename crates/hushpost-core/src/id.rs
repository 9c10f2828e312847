//! Identifiers for users and login sessions.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Stable identifier of a registered user.
///
/// Opaque to the protocol; the account layer decides how ids are minted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque login session token: 128 random bits.
///
/// Rendered as 32 lowercase hex characters at every boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u128);

impl SessionId {
    /// Length of the hex rendering.
    pub const HEX_LEN: usize = 32;

    /// Wrap a raw token value.
    pub fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// Raw token value.
    pub fn as_u128(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

// Tokens are bearer credentials; debug output shows a prefix only.
impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({:08x}..)", self.0 >> 96)
    }
}

impl FromStr for SessionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN {
            return Err(CoreError::InvalidLength {
                what: "session id",
                expected: Self::HEX_LEN,
                actual: s.len(),
            });
        }
        if !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(CoreError::InvalidEncoding {
                field: "session_id",
                reason: "expected lowercase hex".to_string(),
            });
        }

        u128::from_str_radix(s, 16).map(Self).map_err(|e| CoreError::InvalidEncoding {
            field: "session_id",
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_renders_as_32_hex_chars() {
        let id = SessionId::from_u128(0xABCD);
        let text = id.to_string();

        assert_eq!(text.len(), 32);
        assert_eq!(text, "0000000000000000000000000000abcd");
        assert_eq!(text.parse::<SessionId>().unwrap(), id);
    }

    #[test]
    fn session_id_parse_rejects_bad_input() {
        assert!(matches!("abc".parse::<SessionId>(), Err(CoreError::InvalidLength { .. })));
        assert!(matches!(
            "0000000000000000000000000000ABCD".parse::<SessionId>(),
            Err(CoreError::InvalidEncoding { .. })
        ));
        assert!(matches!(
            "000000000000000000000000000000zz".parse::<SessionId>(),
            Err(CoreError::InvalidEncoding { .. })
        ));
    }

    #[test]
    fn session_id_debug_hides_full_token() {
        let id = SessionId::from_u128(0x1234_5678_9abc_def0_1122_3344_5566_7788);
        assert_eq!(format!("{id:?}"), "SessionId(12345678..)");
    }

    #[test]
    fn user_id_is_transparent_string() {
        let id = UserId::from("alice");
        assert_eq!(id.as_str(), "alice");
        assert_eq!(id.to_string(), "alice");
    }
}
