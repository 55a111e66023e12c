//! Participant identities for the `TopiChat` protocol.
//!
//! An identity names one participant in a conversation and doubles as the
//! final segment of that participant's publish topic, so it must be free of
//! the characters the topic grammar reserves.

use serde::{Deserialize, Serialize};

/// Characters an identity may not contain: the topic segment separator and
/// the trailing multi-segment wildcard.
pub const RESERVED_CHARS: [char; 2] = ['/', '#'];

/// Error returned when an identity fails validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Identity is empty (or whitespace only).
    #[error("identity must not be empty")]
    Empty,
    /// Identity contains a character reserved by the topic grammar.
    #[error("identity must not contain '{0}'")]
    ReservedChar(char),
}

/// A validated participant name.
///
/// Non-empty and free of `/` and `#`, so it can be embedded as a topic
/// segment without changing the topic's shape. Immutable once created;
/// a session binds two of these (self and peer) for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(String);

impl Identity {
    /// Validates `raw` and wraps it as an [`Identity`].
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::Empty`] if the trimmed input is empty, or
    /// [`IdentityError::ReservedChar`] naming the first reserved character
    /// found.
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }
        for ch in RESERVED_CHARS {
            if trimmed.contains(ch) {
                return Err(IdentityError::ReservedChar(ch));
            }
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_plain_name() {
        let id = Identity::parse("alice").unwrap();
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn parse_trims_whitespace() {
        let id = Identity::parse("  bob \n").unwrap();
        assert_eq!(id.as_str(), "bob");
    }

    #[test]
    fn parse_rejects_empty() {
        assert_eq!(Identity::parse(""), Err(IdentityError::Empty));
        assert_eq!(Identity::parse("   "), Err(IdentityError::Empty));
    }

    #[test]
    fn parse_rejects_separator() {
        assert_eq!(
            Identity::parse("room/alice"),
            Err(IdentityError::ReservedChar('/'))
        );
    }

    #[test]
    fn parse_rejects_wildcard() {
        assert_eq!(
            Identity::parse("alice#1"),
            Err(IdentityError::ReservedChar('#'))
        );
    }

    #[test]
    fn parse_allows_unicode_and_spaces_inside() {
        assert!(Identity::parse("Böbby Tables").is_ok());
    }

    #[test]
    fn display_matches_inner() {
        let id = Identity::parse("carol").unwrap();
        assert_eq!(id.to_string(), "carol");
    }

    #[test]
    fn from_str_round_trip() {
        let id: Identity = "dave".parse().unwrap();
        assert_eq!(id.as_str(), "dave");
    }
}
