//! Topic paths and subscription patterns.
//!
//! Topics are hierarchical `/`-separated paths. The chat protocol uses
//! exactly two segments, `room/participant`: every participant publishes to
//! the topic named after itself and subscribes either to the peer's topic or
//! to a room-wide wildcard.
//!
//! Patterns may contain `+` (matches exactly one segment) or a trailing `#`
//! (matches any number of remaining segments, including zero).

use crate::identity::Identity;

/// Single-segment wildcard recognized in subscription patterns.
pub const SINGLE_LEVEL_WILDCARD: &str = "+";

/// Trailing multi-segment wildcard recognized in subscription patterns.
pub const MULTI_LEVEL_WILDCARD: &str = "#";

/// Which topics a session subscribes to within its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscribeScope {
    /// Subscribe only to the peer's topic, `room/<peer>`.
    Peer,
    /// Subscribe to the whole room, `room/#`. The broker will echo the
    /// subscriber's own publishes back; the session layer filters them.
    #[default]
    Room,
}

/// Returns the topic a participant publishes to: `<room>/<identity>`.
#[must_use]
pub fn publish_topic(room: &str, identity: &Identity) -> String {
    format!("{room}/{identity}")
}

/// Returns the subscription pattern for the given scope.
#[must_use]
pub fn subscribe_pattern(room: &str, peer: &Identity, scope: SubscribeScope) -> String {
    match scope {
        SubscribeScope::Peer => format!("{room}/{peer}"),
        SubscribeScope::Room => format!("{room}/{MULTI_LEVEL_WILDCARD}"),
    }
}

/// Extracts the participant segment from a topic path.
///
/// Returns `None` when the topic has no second segment, or when that
/// segment is empty. No identity validation is applied here: the sender
/// segment of an inbound topic is reported as-is.
#[must_use]
pub fn sender_segment(topic: &str) -> Option<&str> {
    let segment = topic.split('/').nth(1)?;
    if segment.is_empty() { None } else { Some(segment) }
}

/// Tests whether a subscription pattern matches a concrete topic.
///
/// `+` matches exactly one segment; `#` must be the final pattern segment
/// and matches everything that remains. Concrete segments compare exactly.
#[must_use]
pub fn pattern_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_segments = pattern.split('/').peekable();
    let mut topic_segments = topic.split('/');

    loop {
        match (pattern_segments.next(), topic_segments.next()) {
            (Some(MULTI_LEVEL_WILDCARD), _) => {
                // Only valid as the last pattern segment.
                return pattern_segments.peek().is_none();
            }
            (Some(SINGLE_LEVEL_WILDCARD), Some(_)) => {}
            (Some(expected), Some(actual)) if expected == actual => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
