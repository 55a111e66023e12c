//! Broker wire frames and their codec.
//!
//! Every message between a client and the broker is one [`BrokerFrame`],
//! postcard-encoded and carried in a WebSocket binary frame. The broker
//! never interprets publish payloads — it routes on the topic alone.

use serde::{Deserialize, Serialize};

/// Error type for frame encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Messages exchanged between chat clients and the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BrokerFrame {
    /// Client announces itself. Must be the first frame on a connection.
    ///
    /// The broker replies with [`BrokerFrame::ConnAck`]. A `Connect` with a
    /// client id that is already connected replaces the old connection.
    Connect {
        /// Transport-level session identity, distinct from the chat identity.
        client_id: String,
        /// When set, any subscription state the broker kept for this client
        /// id from earlier connections is discarded.
        clean_session: bool,
    },

    /// Broker acknowledges a successful connect.
    ConnAck {
        /// Whether prior subscription state was restored for this client id.
        session_present: bool,
    },

    /// Client subscribes to a topic pattern (may contain `+` / `#`).
    Subscribe {
        /// The pattern to match published topics against.
        pattern: String,
    },

    /// Broker acknowledges a subscription.
    SubAck {
        /// The pattern that was registered (echoed back).
        pattern: String,
    },

    /// A payload published to a topic.
    ///
    /// Client → broker: a publish request. Broker → client: a delivery to
    /// every session with a matching subscription, the publisher included
    /// when its own patterns match.
    Publish {
        /// Concrete topic path (no wildcards).
        topic: String,
        /// Opaque payload bytes; the chat layer treats them as a string.
        payload: Vec<u8>,
    },

    /// Broker reports an error condition.
    Error {
        /// Human-readable error description.
        reason: String,
    },
}

/// Encodes a [`BrokerFrame`] into bytes using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the frame cannot be serialized.
pub fn encode(frame: &BrokerFrame) -> Result<Vec<u8>, CodecError> {
    postcard::to_allocvec(frame).map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Decodes a [`BrokerFrame`] from a byte slice using postcard.
///
/// # Errors
///
/// Returns [`CodecError::Serialization`] if the bytes cannot be deserialized.
pub fn decode(bytes: &[u8]) -> Result<BrokerFrame, CodecError> {
    postcard::from_bytes(bytes).map_err(|e| CodecError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_round_trip() {
        let frame = BrokerFrame::Connect {
            client_id: "alice-01".to_string(),
            clean_session: true,
        };
        let bytes = encode(&frame).unwrap();
        assert_eq!(decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn publish_round_trip() {
        let frame = BrokerFrame::Publish {
            topic: "chatroom/alice".to_string(),
            payload: b"hello".to_vec(),
        };
        let bytes = encode(&frame).unwrap();
        assert_eq!(decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn subscribe_round_trip() {
        let frame = BrokerFrame::Subscribe {
            pattern: "chatroom/#".to_string(),
        };
        let bytes = encode(&frame).unwrap();
        assert_eq!(decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn empty_publish_payload_round_trip() {
        let frame = BrokerFrame::Publish {
            topic: "chatroom/alice".to_string(),
            payload: Vec::new(),
        };
        let bytes = encode(&frame).unwrap();
        assert_eq!(decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn decode_garbage_returns_error() {
        assert!(decode(&[0xff, 0xfe, 0xfd, 0xfc]).is_err());
    }

    #[test]
    fn decode_empty_returns_error() {
        assert!(decode(&[]).is_err());
    }
}
