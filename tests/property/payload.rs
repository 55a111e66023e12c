//! Property-based tests for the protocol crate.
//!
//! Uses proptest to verify:
//! 1. `Payload::classify` is total and loss-free for any string.
//! 2. Encoded media always classifies back to its own kind.
//! 3. Identity parsing accepts exactly the strings with no reserved
//!    characters and a non-empty trimmed form.
//! 4. Topic patterns derived from a topic match that topic.
//! 5. Broker frames survive encode → decode, and arbitrary bytes never
//!    panic the decoder.

use proptest::prelude::*;
use topichat_proto::frame::{self, BrokerFrame};
use topichat_proto::identity::Identity;
use topichat_proto::payload::{MediaKind, Payload, encode_media};
use topichat_proto::topic::{SubscribeScope, pattern_matches, publish_topic, subscribe_pattern};

// --- Strategies ---

/// Strategy for valid identity segments.
fn arb_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,32}"
}

/// Strategy for arbitrary media kinds.
fn arb_media_kind() -> impl Strategy<Value = MediaKind> {
    prop_oneof![Just(MediaKind::Image), Just(MediaKind::Audio)]
}

/// Strategy for arbitrary broker frames.
fn arb_frame() -> impl Strategy<Value = BrokerFrame> {
    prop_oneof![
        (".{0,64}", any::<bool>()).prop_map(|(client_id, clean_session)| {
            BrokerFrame::Connect {
                client_id,
                clean_session,
            }
        }),
        any::<bool>().prop_map(|session_present| BrokerFrame::ConnAck { session_present }),
        ".{0,64}".prop_map(|pattern| BrokerFrame::Subscribe { pattern }),
        ".{0,64}".prop_map(|pattern| BrokerFrame::SubAck { pattern }),
        (".{0,64}", prop::collection::vec(any::<u8>(), 0..512)).prop_map(|(topic, payload)| {
            BrokerFrame::Publish { topic, payload }
        }),
        ".{0,64}".prop_map(|reason| BrokerFrame::Error { reason }),
    ]
}

// --- Properties ---

proptest! {
    #[test]
    fn classify_is_total_and_loss_free(raw in ".{0,2048}") {
        let payload = Payload::classify(&raw);
        prop_assert_eq!(payload.as_str(), raw.as_str());
    }

    #[test]
    fn classify_without_marker_is_text(raw in "[a-zA-Z0-9 ]{0,256}") {
        let payload = Payload::classify(&raw);
        prop_assert!(matches!(payload, Payload::Text(_)));
    }

    #[test]
    fn encoded_media_classifies_to_its_kind(
        kind in arb_media_kind(),
        subtype in "[a-z0-9]{1,8}",
        bytes in prop::collection::vec(any::<u8>(), 0..1024),
    ) {
        let payload = encode_media(kind, &subtype, &bytes);
        let reclassified = Payload::classify(payload.as_str());
        prop_assert_eq!(reclassified.kind_label(), payload.kind_label());
    }

    #[test]
    fn valid_names_parse(name in arb_name()) {
        let id = Identity::parse(&name).expect("name should parse");
        prop_assert_eq!(id.as_str(), name.as_str());
    }

    #[test]
    fn names_with_reserved_chars_rejected(
        prefix in "[a-z]{0,8}",
        reserved in prop_oneof![Just('/'), Just('#')],
        suffix in "[a-z]{0,8}",
    ) {
        let raw = format!("{prefix}{reserved}{suffix}");
        prop_assert!(Identity::parse(&raw).is_err());
    }

    #[test]
    fn identity_parse_never_panics(raw in ".{0,128}") {
        let _ = Identity::parse(&raw);
    }

    #[test]
    fn room_pattern_matches_any_member_topic(
        room in "[a-z]{1,16}",
        member in arb_name(),
    ) {
        let id = Identity::parse(&member).expect("name should parse");
        let topic = publish_topic(&room, &id);
        let pattern = subscribe_pattern(&room, &id, SubscribeScope::Room);
        prop_assert!(pattern_matches(&pattern, &topic));
    }

    #[test]
    fn peer_pattern_matches_only_that_peer(
        room in "[a-z]{1,16}",
        peer in arb_name(),
        other in arb_name(),
    ) {
        let peer_id = Identity::parse(&peer).expect("name should parse");
        let other_id = Identity::parse(&other).expect("name should parse");
        let pattern = subscribe_pattern(&room, &peer_id, SubscribeScope::Peer);

        prop_assert!(pattern_matches(&pattern, &publish_topic(&room, &peer_id)));
        let other_matches = pattern_matches(&pattern, &publish_topic(&room, &other_id));
        prop_assert_eq!(other_matches, peer == other);
    }

    #[test]
    fn frames_round_trip(original in arb_frame()) {
        let bytes = frame::encode(&original).expect("encode should succeed");
        let decoded = frame::decode(&bytes).expect("decode should succeed");
        prop_assert_eq!(decoded, original);
    }

    #[test]
    fn decode_never_panics_on_garbage(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = frame::decode(&bytes);
    }
}
