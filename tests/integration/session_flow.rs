//! Integration tests for the chat session over the loopback hub.
//!
//! Covers the end-to-end room flow without a network: fan-out to several
//! participants, self-echo suppression, optimistic local logging, media
//! classification, and session shutdown.

use std::time::Duration;

use topichat::broker::BrokerConnection;
use topichat::broker::loopback::{LoopbackBroker, LoopbackHub};
use topichat::compose::Composer;
use topichat::log::Sender;
use topichat::session::{SessionChannel, SessionError};
use topichat_proto::identity::Identity;
use topichat_proto::payload::Payload;
use topichat_proto::topic::{SubscribeScope, subscribe_pattern};

const ROOM: &str = "chatroom";

async fn join(hub: &LoopbackHub, name: &str) -> SessionChannel<LoopbackBroker> {
    let me: Identity = name.parse().unwrap();
    let pattern = subscribe_pattern(ROOM, &me, SubscribeScope::Room);
    SessionChannel::open(hub.connect(), ROOM, me, &pattern)
        .await
        .expect("failed to open session")
}

#[tokio::test]
async fn room_fans_out_to_every_other_participant() {
    let hub = LoopbackHub::new();
    let alice = join(&hub, "alice").await;
    let bob = join(&hub, "bob").await;
    let carol = join(&hub, "carol").await;

    alice.send("hello room").await.unwrap();

    for session in [&bob, &carol] {
        let record = tokio::time::timeout(Duration::from_secs(5), session.recv_one())
            .await
            .expect("recv timed out")
            .unwrap();
        assert_eq!(record.sender, Sender::Peer("alice".parse().unwrap()));
        assert_eq!(record.content.as_str(), "hello room");
    }
}

#[tokio::test]
async fn conversation_log_interleaves_in_arrival_order() {
    let hub = LoopbackHub::new();
    let alice = join(&hub, "alice").await;
    let bob = join(&hub, "bob").await;

    alice.send("one").await.unwrap();
    bob.recv_one().await.unwrap();
    bob.send("two").await.unwrap();
    alice.recv_one().await.unwrap();
    alice.send("three").await.unwrap();
    bob.recv_one().await.unwrap();

    let log = alice.log_snapshot().await;
    let seen: Vec<(String, String)> = log
        .iter()
        .map(|r| (r.sender.to_string(), r.content.as_str().to_string()))
        .collect();
    assert_eq!(
        seen,
        [
            ("Me".to_string(), "one".to_string()),
            ("bob".to_string(), "two".to_string()),
            ("Me".to_string(), "three".to_string()),
        ]
    );
}

#[tokio::test]
async fn own_messages_never_arrive_twice() {
    let hub = LoopbackHub::new();
    let alice = join(&hub, "alice").await;
    let bob = join(&hub, "bob").await;

    // Every publish is echoed to alice by her room subscription. After
    // sending three messages, the only remote message she receives is
    // bob's, and her log holds exactly four entries.
    alice.send("a1").await.unwrap();
    alice.send("a2").await.unwrap();
    alice.send("a3").await.unwrap();
    bob.send("b1").await.unwrap();

    let record = tokio::time::timeout(Duration::from_secs(5), alice.recv_one())
        .await
        .expect("recv timed out")
        .unwrap();
    assert_eq!(record.content.as_str(), "b1");

    let log = alice.log_snapshot().await;
    assert_eq!(log.len(), 4);
    assert_eq!(log.iter().filter(|r| r.sender == Sender::Me).count(), 3);
}

#[tokio::test]
async fn staged_attachment_sends_as_media() {
    let hub = LoopbackHub::new();
    let alice = join(&hub, "alice").await;
    let bob = join(&hub, "bob").await;

    let path = std::env::temp_dir().join("topichat-session-flow.png");
    std::fs::write(&path, b"png-ish bytes").unwrap();

    let mut composer = Composer::new();
    composer.attach_file(&path).unwrap();
    let staged = composer.take().unwrap();
    alice.send(staged.as_str()).await.unwrap();

    let record = bob.recv_one().await.unwrap();
    assert!(matches!(record.content, Payload::Image(_)));
    assert_eq!(record.content.as_str(), staged.as_str());

    // Sending consumed the staged attachment.
    assert!(composer.take().is_none());
    std::fs::remove_file(&path).ok();
}

#[tokio::test]
async fn closed_session_stops_receiving() {
    let hub = LoopbackHub::new();
    let alice = join(&hub, "alice").await;
    let bob = join(&hub, "bob").await;

    bob.close().await;
    alice.send("into the void").await.unwrap();

    assert!(matches!(bob.recv_one().await, Err(SessionError::Closed)));
    assert!(matches!(bob.send("late").await, Err(SessionError::Closed)));
}

#[tokio::test]
async fn raw_publisher_without_subscription_still_reaches_room() {
    let hub = LoopbackHub::new();
    let bob = join(&hub, "bob").await;

    // A bare broker endpoint that never subscribed can still publish.
    let raw = hub.connect();
    raw.publish("chatroom/sensor", b"data:image/png;base64,QUJD")
        .await
        .unwrap();

    let record = bob.recv_one().await.unwrap();
    assert_eq!(record.sender, Sender::Peer("sensor".parse().unwrap()));
    assert!(matches!(record.content, Payload::Image(_)));
}
