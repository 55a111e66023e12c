//! Integration tests for the WebSocket broker client against an
//! in-process `topichat-broker` server.
//!
//! Validates the full wire path: connect handshake, subscription
//! acknowledgment, topic-pattern routing, self-echo suppression at the
//! session layer, and clean-session semantics across reconnects.

use std::time::Duration;

use topichat::broker::ws::WsBroker;
use topichat::broker::{BrokerConnection, BrokerError, ConnectOptions};
use topichat::log::Sender;
use topichat::session::SessionChannel;
use topichat_proto::identity::Identity;
use topichat_proto::topic::{SubscribeScope, subscribe_pattern};

const ROOM: &str = "chatroom";

/// Start the broker in-process and return a ws:// URL.
async fn start_broker() -> (String, tokio::task::JoinHandle<()>) {
    let (addr, handle) = topichat_broker::broker::start_server("127.0.0.1:0")
        .await
        .expect("failed to start broker");
    let url = format!("ws://{addr}/ws");
    (url, handle)
}

async fn join(url: &str, name: &str) -> SessionChannel<WsBroker> {
    let me: Identity = name.parse().unwrap();
    let broker = WsBroker::connect(url, &ConnectOptions::clean(format!("{name}-test")))
        .await
        .expect("failed to connect");
    let pattern = subscribe_pattern(ROOM, &me, SubscribeScope::Room);
    SessionChannel::open(broker, ROOM, me, &pattern)
        .await
        .expect("failed to open session")
}

#[tokio::test]
async fn text_round_trips_between_two_clients() {
    let (url, _handle) = start_broker().await;
    let alice = join(&url, "alice").await;
    let bob = join(&url, "bob").await;

    alice.send("over the wire").await.unwrap();

    let record = tokio::time::timeout(Duration::from_secs(5), bob.recv_one())
        .await
        .expect("recv timed out")
        .unwrap();
    assert_eq!(record.sender, Sender::Peer("alice".parse().unwrap()));
    assert_eq!(record.content.as_str(), "over the wire");
}

#[tokio::test]
async fn broker_echo_is_suppressed_by_the_session() {
    let (url, _handle) = start_broker().await;
    let alice = join(&url, "alice").await;
    let bob = join(&url, "bob").await;

    // The broker delivers alice's own publish back to her room
    // subscription; the session must swallow it.
    alice.send("mine").await.unwrap();
    bob.send("yours").await.unwrap();

    let record = tokio::time::timeout(Duration::from_secs(5), alice.recv_one())
        .await
        .expect("recv timed out")
        .unwrap();
    assert_eq!(record.sender, Sender::Peer("bob".parse().unwrap()));
    assert_eq!(record.content.as_str(), "yours");
}

#[tokio::test]
async fn messages_arrive_in_publish_order() {
    let (url, _handle) = start_broker().await;
    let alice = join(&url, "alice").await;
    let bob = join(&url, "bob").await;

    for i in 0..10 {
        alice.send(&format!("msg-{i}")).await.unwrap();
    }

    for i in 0..10 {
        let record = tokio::time::timeout(Duration::from_secs(5), bob.recv_one())
            .await
            .expect("recv timed out")
            .unwrap();
        assert_eq!(record.content.as_str(), format!("msg-{i}"));
    }
}

#[tokio::test]
async fn clean_session_connect_starts_fresh() {
    let (url, _handle) = start_broker().await;

    let first = WsBroker::connect(&url, &ConnectOptions::clean("carol-1"))
        .await
        .unwrap();
    assert!(!first.session_present());
    first.subscribe("chatroom/#").await.unwrap();
    first.disconnect().await;

    tokio::time::sleep(Duration::from_millis(50)).await;

    // Same client id, clean_session again: the stored subscription is gone.
    let second = WsBroker::connect(&url, &ConnectOptions::clean("carol-1"))
        .await
        .unwrap();
    assert!(!second.session_present());
}

#[tokio::test]
async fn persistent_session_resumes_subscription_state() {
    let (url, _handle) = start_broker().await;
    let options = ConnectOptions {
        client_id: "dave-1".to_string(),
        clean_session: false,
        connect_timeout: Duration::from_secs(10),
    };

    let first = WsBroker::connect(&url, &options).await.unwrap();
    assert!(!first.session_present());
    first.subscribe("chatroom/#").await.unwrap();
    first.disconnect().await;

    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = WsBroker::connect(&url, &options).await.unwrap();
    assert!(second.session_present());
}

#[tokio::test]
async fn connect_to_unreachable_broker_fails() {
    // A port from the reserved range with nothing listening.
    let result = WsBroker::connect(
        "ws://127.0.0.1:1/ws",
        &ConnectOptions {
            client_id: "nobody".to_string(),
            clean_session: true,
            connect_timeout: Duration::from_secs(2),
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(BrokerError::ConnectionFailed(_) | BrokerError::Timeout)
    ));
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let (url, _handle) = start_broker().await;
    let broker = WsBroker::connect(&url, &ConnectOptions::clean("erin-1"))
        .await
        .unwrap();

    broker.disconnect().await;
    broker.disconnect().await;
    assert!(!broker.is_connected());
    assert!(matches!(
        broker.publish("chatroom/erin", b"late").await,
        Err(BrokerError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn media_payload_survives_the_wire() {
    let (url, _handle) = start_broker().await;
    let alice = join(&url, "alice").await;
    let bob = join(&url, "bob").await;

    let uri = "data:audio/mp3;base64,c29tZSBhdWRpbw==";
    alice.send(uri).await.unwrap();

    let record = tokio::time::timeout(Duration::from_secs(5), bob.recv_one())
        .await
        .expect("recv timed out")
        .unwrap();
    assert_eq!(record.content.kind_label(), "audio");
    assert_eq!(record.content.as_str(), uri);
}
