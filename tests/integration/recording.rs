//! Integration tests for the recording flow: capture, finalize, stage,
//! and publish over the loopback hub.

use topichat::broker::loopback::{LoopbackBroker, LoopbackHub};
use topichat::capture::{CaptureError, NoCapture, ScriptedInput};
use topichat::compose::Composer;
use topichat::record::{RecordError, RecordingController};
use topichat::session::SessionChannel;
use topichat_proto::identity::Identity;
use topichat_proto::payload::{MediaKind, Payload, encode_media};
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
async fn recorded_audio_reaches_the_peer() {
    let hub = LoopbackHub::new();
    let alice = join(&hub, "alice").await;
    let bob = join(&hub, "bob").await;

    let mut recorder = RecordingController::new();
    recorder
        .start(Box::new(ScriptedInput::new(vec![
            b"chunk1".to_vec(),
            b"chunk2".to_vec(),
        ])))
        .unwrap();
    let payload = recorder.stop().await.unwrap();

    let mut composer = Composer::new();
    composer.stage(payload);
    let staged = composer.take().unwrap();
    alice.send(staged.as_str()).await.unwrap();

    let record = bob.recv_one().await.unwrap();
    let expected = encode_media(MediaKind::Audio, "mp3", b"chunk1chunk2");
    assert_eq!(record.content, expected);
    assert!(matches!(record.content, Payload::Audio(_)));
}

#[tokio::test]
async fn empty_recording_still_publishes_valid_audio() {
    let hub = LoopbackHub::new();
    let alice = join(&hub, "alice").await;
    let bob = join(&hub, "bob").await;

    let mut recorder = RecordingController::new();
    recorder.start(Box::new(ScriptedInput::silent())).unwrap();
    let payload = recorder.stop().await.unwrap();
    assert_eq!(payload.as_str(), "data:audio/mp3;base64,");

    alice.send(payload.as_str()).await.unwrap();
    let record = bob.recv_one().await.unwrap();
    assert!(matches!(record.content, Payload::Audio(_)));
}

#[tokio::test]
async fn restarting_keeps_only_the_second_take() {
    let mut recorder = RecordingController::new();
    recorder
        .start(Box::new(ScriptedInput::new(vec![b"first take".to_vec()])))
        .unwrap();
    recorder
        .start(Box::new(ScriptedInput::new(vec![b"second take".to_vec()])))
        .unwrap();
    assert!(recorder.is_recording());

    let payload = recorder.stop().await.unwrap();
    assert_eq!(payload, encode_media(MediaKind::Audio, "mp3", b"second take"));
    assert!(!recorder.is_recording());
}

#[tokio::test]
async fn unsupported_capture_never_enters_recording_state() {
    let mut recorder = RecordingController::new();
    let result = recorder.start(Box::new(NoCapture));
    assert!(matches!(
        result,
        Err(RecordError::Capture(CaptureError::Unsupported))
    ));
    assert!(!recorder.is_recording());
    assert!(matches!(
        recorder.stop().await,
        Err(RecordError::NotRecording)
    ));
}

#[tokio::test]
async fn stopped_recording_replaces_a_staged_attachment() {
    let mut composer = Composer::new();
    composer.stage(Payload::classify("data:image/png;base64,QUJD"));

    let mut recorder = RecordingController::new();
    recorder
        .start(Box::new(ScriptedInput::new(vec![b"voice".to_vec()])))
        .unwrap();
    composer.stage(recorder.stop().await.unwrap());

    let staged = composer.take().unwrap();
    assert!(matches!(staged, Payload::Audio(_)));
}
