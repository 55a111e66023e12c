//! Chat session over a broker connection.
//!
//! A [`SessionChannel`] binds one local identity to one room: it publishes
//! on the identity's own topic, receives deliveries for the session's
//! subscription pattern, and keeps the append-only message log. Because a
//! room-wide subscription also matches the local publish topic, the
//! channel suppresses deliveries whose sender segment names the local
//! identity — the local copy is appended optimistically at send time
//! instead.
//!
//! All methods take `&self` so sending and receiving can be driven from
//! separate branches of a `select!` loop.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use topichat_proto::identity::Identity;
use topichat_proto::payload::Payload;
use topichat_proto::topic::{publish_topic, sender_segment};

use crate::broker::{BrokerConnection, BrokerError};
use crate::log::{MessageLog, MessageRecord, Sender};

/// Errors from session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session has been closed.
    #[error("session is closed")]
    Closed,

    /// The underlying broker connection failed.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// An open chat session bound to a room and a local identity.
pub struct SessionChannel<B: BrokerConnection> {
    broker: B,
    me: Identity,
    topic: String,
    log: Mutex<MessageLog>,
    closed: AtomicBool,
}

impl<B: BrokerConnection> SessionChannel<B> {
    /// Opens a session: registers the subscription pattern and derives the
    /// local publish topic from the room and identity.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Broker`] if the subscription fails.
    pub async fn open(
        broker: B,
        room: &str,
        me: Identity,
        pattern: &str,
    ) -> Result<Self, SessionError> {
        broker.subscribe(pattern).await?;
        let topic = publish_topic(room, &me);
        tracing::info!(room = %room, me = %me, pattern = %pattern, "session opened");
        Ok(Self {
            broker,
            me,
            topic,
            log: Mutex::new(MessageLog::new()),
            closed: AtomicBool::new(false),
        })
    }

    /// The local identity this session publishes as.
    #[must_use]
    pub fn me(&self) -> &Identity {
        &self.me
    }

    /// The topic this session publishes on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// A copy of the message log, in arrival order.
    pub async fn log_snapshot(&self) -> Vec<MessageRecord> {
        self.log.lock().await.entries().to_vec()
    }

    /// Whether the session can still send and receive.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.broker.is_connected()
    }

    /// Publishes raw content on the session's topic.
    ///
    /// Empty or whitespace-only input is a no-op and returns `Ok(None)`.
    /// On success the local
    /// copy is appended to the log immediately, without waiting for the
    /// broker to echo it back, and the appended record is returned.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Closed`] if the session is closed.
    /// - [`SessionError::Broker`] if the publish fails; nothing is logged.
    pub async fn send(&self, raw: &str) -> Result<Option<MessageRecord>, SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        if raw.trim().is_empty() {
            return Ok(None);
        }

        self.broker.publish(&self.topic, raw.as_bytes()).await?;

        let record = MessageRecord::new(Sender::Me, Payload::classify(raw));
        self.log.lock().await.append(record.clone());
        Ok(Some(record))
    }

    /// Receives the next message from a remote participant.
    ///
    /// Deliveries published by the local identity are suppressed, since
    /// their log entry was already made at send time. Deliveries on
    /// malformed topics are skipped with a warning. Payload bytes are
    /// decoded leniently; invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Closed`] if the session is closed.
    /// - [`SessionError::Broker`] when the connection is lost.
    pub async fn recv_one(&self) -> Result<MessageRecord, SessionError> {
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(SessionError::Closed);
            }
            let delivery = self.broker.recv().await?;

            let Some(segment) = sender_segment(&delivery.topic) else {
                tracing::warn!(topic = %delivery.topic, "delivery without sender segment, skipping");
                continue;
            };
            if segment == self.me.as_str() {
                tracing::trace!(topic = %delivery.topic, "suppressing self echo");
                continue;
            }
            let peer = match segment.parse::<Identity>() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(topic = %delivery.topic, err = %e, "invalid sender segment, skipping");
                    continue;
                }
            };

            let text = String::from_utf8_lossy(&delivery.payload);
            let record = MessageRecord::new(Sender::Peer(peer), Payload::classify(&text));
            self.log.lock().await.append(record.clone());
            return Ok(record);
        }
    }

    /// Closes the session and disconnects from the broker. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.broker.disconnect().await;
        tracing::info!(me = %self.me, "session closed");
    }
}
