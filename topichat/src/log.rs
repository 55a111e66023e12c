//! Append-only message log.
//!
//! Every message a session sends or receives lands here in arrival order.
//! The log never mutates or drops entries; rendering reads it top to
//! bottom.

use chrono::{DateTime, Utc};
use topichat_proto::identity::Identity;
use topichat_proto::payload::Payload;

/// Who produced a logged message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    /// The local user.
    Me,
    /// A remote participant, named by the sender segment of the topic.
    Peer(Identity),
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Me => write!(f, "Me"),
            Self::Peer(id) => write!(f, "{id}"),
        }
    }
}

/// One entry in the message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Who sent the message.
    pub sender: Sender,
    /// Classified message content.
    pub content: Payload,
    /// When the entry was appended locally.
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(sender: Sender, content: Payload) -> Self {
        Self {
            sender,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Renders the record as a single display line.
    ///
    /// Media payloads are summarized by kind rather than dumped as their
    /// full data URI.
    #[must_use]
    pub fn display_line(&self, timestamp_format: &str) -> String {
        let when = self.timestamp.format(timestamp_format);
        match &self.content {
            Payload::Text(text) => format!("[{when}] {}: {text}", self.sender),
            media => format!(
                "[{when}] {}: <{} {} bytes>",
                self.sender,
                media.kind_label(),
                media.as_str().len()
            ),
        }
    }
}

/// Append-only, in-memory message log.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<MessageRecord>,
}

impl MessageLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record. Entries are never reordered or removed.
    pub fn append(&mut self, record: MessageRecord) {
        self.entries.push(record);
    }

    /// Returns all entries in arrival order.
    #[must_use]
    pub fn entries(&self) -> &[MessageRecord] {
        &self.entries
    }

    /// Number of logged messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
