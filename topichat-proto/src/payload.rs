//! Chat payloads and the data-URI codec.
//!
//! The wire carries no separate content-type field: a payload is a single
//! string, and its kind is recovered purely by prefix inspection. Binary
//! media is sent as a data URI (`data:<mime>;base64,<bytes>`), whose leading
//! `data:image` / `data:audio` marker doubles as the type tag. The markers
//! are part of the wire contract, not an implementation detail.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// Prefix marking an image payload. A text payload that happens to start
/// with this marker is indistinguishable from an image on the wire; that
/// ambiguity is inherited from the protocol's no-metadata design.
pub const IMAGE_MARKER: &str = "data:image";

/// Prefix marking an audio payload.
pub const AUDIO_MARKER: &str = "data:audio";

/// Media kinds the codec can encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Still image content.
    Image,
    /// Audio content.
    Audio,
}

impl MediaKind {
    /// Returns the top-level MIME type for this kind.
    #[must_use]
    pub const fn mime_prefix(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

/// The logical content of one chat message.
///
/// Each variant carries the exact string sent over the wire: plain text for
/// [`Payload::Text`], a complete data URI for the media variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Plain text.
    Text(String),
    /// An image as a `data:image/...` URI.
    Image(String),
    /// An audio clip as a `data:audio/...` URI.
    Audio(String),
}

impl Payload {
    /// Classifies an arbitrary payload string by marker prefix.
    ///
    /// Total over all strings: two prefix comparisons, defaulting to
    /// [`Payload::Text`] when no marker matches. Malformed or unknown
    /// content therefore degrades to text display instead of failing.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with(IMAGE_MARKER) {
            Self::Image(raw.to_string())
        } else if raw.starts_with(AUDIO_MARKER) {
            Self::Audio(raw.to_string())
        } else {
            Self::Text(raw.to_string())
        }
    }

    /// Returns the wire string for this payload.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Image(s) | Self::Audio(s) => s,
        }
    }

    /// Short human-readable kind label, for logs and display.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Image(_) => "image",
            Self::Audio(_) => "audio",
        }
    }
}

/// Encodes raw media bytes as a self-describing data-URI payload.
///
/// `subtype` is the MIME subtype (`png`, `mp3`, ...). Zero-length input is
/// valid and produces a URI with an empty base64 body — a perceptually
/// silent but well-formed payload.
#[must_use]
pub fn encode_media(kind: MediaKind, subtype: &str, bytes: &[u8]) -> Payload {
    let uri = format!(
        "data:{}/{};base64,{}",
        kind.mime_prefix(),
        subtype,
        BASE64.encode(bytes)
    );
    match kind {
        MediaKind::Image => Payload::Image(uri),
        MediaKind::Audio => Payload::Audio(uri),
    }
}
