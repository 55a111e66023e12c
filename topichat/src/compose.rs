//! Outgoing message composition.
//!
//! The [`Composer`] stages at most one pending media attachment alongside
//! whatever text the user is typing. Attaching a file or finishing a
//! recording replaces the previous pending attachment; sending or
//! clearing empties it.

use std::path::{Path, PathBuf};

use topichat_proto::payload::{MediaKind, Payload, encode_media};

/// Errors from staging an attachment.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// The file extension maps to no supported media kind.
    #[error("unsupported attachment type: {0}")]
    UnsupportedFile(PathBuf),

    /// Reading the file from disk failed.
    #[error("failed to read attachment {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Staging area for the next outgoing message.
#[derive(Debug, Default)]
pub struct Composer {
    pending: Option<Payload>,
}

impl Composer {
    /// Creates an empty composer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a file from disk and stages it as the pending attachment.
    ///
    /// The media kind and subtype come from the file extension. Any
    /// previously pending attachment is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::UnsupportedFile`] for unknown extensions and
    /// [`ComposeError::ReadFile`] if the file cannot be read.
    pub fn attach_file(&mut self, path: &Path) -> Result<(), ComposeError> {
        let (kind, subtype) =
            media_kind_for(path).ok_or_else(|| ComposeError::UnsupportedFile(path.to_path_buf()))?;
        let bytes = std::fs::read(path).map_err(|e| ComposeError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let payload = encode_media(kind, subtype, &bytes);
        tracing::debug!(path = %path.display(), kind = payload.kind_label(), "attachment staged");
        self.pending = Some(payload);
        Ok(())
    }

    /// Stages an already-encoded media payload (e.g. a finished recording).
    pub fn stage(&mut self, payload: Payload) {
        self.pending = Some(payload);
    }

    /// Returns the pending attachment, if any, without consuming it.
    #[must_use]
    pub fn preview(&self) -> Option<&Payload> {
        self.pending.as_ref()
    }

    /// Takes the pending attachment, leaving the composer empty.
    pub fn take(&mut self) -> Option<Payload> {
        self.pending.take()
    }

    /// Discards any pending attachment.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}

/// Maps a file extension to a media kind and MIME subtype.
///
/// Unknown extensions yield `None`; the caller rejects the attachment
/// instead of guessing.
fn media_kind_for(path: &Path) -> Option<(MediaKind, &'static str)> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some((MediaKind::Image, "png")),
        "jpg" | "jpeg" => Some((MediaKind::Image, "jpeg")),
        "gif" => Some((MediaKind::Image, "gif")),
        "webp" => Some((MediaKind::Image, "webp")),
        "mp3" => Some((MediaKind::Audio, "mp3")),
        "wav" => Some((MediaKind::Audio, "wav")),
        "ogg" => Some((MediaKind::Audio, "ogg")),
        "m4a" => Some((MediaKind::Audio, "mp4")),
        "webm" => Some((MediaKind::Audio, "webm")),
        _ => None,
    }
}
