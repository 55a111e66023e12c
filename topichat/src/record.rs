//! Voice recording controller.
//!
//! Drives one recording at a time over an [`AudioInput`]: a collector task
//! accumulates chunks while a ticker task advances the visible elapsed
//! counter once a second. Stopping finalizes the collected audio into a
//! base64 data-URI payload; starting while a recording is in progress
//! preempts and discards the old one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use topichat_proto::payload::{MediaKind, Payload, encode_media};

use crate::capture::{AudioInput, CaptureError};

/// MIME subtype applied to finalized recordings.
const RECORDING_SUBTYPE: &str = "mp3";

/// Errors from the recording controller.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// `stop` was called with no recording in progress.
    #[error("no recording in progress")]
    NotRecording,

    /// Starting the capture device failed.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The chunk collector task failed to finish.
    #[error("failed to finalize recording: {0}")]
    Finalize(String),
}

/// Tasks and state backing one in-progress recording.
struct ActiveRecording {
    input: Box<dyn AudioInput>,
    collector: tokio::task::JoinHandle<Vec<u8>>,
    ticker: tokio::task::JoinHandle<()>,
    elapsed_secs: Arc<AtomicU64>,
}

/// State machine holding at most one in-progress recording.
#[derive(Default)]
pub struct RecordingController {
    active: Option<ActiveRecording>,
}

impl RecordingController {
    /// Creates an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a recording is currently in progress.
    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Seconds elapsed in the current recording, or 0 when idle.
    #[must_use]
    pub fn elapsed_secs(&self) -> u64 {
        self.active
            .as_ref()
            .map_or(0, |a| a.elapsed_secs.load(Ordering::Relaxed))
    }

    /// Starts recording from the given input.
    ///
    /// If a recording is already in progress it is stopped and its audio
    /// discarded before the new one begins.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Capture`] if the input cannot start; the
    /// controller stays idle in that case.
    pub fn start(&mut self, mut input: Box<dyn AudioInput>) -> Result<(), RecordError> {
        if let Some(old) = self.active.take() {
            tracing::info!("recording already in progress, discarding it");
            discard(old);
        }

        let mut chunks = input.start()?;

        let collector = tokio::spawn(async move {
            let mut audio = Vec::new();
            while let Some(chunk) = chunks.recv().await {
                audio.extend_from_slice(&chunk);
            }
            audio
        });

        let elapsed_secs = Arc::new(AtomicU64::new(0));
        let tick_counter = Arc::clone(&elapsed_secs);
        let ticker = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                tick_counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        self.active = Some(ActiveRecording {
            input,
            collector,
            ticker,
            elapsed_secs,
        });
        tracing::info!("recording started");
        Ok(())
    }

    /// Stops the current recording and returns the finalized audio payload.
    ///
    /// The collected chunks are concatenated in arrival order and encoded
    /// as a base64 audio data URI. A recording stopped before any chunk
    /// arrived yields a valid, empty audio payload.
    ///
    /// # Errors
    ///
    /// - [`RecordError::NotRecording`] if no recording is in progress.
    /// - [`RecordError::Finalize`] if the collector task failed.
    pub async fn stop(&mut self) -> Result<Payload, RecordError> {
        let mut active = self.active.take().ok_or(RecordError::NotRecording)?;

        active.ticker.abort();
        // Closing the input closes the chunk channel, so the collector
        // drains what arrived and finishes.
        active.input.stop();
        let audio = active
            .collector
            .await
            .map_err(|e| RecordError::Finalize(e.to_string()))?;

        tracing::info!(bytes = audio.len(), "recording stopped");
        Ok(encode_media(MediaKind::Audio, RECORDING_SUBTYPE, &audio))
    }

    /// Stops and discards the current recording, if any.
    pub fn cancel(&mut self) {
        if let Some(old) = self.active.take() {
            tracing::info!("recording cancelled");
            discard(old);
        }
    }
}

/// Tears down a recording without keeping its audio.
fn discard(mut recording: ActiveRecording) {
    recording.ticker.abort();
    recording.collector.abort();
    recording.input.stop();
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        self.cancel();
    }
}
