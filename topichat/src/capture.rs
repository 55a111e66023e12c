//! Audio capture abstraction.
//!
//! The recording flow only needs a source of raw audio chunks, so capture
//! hardware sits behind the [`AudioInput`] trait. [`ScriptedInput`] plays
//! back canned chunks for tests; [`NoCapture`] stands in on platforms
//! without a usable input device.

use tokio::sync::mpsc;

/// Errors from starting or running audio capture.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// No capture device is available in this environment.
    #[error("audio capture is not supported here")]
    Unsupported,

    /// The capture device failed while recording.
    #[error("capture device failed: {0}")]
    DeviceFailed(String),
}

/// Source of raw audio chunks for a recording.
///
/// `start` hands back the receiving end of a chunk channel; the channel
/// closes after `stop` has been called and the final chunk delivered.
pub trait AudioInput: Send {
    /// Begin capturing audio.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Unsupported`] when no device is available.
    fn start(&mut self) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, CaptureError>;

    /// Stop capturing. Closes the chunk channel. Safe to call when not
    /// capturing.
    fn stop(&mut self);
}

/// Test input that emits a fixed list of chunks.
///
/// All scripted chunks are pushed into the channel at `start`; the channel
/// stays open until `stop` so a recording can span the caller's own
/// timing.
pub struct ScriptedInput {
    chunks: Vec<Vec<u8>>,
    live_sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl ScriptedInput {
    /// Creates an input that will emit the given chunks in order.
    #[must_use]
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            live_sender: None,
        }
    }

    /// Creates an input that emits nothing before it is stopped.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }
}

impl AudioInput for ScriptedInput {
    fn start(&mut self) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, CaptureError> {
        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in self.chunks.drain(..) {
            let _ = tx.send(chunk);
        }
        self.live_sender = Some(tx);
        Ok(rx)
    }

    fn stop(&mut self) {
        self.live_sender = None;
    }
}

/// Input for environments without audio hardware. Always fails to start.
#[derive(Debug, Default)]
pub struct NoCapture;

impl AudioInput for NoCapture {
    fn start(&mut self) -> Result<mpsc::UnboundedReceiver<Vec<u8>>, CaptureError> {
        Err(CaptureError::Unsupported)
    }

    fn stop(&mut self) {}
}
