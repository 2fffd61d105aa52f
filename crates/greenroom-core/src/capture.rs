//! Device stream acquisition and release.
//!
//! The [`CaptureController`] is the only component that may hold a device
//! stream. It acquires one through a [`CaptureBackend`], attaches it to a
//! preview sink while live, and guarantees release on every exit path -
//! explicit [`CaptureController::release`], orchestrator teardown, or drop.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::clip::RecordingChunk;
use crate::error::SessionError;

/// Which tracks a capture request asks for.
#[derive(Debug, Clone)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
    /// Specific input device (None = system default).
    pub device_name: Option<String>,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: false,
            device_name: None,
        }
    }
}

/// Parameters for one encoding run over a live stream.
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Negotiated media type. None lets the backend pick its default rather
    /// than failing the run.
    pub mime_type: Option<String>,
    /// Cadence at which encoded fragments are emitted.
    pub timeslice: Duration,
    /// Bitrate ceiling; backends clamp to what their codec supports.
    pub bits_per_second: u32,
}

/// Access to the platform's capture capability.
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Request device access. On failure no stream may be held anywhere.
    async fn acquire(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, SessionError>;

    /// Capability check used by format negotiation.
    fn is_format_supported(&self, mime_type: &str) -> bool;
}

/// A live device stream. Exclusively owned by the [`CaptureController`];
/// no other component may touch its tracks directly.
pub trait MediaStream: Send {
    /// Begin encoding the stream into fragments at the requested cadence.
    fn start_encoder(
        &mut self,
        options: &EncodeOptions,
    ) -> Result<Box<dyn RunningEncoder>, SessionError>;

    /// Stop every track and release the underlying device. Idempotent.
    fn stop_tracks(&mut self);

    /// Whether the tracks are still running.
    fn is_live(&self) -> bool;
}

/// An in-progress encoding run over a live stream.
#[async_trait]
pub trait RunningEncoder: Send {
    /// Media type of the fragments actually being produced.
    fn mime_type(&self) -> &str;

    /// Receive the next fragment. Returns None once the run has been
    /// finalized and every buffered fragment was drained.
    ///
    /// Implementations must be cancel-safe: dropping the future before it
    /// resolves must not lose a fragment. Thin channel `recv` wrappers are.
    async fn next_chunk(&mut self) -> Option<RecordingChunk>;

    /// Ask the encoder to flush and close the fragment stream.
    fn finalize(&mut self);
}

/// Where the live stream is rendered while capturing.
pub trait PreviewSink: Send + Sync {
    fn attach(&self, stream: &dyn MediaStream);
    fn detach(&self);
}

/// Preview sink that renders nothing. Used by headless callers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPreview;

impl PreviewSink for NullPreview {
    fn attach(&self, _stream: &dyn MediaStream) {}
    fn detach(&self) {}
}

/// Owns the device stream lifecycle: acquire, preview attachment, release.
pub struct CaptureController {
    backend: Arc<dyn CaptureBackend>,
    preview: Arc<dyn PreviewSink>,
    stream: Option<Box<dyn MediaStream>>,
}

impl CaptureController {
    pub fn new(backend: Arc<dyn CaptureBackend>, preview: Arc<dyn PreviewSink>) -> Self {
        Self {
            backend,
            preview,
            stream: None,
        }
    }

    /// Request camera/microphone access and attach the preview.
    ///
    /// A request while a stream is already held is a no-op. On denial or
    /// platform absence the controller holds no stream.
    pub async fn acquire(&mut self, constraints: &MediaConstraints) -> Result<(), SessionError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = self.backend.acquire(constraints).await?;
        self.preview.attach(stream.as_ref());
        self.stream = Some(stream);
        Ok(())
    }

    /// Stop every track and detach the preview. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            self.preview.detach();
        }
    }

    pub fn has_active_stream(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.is_live())
    }

    /// Exclusive access to the live stream, e.g. for starting an encoder.
    pub fn stream_mut(&mut self) -> Option<&mut (dyn MediaStream + 'static)> {
        self.stream.as_deref_mut()
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        // Leaking the device lock keeps the mic light on; release always runs.
        self.release();
    }
}
