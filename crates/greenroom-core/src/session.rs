//! Session orchestration: one user-visible flow from capture to terminal
//! status.
//!
//! The orchestrator is the single source of truth for user-visible state and
//! the only component allowed to start a new capture while an old one is
//! releasing. Everything it owns is torn down synchronously: recorder task,
//! poll task, device stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::api::{InterviewRecord, InterviewService, InterviewStatus};
use crate::capture::{
    CaptureBackend, CaptureController, MediaConstraints, NullPreview, PreviewSink,
};
use crate::clip::Clip;
use crate::error::SessionError;
use crate::poll::{PollOutcome, PollerConfig, StatusPoller};
use crate::probe::ClipProbe;
use crate::recorder::format::negotiate_format;
use crate::recorder::{RecorderConfig, RecorderEngine, RecorderState};
use crate::upload::UploadDispatcher;
use crate::validate::{MIN_CLIP_DURATION, validate_clip};

/// User-visible session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Capturing,
    Recorded,
    Validating,
    Uploading,
    Queued,
    Complete,
    Failed,
}

/// How a queued session ultimately resolved.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// Processing finished; feedback is attached to the record.
    Complete(InterviewRecord),
    /// The backend reported terminal failure.
    ProcessingFailed(InterviewRecord),
    /// The polling budget ran out before a terminal status.
    TimedOut,
}

/// Tunables for one session.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub constraints: MediaConstraints,
    pub recorder: RecorderConfig,
    pub poller: PollerConfig,
    pub min_clip_duration: Option<Duration>,
}

impl SessionConfig {
    fn clip_floor(&self) -> Duration {
        self.min_clip_duration.unwrap_or(MIN_CLIP_DURATION)
    }
}

/// One recording-and-upload flow for one interview.
pub struct InterviewSession {
    interview_id: String,
    config: SessionConfig,
    backend: Arc<dyn CaptureBackend>,
    probe: Arc<dyn ClipProbe>,
    service: Arc<dyn InterviewService>,
    capture: CaptureController,
    recorder: RecorderEngine,
    clip: Option<Clip>,
    poller: Option<StatusPoller>,
    phase_tx: watch::Sender<SessionPhase>,
}

impl InterviewSession {
    pub fn new(
        interview_id: impl Into<String>,
        backend: Arc<dyn CaptureBackend>,
        probe: Arc<dyn ClipProbe>,
        service: Arc<dyn InterviewService>,
        config: SessionConfig,
    ) -> Self {
        Self::with_preview(interview_id, backend, probe, service, config, Arc::new(NullPreview))
    }

    pub fn with_preview(
        interview_id: impl Into<String>,
        backend: Arc<dyn CaptureBackend>,
        probe: Arc<dyn ClipProbe>,
        service: Arc<dyn InterviewService>,
        config: SessionConfig,
        preview: Arc<dyn PreviewSink>,
    ) -> Self {
        let capture = CaptureController::new(backend.clone(), preview);
        let recorder = RecorderEngine::new(config.recorder.clone());
        let (phase_tx, _) = watch::channel(SessionPhase::Idle);
        Self {
            interview_id: interview_id.into(),
            config,
            backend,
            probe,
            service,
            capture,
            recorder,
            clip: None,
            poller: None,
            phase_tx,
        }
    }

    pub fn interview_id(&self) -> &str {
        &self.interview_id
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase_tx.borrow()
    }

    /// Subscribe to phase changes.
    pub fn phases(&self) -> watch::Receiver<SessionPhase> {
        self.phase_tx.subscribe()
    }

    /// The validated-or-pending clip currently held, if any.
    pub fn clip(&self) -> Option<&Clip> {
        self.clip.as_ref()
    }

    fn set_phase(&self, phase: SessionPhase) {
        // send_replace updates the value even with no subscribers.
        self.phase_tx.send_replace(phase);
    }

    /// Acquire the device stream and begin previewing. A request while a
    /// stream is already active is a no-op.
    pub async fn enable_capture(&mut self) -> Result<(), SessionError> {
        if self.capture.has_active_stream() {
            return Ok(());
        }
        self.capture.acquire(&self.config.constraints).await?;
        self.set_phase(SessionPhase::Capturing);
        Ok(())
    }

    pub fn has_active_stream(&self) -> bool {
        self.capture.has_active_stream()
    }

    /// Start a bounded chunked recording over the active stream.
    ///
    /// No-op without an active stream or while a recording is already in
    /// progress (duplicate runs are forbidden by construction).
    pub fn start_recording(&mut self) -> Result<(), SessionError> {
        if self.recorder.state() == RecorderState::Recording {
            return Ok(());
        }
        let Some(stream) = self.capture.stream_mut() else {
            return Ok(());
        };
        let mime = negotiate_format(self.backend.as_ref());
        self.recorder.arm(mime);
        self.recorder.start(stream)?;
        Ok(())
    }

    /// Remaining-time feed for UI countdowns while recording.
    pub fn remaining(&self) -> Option<watch::Receiver<Duration>> {
        self.recorder.remaining()
    }

    /// End the recording (works identically for a manual stop and for a run
    /// the hard-stop timer already ended) and take ownership of the clip,
    /// superseding any previous one.
    pub async fn stop_recording(&mut self) {
        if let Some(clip) = self.recorder.stop().await {
            crate::diag!(
                "clip ready: {} bytes of {}",
                clip.size_bytes(),
                clip.mime_type()
            );
            self.clip = Some(clip);
            self.set_phase(SessionPhase::Recorded);
        }
    }

    /// Validate the held clip and run one upload attempt; on success the
    /// session is queued and the status poller starts.
    ///
    /// Validation failures require re-recording. Upload/submit failures
    /// preserve the clip so the next attempt may reuse it. A call while an
    /// attempt is already queued is a no-op.
    pub async fn submit(&mut self) -> Result<(), SessionError> {
        if self.poller.is_some() {
            return Ok(());
        }

        self.set_phase(SessionPhase::Validating);
        if let Err(err) = validate_clip(
            self.clip.as_ref(),
            self.probe.as_ref(),
            self.config.clip_floor(),
        ) {
            self.set_phase(if self.clip.is_some() {
                SessionPhase::Recorded
            } else {
                SessionPhase::Idle
            });
            return Err(err);
        }
        let Some(clip) = self.clip.as_ref() else {
            return Err(SessionError::EmptyRecording);
        };

        self.set_phase(SessionPhase::Uploading);
        let dispatcher = UploadDispatcher::new(self.service.clone());
        match dispatcher.upload(&self.interview_id, clip).await {
            Ok(outcome) => {
                crate::diag!("upload complete via {:?}", outcome.mode);
                self.set_phase(SessionPhase::Queued);
                self.poller = Some(StatusPoller::spawn(
                    self.service.clone(),
                    self.interview_id.clone(),
                    self.config.poller.clone(),
                ));
                Ok(())
            }
            Err(err) => {
                // The clip stays valid; retrying fetches a fresh target.
                self.set_phase(SessionPhase::Recorded);
                Err(err)
            }
        }
    }

    /// Record updates observed by the poller, if one is running.
    pub fn updates(&self) -> Option<watch::Receiver<Option<InterviewRecord>>> {
        self.poller.as_ref().map(StatusPoller::updates)
    }

    /// Wait for the queued attempt to resolve. `None` when nothing is
    /// queued or the session was torn down first.
    pub async fn await_result(&mut self) -> Option<SessionOutcome> {
        let poller = self.poller.take()?;
        let outcome = poller.wait().await?;
        let outcome = match outcome {
            PollOutcome::Terminal(record) => {
                if record.status == InterviewStatus::Complete {
                    self.set_phase(SessionPhase::Complete);
                    SessionOutcome::Complete(record)
                } else {
                    self.set_phase(SessionPhase::Failed);
                    SessionOutcome::ProcessingFailed(record)
                }
            }
            PollOutcome::TimedOut => {
                self.set_phase(SessionPhase::Failed);
                SessionOutcome::TimedOut
            }
        };
        Some(outcome)
    }

    /// Synchronous teardown of everything the session owns: recorder task
    /// (and with it both recording timers), poll task, device stream.
    pub fn teardown(&mut self) {
        self.recorder.abort();
        if let Some(poller) = self.poller.take() {
            poller.shutdown();
        }
        self.capture.release();
        self.set_phase(SessionPhase::Idle);
    }
}

impl Drop for InterviewSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
