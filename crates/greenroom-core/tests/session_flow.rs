//! End-to-end session flows over in-memory collaborators.
//!
//! The fakes here stand in for the device backend, the duration probe and
//! the interview backend, so the full capture -> record -> validate ->
//! upload -> poll pipeline runs in real (tiny) time.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use greenroom_core::api::{InterviewRecord, InterviewService, InterviewStatus, SubmitAck};
use greenroom_core::capture::{
    CaptureBackend, EncodeOptions, MediaConstraints, MediaStream, RunningEncoder,
};
use greenroom_core::clip::{Clip, RecordingChunk};
use greenroom_core::error::SessionError;
use greenroom_core::poll::PollerConfig;
use greenroom_core::probe::ClipProbe;
use greenroom_core::recorder::RecorderConfig;
use greenroom_core::session::{InterviewSession, SessionConfig, SessionOutcome, SessionPhase};
use greenroom_core::upload::{PresignedTarget, UploadDispatcher};

// ── Fake capture backend ──

struct FakeBackend {
    chunks: Vec<RecordingChunk>,
    period: Duration,
}

impl FakeBackend {
    fn with_payload(chunk_count: usize, chunk_len: usize) -> Arc<Self> {
        Arc::new(Self {
            chunks: (0..chunk_count).map(|n| vec![n as u8; chunk_len]).collect(),
            period: Duration::from_millis(2),
        })
    }
}

#[async_trait]
impl CaptureBackend for FakeBackend {
    async fn acquire(
        &self,
        _constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, SessionError> {
        Ok(Box::new(FakeStream {
            chunks: self.chunks.clone(),
            period: self.period,
            live: true,
        }))
    }

    fn is_format_supported(&self, mime_type: &str) -> bool {
        mime_type == "audio/mpeg"
    }
}

struct FakeStream {
    chunks: Vec<RecordingChunk>,
    period: Duration,
    live: bool,
}

impl MediaStream for FakeStream {
    fn start_encoder(
        &mut self,
        _options: &EncodeOptions,
    ) -> Result<Box<dyn RunningEncoder>, SessionError> {
        Ok(Box::new(FakeEncoder {
            queue: VecDeque::from(self.chunks.clone()),
            period: self.period,
            finalized: false,
        }))
    }

    fn stop_tracks(&mut self) {
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

struct FakeEncoder {
    queue: VecDeque<RecordingChunk>,
    period: Duration,
    finalized: bool,
}

#[async_trait]
impl RunningEncoder for FakeEncoder {
    fn mime_type(&self) -> &str {
        "audio/mpeg"
    }

    async fn next_chunk(&mut self) -> Option<RecordingChunk> {
        if self.finalized {
            return self.queue.pop_front();
        }
        if self.queue.is_empty() {
            // Nothing more until finalize; park like a live device would.
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(self.period).await;
        self.queue.pop_front()
    }

    fn finalize(&mut self) {
        self.finalized = true;
    }
}

// ── Fake probe ──

struct FixedProbe(Option<Duration>);

impl ClipProbe for FixedProbe {
    fn duration(&self, _clip: &Clip) -> anyhow::Result<Option<Duration>> {
        Ok(self.0)
    }
}

// ── Fake interview service ──

#[derive(Clone, Copy, PartialEq)]
enum FakeMode {
    Local,
    S3,
}

struct FakeService {
    mode: FakeMode,
    /// Number of upcoming PUTs to refuse with a 403-style failure.
    failing_puts: AtomicUsize,
    /// Status returned per fetch; the last entry repeats.
    statuses: Mutex<VecDeque<InterviewStatus>>,
    presigns: AtomicUsize,
    puts: AtomicUsize,
    submits: AtomicUsize,
    multiparts: AtomicUsize,
    fetches: AtomicUsize,
    stored: Mutex<Option<Vec<u8>>>,
}

impl FakeService {
    fn new(mode: FakeMode, statuses: &[InterviewStatus]) -> Arc<Self> {
        Arc::new(Self {
            mode,
            failing_puts: AtomicUsize::new(0),
            statuses: Mutex::new(statuses.iter().cloned().collect()),
            presigns: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
            submits: AtomicUsize::new(0),
            multiparts: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            stored: Mutex::new(None),
        })
    }

    fn network_calls(&self) -> usize {
        self.presigns.load(Ordering::SeqCst)
            + self.puts.load(Ordering::SeqCst)
            + self.submits.load(Ordering::SeqCst)
            + self.multiparts.load(Ordering::SeqCst)
            + self.fetches.load(Ordering::SeqCst)
    }

    fn record_with(&self, interview_id: &str, status: InterviewStatus) -> InterviewRecord {
        let feedback = (status == InterviewStatus::Complete).then(|| {
            serde_json::json!({
                "summary": "Clear structure, good pacing.",
                "strengths": ["concrete examples"],
                "weaknesses": ["closing could be tighter"]
            })
        });
        InterviewRecord {
            id: interview_id.to_string(),
            status,
            questions: Vec::new(),
            transcript_text: None,
            ai_feedback: feedback,
            personality_fit: None,
            video_object_key: None,
            created_at: None,
            updated_at: None,
        }
    }
}

#[async_trait]
impl InterviewService for FakeService {
    async fn presign_upload(
        &self,
        interview_id: &str,
        content_type: &str,
    ) -> Result<PresignedTarget, SessionError> {
        let attempt = self.presigns.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(match self.mode {
            FakeMode::S3 => PresignedTarget::ObjectStoragePut {
                // Fresh single-use URL per attempt.
                url: format!("https://bucket.test/{interview_id}/{attempt}"),
                headers: HashMap::from([("Content-Type".to_string(), content_type.to_string())]),
            },
            FakeMode::Local => PresignedTarget::LocalMultipart {
                path: format!("/api/interviews/{interview_id}/upload_local/"),
            },
        })
    }

    async fn put_object(
        &self,
        _url: &str,
        _headers: &HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<(), SessionError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.failing_puts.load(Ordering::SeqCst) > 0 {
            self.failing_puts.fetch_sub(1, Ordering::SeqCst);
            return Err(SessionError::UploadFailed(anyhow::anyhow!(
                "object storage rejected the upload (403 Forbidden)"
            )));
        }
        *self.stored.lock().unwrap() = Some(body);
        Ok(())
    }

    async fn submit(&self, interview_id: &str, _byte_size: u64) -> Result<SubmitAck, SessionError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Ok(SubmitAck {
            queued: true,
            interview_id: interview_id.to_string(),
        })
    }

    async fn upload_multipart(&self, _upload_path: &str, clip: &Clip) -> Result<(), SessionError> {
        self.multiparts.fetch_add(1, Ordering::SeqCst);
        *self.stored.lock().unwrap() = Some(clip.data().to_vec());
        Ok(())
    }

    async fn fetch_interview(&self, interview_id: &str) -> anyhow::Result<InterviewRecord> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let status = {
            let mut queue = self.statuses.lock().unwrap();
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue
                    .front()
                    .cloned()
                    .unwrap_or(InterviewStatus::Processing)
            }
        };
        Ok(self.record_with(interview_id, status))
    }
}

// ── Helpers ──

fn fast_config() -> SessionConfig {
    SessionConfig {
        constraints: MediaConstraints::default(),
        recorder: RecorderConfig {
            max_duration: Duration::from_secs(10),
            timeslice: Duration::from_millis(5),
            tick_interval: Duration::from_millis(10),
            bits_per_second: 128_000,
        },
        poller: PollerConfig {
            interval: Duration::from_millis(20),
            max_wait: Some(Duration::from_secs(5)),
        },
        min_clip_duration: Some(Duration::from_secs(4)),
    }
}

fn session_with(
    backend: Arc<FakeBackend>,
    probe: FixedProbe,
    service: Arc<FakeService>,
    config: SessionConfig,
) -> InterviewSession {
    InterviewSession::new("iv-1", backend, Arc::new(probe), service, config)
}

async fn record_clip(session: &mut InterviewSession) {
    session.enable_capture().await.unwrap();
    session.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    session.stop_recording().await;
}

// ── Scenarios ──

#[tokio::test]
async fn local_mode_happy_path_reaches_complete_with_feedback() {
    let backend = FakeBackend::with_payload(10, 50_000); // 500 KB total
    let service = FakeService::new(
        FakeMode::Local,
        &[
            InterviewStatus::Uploaded,
            InterviewStatus::Processing,
            InterviewStatus::Complete,
        ],
    );
    let mut session = session_with(
        backend,
        FixedProbe(Some(Duration::from_secs(10))),
        service.clone(),
        fast_config(),
    );

    record_clip(&mut session).await;
    assert_eq!(session.phase(), SessionPhase::Recorded);
    assert_eq!(session.clip().unwrap().size_bytes(), 500_000);

    session.submit().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Queued);
    assert_eq!(service.multiparts.load(Ordering::SeqCst), 1);
    assert_eq!(service.puts.load(Ordering::SeqCst), 0);
    assert_eq!(service.submits.load(Ordering::SeqCst), 0);
    assert_eq!(
        service.stored.lock().unwrap().as_ref().unwrap().len(),
        500_000
    );

    match session.await_result().await {
        Some(SessionOutcome::Complete(record)) => {
            assert!(record.ai_feedback.is_some());
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(session.phase(), SessionPhase::Complete);
}

#[tokio::test]
async fn too_short_clip_is_rejected_before_any_network_call() {
    let backend = FakeBackend::with_payload(4, 1_000);
    let service = FakeService::new(FakeMode::Local, &[InterviewStatus::Complete]);
    let mut session = session_with(
        backend,
        FixedProbe(Some(Duration::from_secs(2))),
        service.clone(),
        fast_config(),
    );

    record_clip(&mut session).await;
    let err = session.submit().await.unwrap_err();
    assert!(matches!(err, SessionError::TooShort { .. }));
    assert_eq!(service.network_calls(), 0);
    // The session is back where the user can re-record.
    assert_eq!(session.phase(), SessionPhase::Recorded);
}

#[tokio::test]
async fn put_403_fails_the_attempt_and_a_fresh_target_retry_succeeds() {
    let backend = FakeBackend::with_payload(8, 4_000);
    let service = FakeService::new(
        FakeMode::S3,
        &[InterviewStatus::Processing, InterviewStatus::Complete],
    );
    service.failing_puts.store(1, Ordering::SeqCst);
    let mut session = session_with(
        backend,
        FixedProbe(Some(Duration::from_secs(8))),
        service.clone(),
        fast_config(),
    );

    record_clip(&mut session).await;
    let err = session.submit().await.unwrap_err();
    assert!(matches!(err, SessionError::UploadFailed(_)));
    // No submit confirmation after a failed PUT, and the clip survives.
    assert_eq!(service.submits.load(Ordering::SeqCst), 0);
    assert!(session.clip().is_some());
    assert_eq!(session.phase(), SessionPhase::Recorded);

    session.submit().await.unwrap();
    assert_eq!(service.presigns.load(Ordering::SeqCst), 2);
    assert_eq!(service.puts.load(Ordering::SeqCst), 2);
    assert_eq!(service.submits.load(Ordering::SeqCst), 1);

    match session.await_result().await {
        Some(SessionOutcome::Complete(_)) => {}
        other => panic!("expected completion, got {other:?}"),
    }
}

#[tokio::test]
async fn upload_path_is_a_pure_function_of_presign_mode() {
    let clip = Clip::from_chunks(vec![vec![7u8; 2_000]], "audio/mpeg");

    let local = FakeService::new(FakeMode::Local, &[InterviewStatus::Complete]);
    UploadDispatcher::new(local.clone())
        .upload("iv-a", &clip)
        .await
        .unwrap();
    assert_eq!(local.multiparts.load(Ordering::SeqCst), 1);
    assert_eq!(local.puts.load(Ordering::SeqCst), 0);
    assert_eq!(local.submits.load(Ordering::SeqCst), 0);

    let s3 = FakeService::new(FakeMode::S3, &[InterviewStatus::Complete]);
    UploadDispatcher::new(s3.clone())
        .upload("iv-b", &clip)
        .await
        .unwrap();
    assert_eq!(s3.multiparts.load(Ordering::SeqCst), 0);
    assert_eq!(s3.puts.load(Ordering::SeqCst), 1);
    assert_eq!(s3.submits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn poller_issues_no_requests_after_terminal_status() {
    let backend = FakeBackend::with_payload(4, 1_000);
    let service = FakeService::new(FakeMode::Local, &[InterviewStatus::Complete]);
    let mut session = session_with(
        backend,
        FixedProbe(Some(Duration::from_secs(6))),
        service.clone(),
        fast_config(),
    );

    record_clip(&mut session).await;
    session.submit().await.unwrap();
    assert!(session.await_result().await.is_some());

    let fetches = service.fetches.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(service.fetches.load(Ordering::SeqCst), fetches);
}

#[tokio::test]
async fn teardown_stops_polling_and_releases_the_stream() {
    let backend = FakeBackend::with_payload(4, 1_000);
    // Never terminal: the poller would spin forever without teardown.
    let service = FakeService::new(FakeMode::Local, &[InterviewStatus::Processing]);
    let mut session = session_with(
        backend,
        FixedProbe(Some(Duration::from_secs(6))),
        service.clone(),
        fast_config(),
    );

    record_clip(&mut session).await;
    session.submit().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(service.fetches.load(Ordering::SeqCst) > 0);

    session.teardown();
    assert!(!session.has_active_stream());
    let fetches = service.fetches.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(service.fetches.load(Ordering::SeqCst), fetches);
    assert!(session.await_result().await.is_none());
}

#[tokio::test]
async fn polling_budget_expiry_resolves_timed_out() {
    let backend = FakeBackend::with_payload(4, 1_000);
    let service = FakeService::new(FakeMode::Local, &[InterviewStatus::Processing]);
    let mut config = fast_config();
    config.poller.max_wait = Some(Duration::from_millis(80));
    let mut session = session_with(
        backend,
        FixedProbe(Some(Duration::from_secs(6))),
        service,
        config,
    );

    record_clip(&mut session).await;
    session.submit().await.unwrap();
    match session.await_result().await {
        Some(SessionOutcome::TimedOut) => {}
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(session.phase(), SessionPhase::Failed);
}

#[tokio::test]
async fn duplicate_starts_are_noops_and_release_allows_reacquire() {
    let backend = FakeBackend::with_payload(4, 1_000);
    let service = FakeService::new(FakeMode::Local, &[InterviewStatus::Complete]);
    let mut session = session_with(
        backend,
        FixedProbe(Some(Duration::from_secs(6))),
        service,
        fast_config(),
    );

    session.enable_capture().await.unwrap();
    session.enable_capture().await.unwrap();
    assert!(session.has_active_stream());

    session.start_recording().unwrap();
    // Second start while recording must not spawn a second run.
    session.start_recording().unwrap();
    tokio::time::sleep(Duration::from_millis(40)).await;
    session.stop_recording().await;
    let size = session.clip().unwrap().size_bytes();
    // A stop with no recording in progress changes nothing.
    session.stop_recording().await;
    assert_eq!(session.clip().unwrap().size_bytes(), size);

    session.teardown();
    assert!(!session.has_active_stream());
    session.enable_capture().await.unwrap();
    assert!(session.has_active_stream());
}

#[tokio::test]
async fn hard_stop_and_manual_stop_race_produces_exactly_one_clip() {
    let backend = FakeBackend::with_payload(1_000, 100);
    let service = FakeService::new(FakeMode::Local, &[InterviewStatus::Complete]);
    let mut config = fast_config();
    config.recorder.max_duration = Duration::from_millis(50);
    let mut session = session_with(
        backend,
        FixedProbe(Some(Duration::from_secs(6))),
        service,
        config,
    );

    session.enable_capture().await.unwrap();
    session.start_recording().unwrap();
    // Let the hard-stop timer win the race...
    tokio::time::sleep(Duration::from_millis(150)).await;
    // ...then issue the manual stop; it must be a harmless no-op collecting
    // the already-finalized clip.
    session.stop_recording().await;
    let clip = session.clip().expect("one clip").clone();
    assert!(!clip.is_empty());
    assert_eq!(session.phase(), SessionPhase::Recorded);

    session.stop_recording().await;
    assert_eq!(session.clip().unwrap(), &clip);
}

#[tokio::test]
async fn empty_recording_is_rejected_downstream_not_by_the_engine() {
    let backend = FakeBackend::with_payload(0, 0);
    let service = FakeService::new(FakeMode::Local, &[InterviewStatus::Complete]);
    let mut session = session_with(
        backend,
        FixedProbe(None),
        service.clone(),
        fast_config(),
    );

    record_clip(&mut session).await;
    // The engine delivered a zero-length clip rather than failing.
    assert_eq!(session.clip().unwrap().size_bytes(), 0);
    let err = session.submit().await.unwrap_err();
    assert!(matches!(err, SessionError::EmptyRecording));
    assert_eq!(service.network_calls(), 0);
}
