pub mod api;
pub mod capture;
pub mod clip;
#[cfg(feature = "device")]
pub mod device;
pub mod diag;
pub mod error;
pub mod http;
pub mod poll;
pub mod probe;
pub mod recorder;
pub mod session;
pub mod settings;
pub mod upload;
pub mod validate;

pub use api::{
    AuthSession, CreateInterview, HttpInterviewApi, InterviewQuestion, InterviewRecord,
    InterviewService, InterviewStatistics, InterviewStatus, SubmitAck, UserInfo,
};
pub use capture::{
    CaptureBackend, CaptureController, EncodeOptions, MediaConstraints, MediaStream, NullPreview,
    PreviewSink, RunningEncoder,
};
pub use clip::{Clip, RecordingChunk};
#[cfg(feature = "device")]
pub use device::{AudioDeviceInfo, CpalBackend, list_input_devices};
pub use diag::set_diagnostics;
pub use error::SessionError;
pub use http::{get_http_client, warmup_http_client};
pub use poll::{PollOutcome, PollerConfig, StatusPoller};
pub use probe::{ClipProbe, SymphoniaProbe};
pub use recorder::format::negotiate_format;
pub use recorder::{RecorderConfig, RecorderEngine, RecorderState};
pub use session::{InterviewSession, SessionConfig, SessionOutcome, SessionPhase};
pub use settings::Settings;
pub use upload::{PresignedTarget, UploadDispatcher, UploadMode, UploadOutcome};
pub use validate::{MIN_CLIP_DURATION, validate_clip};
