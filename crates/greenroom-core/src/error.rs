//! Error taxonomy for a recording session.
//!
//! Capture and validation errors require the user to re-record. Upload and
//! submit errors leave the validated clip intact so the attempt can be
//! retried without re-recording. Poll fetch failures never appear here at
//! all: the poller swallows them and retries on the next tick.

use std::time::Duration;

use thiserror::Error;

/// Everything that can terminate a session attempt.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Device access was refused by the user or the platform.
    #[error("camera/microphone access denied: {0}")]
    PermissionDenied(String),

    /// The platform (or the configured backend) cannot record at all.
    #[error("recording not supported: {0}")]
    Unsupported(String),

    /// No clip, or a clip with zero bytes.
    #[error("recording is empty")]
    EmptyRecording,

    /// Clip duration is unavailable or below the validation floor.
    #[error("recording too short (measured {measured:?}, floor {floor:?})")]
    TooShort {
        measured: Option<Duration>,
        floor: Duration,
    },

    /// The presign collaborator refused to issue an upload target.
    #[error("failed to obtain an upload target")]
    PresignFailed(#[source] anyhow::Error),

    /// Binary transfer failed (PUT or multipart POST, transport or non-2xx).
    #[error("upload failed")]
    UploadFailed(#[source] anyhow::Error),

    /// The confirmation call after a successful object-storage PUT failed.
    #[error("upload confirmation failed")]
    SubmitFailed(#[source] anyhow::Error),

    /// An authenticated call was attempted without a credential, or the
    /// backend rejected the credential.
    #[error("not authenticated")]
    Unauthenticated,
}

impl SessionError {
    /// Short human-readable message surfaced at the orchestrator boundary.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::PermissionDenied(detail) => {
                format!("Could not access the camera/microphone: {detail}")
            }
            SessionError::Unsupported(detail) => {
                format!("Recording is not supported here: {detail}")
            }
            SessionError::EmptyRecording => {
                "Recording is empty. Try recording again for at least a few seconds.".to_string()
            }
            SessionError::TooShort { floor, .. } => format!(
                "Recording must be at least {} seconds. Try recording again.",
                floor.as_secs()
            ),
            SessionError::PresignFailed(_) => {
                "Could not prepare the upload. Please try submitting again.".to_string()
            }
            SessionError::UploadFailed(_) => {
                "Upload failed. Your recording is still here - try submitting again.".to_string()
            }
            SessionError::SubmitFailed(_) => {
                "The upload finished but could not be confirmed. Try submitting again.".to_string()
            }
            SessionError::Unauthenticated => "Please sign in and try again.".to_string(),
        }
    }

    /// Whether recovering from this error requires a fresh recording.
    pub fn requires_rerecord(&self) -> bool {
        matches!(
            self,
            SessionError::PermissionDenied(_)
                | SessionError::Unsupported(_)
                | SessionError::EmptyRecording
                | SessionError::TooShort { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_require_rerecord() {
        assert!(SessionError::EmptyRecording.requires_rerecord());
        assert!(
            SessionError::TooShort {
                measured: Some(Duration::from_secs(2)),
                floor: Duration::from_secs(4),
            }
            .requires_rerecord()
        );
    }

    #[test]
    fn upload_errors_keep_the_clip() {
        let err = SessionError::UploadFailed(anyhow::anyhow!("status 403"));
        assert!(!err.requires_rerecord());
        assert!(err.user_message().contains("still here"));
    }

    #[test]
    fn too_short_message_names_the_floor() {
        let err = SessionError::TooShort {
            measured: None,
            floor: Duration::from_secs(4),
        };
        assert!(err.user_message().contains("4 seconds"));
    }
}
