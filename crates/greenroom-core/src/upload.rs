//! Dual-path upload dispatch: a validated clip becomes a stored object via
//! direct-to-object-storage PUT or the backend's local multipart endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::api::InterviewService;
use crate::clip::Clip;
use crate::error::SessionError;

/// How one upload attempt must deliver its clip. Obtained once per attempt
/// from the presign collaborator; single-use - URLs may be time-limited, so
/// targets are never cached across attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresignedTarget {
    /// Direct binary PUT to object storage, followed by a separate submit
    /// confirmation (the object store does not notify the backend itself).
    ObjectStoragePut {
        url: String,
        headers: HashMap<String, String>,
    },
    /// Multipart POST to the backend, which stores and enqueues in one call.
    LocalMultipart { path: String },
}

/// Wire shape of the presign response.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PresignResponse {
    S3 {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        object_key: Option<String>,
    },
    Local {
        upload_url: String,
    },
}

impl From<PresignResponse> for PresignedTarget {
    fn from(response: PresignResponse) -> Self {
        match response {
            PresignResponse::S3 { url, headers, .. } => {
                PresignedTarget::ObjectStoragePut { url, headers }
            }
            PresignResponse::Local { upload_url } => {
                PresignedTarget::LocalMultipart { path: upload_url }
            }
        }
    }
}

/// Which delivery strategy an attempt ended up using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    ObjectStorage,
    LocalMultipart,
}

/// Result of a successful upload attempt.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub mode: UploadMode,
    pub queued: bool,
}

/// Turns a validated clip into a stored, processing-enqueued object.
pub struct UploadDispatcher {
    service: Arc<dyn InterviewService>,
}

impl UploadDispatcher {
    pub fn new(service: Arc<dyn InterviewService>) -> Self {
        Self { service }
    }

    /// Run one upload attempt.
    ///
    /// Path selection is purely a function of the presign response's mode.
    /// On any failure the attempt aborts and the clip remains valid; a retry
    /// fetches a fresh target and may reuse the clip without re-recording.
    pub async fn upload(
        &self,
        interview_id: &str,
        clip: &Clip,
    ) -> Result<UploadOutcome, SessionError> {
        let target = self
            .service
            .presign_upload(interview_id, clip.mime_type())
            .await?;

        match target {
            PresignedTarget::ObjectStoragePut { url, headers } => {
                self.service
                    .put_object(&url, &headers, clip.data().to_vec())
                    .await?;
                // The bytes landed, but the backend does not know yet.
                let ack = self.service.submit(interview_id, clip.size_bytes()).await?;
                Ok(UploadOutcome {
                    mode: UploadMode::ObjectStorage,
                    queued: ack.queued,
                })
            }
            PresignedTarget::LocalMultipart { path } => {
                self.service.upload_multipart(&path, clip).await?;
                Ok(UploadOutcome {
                    mode: UploadMode::LocalMultipart,
                    queued: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_response_maps_to_object_storage_put() {
        let response: PresignResponse = serde_json::from_str(
            r#"{
                "mode": "s3",
                "object_key": "interviews/1/abc.mp3",
                "url": "https://bucket.example/abc",
                "headers": {"Content-Type": "audio/mpeg"}
            }"#,
        )
        .unwrap();
        let target = PresignedTarget::from(response);
        match target {
            PresignedTarget::ObjectStoragePut { url, headers } => {
                assert_eq!(url, "https://bucket.example/abc");
                assert_eq!(headers.get("Content-Type").unwrap(), "audio/mpeg");
            }
            other => panic!("wrong target: {other:?}"),
        }
    }

    #[test]
    fn local_response_maps_to_multipart() {
        let response: PresignResponse =
            serde_json::from_str(r#"{"mode": "local", "upload_url": "/api/interviews/x/upload_local/"}"#)
                .unwrap();
        assert_eq!(
            PresignedTarget::from(response),
            PresignedTarget::LocalMultipart {
                path: "/api/interviews/x/upload_local/".into()
            }
        );
    }
}
