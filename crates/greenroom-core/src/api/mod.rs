//! Wire types and the service seam for the interview-record backend.
//!
//! The core never reasons about collaborator internals; everything it needs
//! is behind [`InterviewService`]. The production implementation is
//! [`HttpInterviewApi`](crate::api::http::HttpInterviewApi); tests substitute
//! in-memory fakes.

pub mod http;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::error::SessionError;
use crate::upload::PresignedTarget;

pub use http::HttpInterviewApi;

/// Remote processing state of an interview record.
///
/// The taxonomy is owned by the backend; only `Complete` and `Failed` are
/// terminal, everything else (including values this client has never heard
/// of) means "still working".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Created,
    QuestionsReady,
    Uploaded,
    Processing,
    Complete,
    Failed,
    #[serde(untagged)]
    Other(String),
}

impl InterviewStatus {
    /// Whether polling may stop for good.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InterviewStatus::Complete | InterviewStatus::Failed)
    }
}

/// One generated interview question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewQuestion {
    pub id: String,
    pub prompt: String,
    #[serde(default)]
    pub competency: String,
    #[serde(default)]
    pub order: i64,
}

/// The remote interview entity, fetched and polled, never mutated locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewRecord {
    pub id: String,
    pub status: InterviewStatus,
    #[serde(default)]
    pub questions: Vec<InterviewQuestion>,
    #[serde(default)]
    pub transcript_text: Option<String>,
    #[serde(default)]
    pub ai_feedback: Option<serde_json::Value>,
    #[serde(default)]
    pub personality_fit: Option<serde_json::Value>,
    #[serde(default)]
    pub video_object_key: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Acknowledgement of the submit confirmation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAck {
    pub queued: bool,
    pub interview_id: String,
}

/// Aggregate practice statistics.
#[derive(Debug, Clone, Deserialize)]
pub struct InterviewStatistics {
    pub total_interviews: u64,
    pub average_duration_seconds: f64,
    pub most_practiced_competency: Option<String>,
    pub total_questions_answered: u64,
}

/// Fields accepted when creating an interview.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CreateInterview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

/// An authenticated user session returned by the auth endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: UserInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
}

/// Everything the upload dispatcher and the status poller need from the
/// backend and the object store.
#[async_trait]
pub trait InterviewService: Send + Sync {
    /// Ask the presign collaborator how to deliver a clip. Targets are
    /// single-use and never cached: URLs may be time-limited.
    async fn presign_upload(
        &self,
        interview_id: &str,
        content_type: &str,
    ) -> Result<PresignedTarget, SessionError>;

    /// Raw binary PUT to object storage. Success iff 2xx.
    async fn put_object(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<(), SessionError>;

    /// Confirmation call after a successful PUT; tells the backend the
    /// transfer completed so it may enqueue processing.
    async fn submit(&self, interview_id: &str, byte_size: u64) -> Result<SubmitAck, SessionError>;

    /// Multipart POST to the backend's own upload path. Stores and enqueues
    /// in one call; no submit confirmation follows.
    async fn upload_multipart(&self, upload_path: &str, clip: &Clip) -> Result<(), SessionError>;

    /// Fetch the interview record. Callers on the polling path swallow
    /// errors and retry, so failures here are plain transport errors rather
    /// than session taxonomy.
    async fn fetch_interview(&self, interview_id: &str) -> anyhow::Result<InterviewRecord>;
}
