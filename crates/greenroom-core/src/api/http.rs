//! HTTP implementation of the interview-record service.

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;

use super::{
    AuthSession, CreateInterview, InterviewRecord, InterviewService, InterviewStatistics,
    SubmitAck,
};
use crate::clip::Clip;
use crate::error::SessionError;
use crate::http::get_http_client;
use crate::upload::{PresignResponse, PresignedTarget};

/// Client for the interview backend plus the presigned object store.
///
/// The credential is passed in explicitly (sourced by an authentication step
/// outside the core); every authenticated call attaches it, and its absence
/// fails with `Unauthenticated` before any network use. No `Debug` impl:
/// the held token must not end up in logs.
#[derive(Clone)]
pub struct HttpInterviewApi {
    base_url: String,
    token: Option<String>,
}

impl HttpInterviewApi {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, token }
    }

    /// Same backend, different credential. Used after login.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            base_url: self.base_url.clone(),
            token: Some(token.into()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_header(&self) -> Result<String, SessionError> {
        match self.token.as_deref() {
            Some(token) if !token.is_empty() => Ok(format!("Token {token}")),
            _ => Err(SessionError::Unauthenticated),
        }
    }

    /// POST a JSON body to an authenticated backend path and parse the reply.
    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiCallError>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let auth = self.auth_header().map_err(|_| ApiCallError::Unauthenticated)?;
        let client = get_http_client().map_err(ApiCallError::Transport)?;
        let response = client
            .post(self.url(path))
            .header("Authorization", auth)
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))
            .map_err(ApiCallError::Transport)?;
        read_json(response).await
    }

    /// GET an authenticated backend path and parse the reply.
    async fn get_json<T>(&self, path: &str) -> Result<T, ApiCallError>
    where
        T: serde::de::DeserializeOwned,
    {
        let auth = self.auth_header().map_err(|_| ApiCallError::Unauthenticated)?;
        let client = get_http_client().map_err(ApiCallError::Transport)?;
        let response = client
            .get(self.url(path))
            .header("Authorization", auth)
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))
            .map_err(ApiCallError::Transport)?;
        read_json(response).await
    }

    /// Unauthenticated POST, used by the auth endpoints themselves.
    async fn post_json_public<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let client = get_http_client()?;
        let response = client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("request to {path} failed"))?;
        match read_json(response).await {
            Ok(value) => Ok(value),
            Err(err) => Err(err.into_anyhow()),
        }
    }

    // ── Operations outside the upload/poll core ──

    /// Create an interview; the backend generates questions for it.
    pub async fn create_interview(&self, payload: &CreateInterview) -> Result<InterviewRecord> {
        self.post_json("/api/interviews/", payload)
            .await
            .map_err(ApiCallError::into_anyhow)
    }

    /// List the caller's interviews, newest first.
    pub async fn list_interviews(&self) -> Result<Vec<InterviewRecord>> {
        self.get_json("/api/interviews/")
            .await
            .map_err(ApiCallError::into_anyhow)
    }

    /// Aggregate practice statistics for the caller.
    pub async fn statistics(&self) -> Result<InterviewStatistics> {
        self.get_json("/api/interviews/statistics/")
            .await
            .map_err(ApiCallError::into_anyhow)
    }

    /// Exchange username/password for a token.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession> {
        self.post_json_public(
            "/api/auth/login/",
            &serde_json::json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Development helper: a token for a stable demo user, no password flow.
    pub async fn dev_login(&self, username: &str) -> Result<AuthSession> {
        self.post_json_public(
            "/api/auth/dev-login/",
            &serde_json::json!({ "username": username }),
        )
        .await
    }
}

#[async_trait]
impl InterviewService for HttpInterviewApi {
    async fn presign_upload(
        &self,
        interview_id: &str,
        content_type: &str,
    ) -> Result<PresignedTarget, SessionError> {
        let path = format!("/api/interviews/{interview_id}/presign_upload/");
        let response: PresignResponse = self
            .post_json(&path, &serde_json::json!({ "content_type": content_type }))
            .await
            .map_err(|err| err.into_session(SessionError::PresignFailed))?;
        Ok(response.into())
    }

    async fn put_object(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
    ) -> Result<(), SessionError> {
        let client =
            get_http_client().map_err(SessionError::UploadFailed)?;
        let mut request = client.put(url).body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let response = request
            .send()
            .await
            .context("object storage PUT failed")
            .map_err(SessionError::UploadFailed)?;
        let status = response.status();
        if !status.is_success() {
            // Any non-success status counts, 403 on an expired URL included.
            return Err(SessionError::UploadFailed(anyhow!(
                "object storage rejected the upload ({status})"
            )));
        }
        Ok(())
    }

    async fn submit(&self, interview_id: &str, byte_size: u64) -> Result<SubmitAck, SessionError> {
        let path = format!("/api/interviews/{interview_id}/submit/");
        self.post_json(&path, &serde_json::json!({ "video_size_bytes": byte_size }))
            .await
            .map_err(|err| err.into_session(SessionError::SubmitFailed))
    }

    async fn upload_multipart(&self, upload_path: &str, clip: &Clip) -> Result<(), SessionError> {
        let auth = self.auth_header()?;
        let client =
            get_http_client().map_err(SessionError::UploadFailed)?;

        let part = reqwest::multipart::Part::bytes(clip.data().to_vec())
            .file_name(upload_filename(clip.mime_type()))
            .mime_str(clip.mime_type())
            .context("invalid clip media type")
            .map_err(SessionError::UploadFailed)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = client
            .post(self.url(upload_path))
            .header("Authorization", auth)
            .multipart(form)
            .send()
            .await
            .context("multipart upload failed")
            .map_err(SessionError::UploadFailed)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(SessionError::Unauthenticated);
        }
        if !status.is_success() {
            let detail = response_detail(response).await;
            return Err(SessionError::UploadFailed(anyhow!(
                "upload endpoint returned {status}: {detail}"
            )));
        }
        Ok(())
    }

    async fn fetch_interview(&self, interview_id: &str) -> Result<InterviewRecord> {
        let path = format!("/api/interviews/{interview_id}/");
        self.get_json(&path).await.map_err(ApiCallError::into_anyhow)
    }
}

/// Fixed upload filename for the multipart field, derived from the media
/// type only (never from anything user-controlled).
fn upload_filename(mime_type: &str) -> String {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    let ext = match essence {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        "audio/webm" | "video/webm" => "webm",
        "audio/mp4" | "video/mp4" => "mp4",
        _ => "bin",
    };
    format!("answer.{ext}")
}

/// Failure of one backend API call, before mapping into session taxonomy.
enum ApiCallError {
    Unauthenticated,
    Transport(anyhow::Error),
    Status(anyhow::Error),
}

impl ApiCallError {
    fn into_session(self, wrap: fn(anyhow::Error) -> SessionError) -> SessionError {
        match self {
            ApiCallError::Unauthenticated => SessionError::Unauthenticated,
            ApiCallError::Transport(err) | ApiCallError::Status(err) => wrap(err),
        }
    }

    fn into_anyhow(self) -> anyhow::Error {
        match self {
            ApiCallError::Unauthenticated => anyhow!("not authenticated"),
            ApiCallError::Transport(err) | ApiCallError::Status(err) => err,
        }
    }
}

/// Check status and parse a JSON body, folding DRF-style `detail` messages
/// into the error.
async fn read_json<T>(response: reqwest::Response) -> Result<T, ApiCallError>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ApiCallError::Unauthenticated);
    }
    let text = response
        .text()
        .await
        .context("failed to read response body")
        .map_err(ApiCallError::Transport)?;
    if !status.is_success() {
        let detail = detail_from_body(&text).unwrap_or_else(|| format!("request failed ({status})"));
        return Err(ApiCallError::Status(anyhow!("{detail}")));
    }
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse response: {text}"))
        .map_err(ApiCallError::Transport)
}

async fn response_detail(response: reqwest::Response) -> String {
    match response.text().await {
        Ok(text) => detail_from_body(&text).unwrap_or(text),
        Err(_) => "unknown error".to_string(),
    }
}

fn detail_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("detail")?.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = HttpInterviewApi::new("http://localhost:8000/", None);
        assert_eq!(api.url("/api/interviews/"), "http://localhost:8000/api/interviews/");
    }

    #[test]
    fn missing_token_is_unauthenticated_before_any_network_use() {
        let api = HttpInterviewApi::new("http://localhost:8000", None);
        assert!(matches!(
            api.auth_header(),
            Err(SessionError::Unauthenticated)
        ));
        let api = api.with_token("abc123");
        assert_eq!(api.auth_header().unwrap(), "Token abc123");
    }

    #[test]
    fn upload_filename_is_fixed_per_media_type() {
        assert_eq!(upload_filename("audio/mpeg"), "answer.mp3");
        assert_eq!(upload_filename("audio/ogg;codecs=opus"), "answer.ogg");
        assert_eq!(upload_filename("video/webm"), "answer.webm");
        assert_eq!(upload_filename("application/x-unknown"), "answer.bin");
    }

    #[test]
    fn drf_detail_is_extracted() {
        assert_eq!(
            detail_from_body(r#"{"detail": "Upload video first."}"#).as_deref(),
            Some("Upload video first.")
        );
        assert_eq!(detail_from_body("not json"), None);
    }
}
