//! Shared HTTP client for all collaborator calls.
//!
//! One client per process keeps connection pools warm across the presign /
//! upload / poll sequence.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;

static HTTP_CLIENT: OnceCell<reqwest::Client> = OnceCell::new();

/// Get the process-wide HTTP client, building it on first use.
pub fn get_http_client() -> Result<&'static reqwest::Client> {
    HTTP_CLIENT.get_or_try_init(|| {
        reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client")
    })
}

/// Build the client ahead of the first request to shave first-call latency.
pub fn warmup_http_client() -> Result<()> {
    get_http_client().map(|_| ())
}
