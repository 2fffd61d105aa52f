//! Shared CLI plumbing: credential checks and error rendering.

use anyhow::Result;
use greenroom_core::{HttpInterviewApi, SessionError, Settings};

/// Build an API client from settings, requiring a stored credential.
pub fn require_authed_api(settings: &Settings) -> Result<HttpInterviewApi> {
    match settings.resolve_token() {
        Some(token) if !token.is_empty() => {
            Ok(HttpInterviewApi::new(&settings.api_base_url, Some(token)))
        }
        _ => {
            eprintln!("Error: not signed in.");
            eprintln!("\nSign in first with:");
            eprintln!("  greenroom login --username you\n");
            eprintln!("Or set the GREENROOM_TOKEN environment variable.");
            std::process::exit(1);
        }
    }
}

/// API client without a credential, for the auth endpoints themselves.
pub fn public_api(settings: &Settings) -> HttpInterviewApi {
    HttpInterviewApi::new(&settings.api_base_url, None)
}

/// Render a session error the way the orchestrator boundary intends:
/// short, human, actionable.
pub fn session_failure(err: SessionError) -> anyhow::Error {
    anyhow::anyhow!("{}", err.user_message())
}
