//! Persisted settings with environment overrides.
//!
//! Stored as JSON under the platform config directory
//! (`~/.config/greenroom/settings.json` on Linux). Environment variables
//! `GREENROOM_API_BASE_URL` and `GREENROOM_TOKEN` override the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::capture::MediaConstraints;
use crate::poll::PollerConfig;
use crate::recorder::RecorderConfig;
use crate::session::SessionConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Backend base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Stored credential (env `GREENROOM_TOKEN` takes precedence).
    #[serde(default)]
    pub token: Option<String>,

    /// Input device name (None = system default).
    #[serde(default)]
    pub microphone_device: Option<String>,

    /// Hard recording ceiling in seconds.
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,

    /// Validation floor in seconds.
    #[serde(default = "default_min_duration_secs")]
    pub min_duration_secs: u64,

    /// Poll cadence in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Total polling budget in seconds (0 = unbounded).
    #[serde(default = "default_poll_max_wait_secs")]
    pub poll_max_wait_secs: u64,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_max_duration_secs() -> u64 {
    60
}

fn default_min_duration_secs() -> u64 {
    4
}

fn default_poll_interval_ms() -> u64 {
    1500
}

fn default_poll_max_wait_secs() -> u64 {
    600
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token: None,
            microphone_device: None,
            max_duration_secs: default_max_duration_secs(),
            min_duration_secs: default_min_duration_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_max_wait_secs: default_poll_max_wait_secs(),
        }
    }
}

impl Settings {
    /// Load from disk, falling back to defaults, then apply env overrides.
    pub fn load() -> Self {
        let mut settings: Settings = Self::config_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or_default();

        if let Ok(url) = std::env::var("GREENROOM_API_BASE_URL") {
            if !url.is_empty() {
                settings.api_base_url = url;
            }
        }
        if let Ok(token) = std::env::var("GREENROOM_TOKEN") {
            if !token.is_empty() {
                settings.token = Some(token);
            }
        }
        settings
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().context("no config directory on this platform")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("greenroom").join("settings.json"))
    }

    /// The credential to attach to authenticated calls, if any.
    pub fn resolve_token(&self) -> Option<String> {
        self.token.clone()
    }

    /// Map settings onto the core's session tunables.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            constraints: MediaConstraints {
                device_name: self.microphone_device.clone(),
                ..MediaConstraints::default()
            },
            recorder: RecorderConfig {
                max_duration: Duration::from_secs(self.max_duration_secs),
                ..RecorderConfig::default()
            },
            poller: PollerConfig {
                interval: Duration::from_millis(self.poll_interval_ms),
                max_wait: match self.poll_max_wait_secs {
                    0 => None,
                    secs => Some(Duration::from_secs(secs)),
                },
            },
            min_clip_duration: Some(Duration::from_secs(self.min_duration_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_session_contract() {
        let settings = Settings::default();
        let config = settings.session_config();
        assert_eq!(config.recorder.max_duration, Duration::from_secs(60));
        assert_eq!(config.poller.interval, Duration::from_millis(1500));
        assert_eq!(config.poller.max_wait, Some(Duration::from_secs(600)));
        assert_eq!(config.min_clip_duration, Some(Duration::from_secs(4)));
    }

    #[test]
    fn zero_budget_means_unbounded_polling() {
        let settings = Settings {
            poll_max_wait_secs: 0,
            ..Settings::default()
        };
        assert_eq!(settings.session_config().poller.max_wait, None);
    }

    #[test]
    fn settings_round_trip_as_json() {
        let settings = Settings {
            api_base_url: "https://api.example.com".into(),
            microphone_device: Some("USB Microphone".into()),
            ..Settings::default()
        };
        let text = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.api_base_url, "https://api.example.com");
        assert_eq!(parsed.microphone_device.as_deref(), Some("USB Microphone"));
    }
}
