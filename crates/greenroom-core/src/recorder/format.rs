//! Container/codec negotiation for recording runs.

use crate::capture::CaptureBackend;

/// Ordered preference list, most compressed / most compatible first. The
/// first entry the backend supports wins; when none is supported the run
/// proceeds with the backend's default format instead of failing.
pub const FORMAT_PREFERENCES: &[&str] = &[
    "audio/ogg;codecs=opus",
    "audio/webm;codecs=opus",
    "audio/mpeg",
    "audio/mp4",
    "audio/wav",
];

/// Pick the recording format for a backend. Deterministic: the same
/// preference list against the same support set always yields the same
/// answer.
pub fn negotiate_format(backend: &dyn CaptureBackend) -> Option<String> {
    FORMAT_PREFERENCES
        .iter()
        .find(|mime| backend.is_format_supported(mime))
        .map(|mime| (*mime).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MediaConstraints, MediaStream};
    use crate::error::SessionError;
    use async_trait::async_trait;

    struct FixedSupport(&'static [&'static str]);

    #[async_trait]
    impl CaptureBackend for FixedSupport {
        async fn acquire(
            &self,
            _constraints: &MediaConstraints,
        ) -> Result<Box<dyn MediaStream>, SessionError> {
            Err(SessionError::Unsupported("test backend".into()))
        }

        fn is_format_supported(&self, mime_type: &str) -> bool {
            self.0.contains(&mime_type)
        }
    }

    #[test]
    fn first_supported_preference_wins() {
        let backend = FixedSupport(&["audio/wav", "audio/mpeg"]);
        assert_eq!(negotiate_format(&backend).as_deref(), Some("audio/mpeg"));
    }

    #[test]
    fn negotiation_is_deterministic() {
        let backend = FixedSupport(&["audio/mpeg", "audio/wav"]);
        let first = negotiate_format(&backend);
        for _ in 0..10 {
            assert_eq!(negotiate_format(&backend), first);
        }
    }

    #[test]
    fn no_support_negotiates_nothing() {
        let backend = FixedSupport(&[]);
        assert_eq!(negotiate_format(&backend), None);
    }
}
