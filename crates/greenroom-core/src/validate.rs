//! Client-side validation of a recorded clip, run once after stop and
//! before any network call.

use std::time::Duration;

use crate::clip::Clip;
use crate::error::SessionError;
use crate::probe::ClipProbe;

/// Recordings shorter than this are rejected.
pub const MIN_CLIP_DURATION: Duration = Duration::from_secs(4);

/// Gate a clip for upload.
///
/// Rejects, in order: a missing clip, a zero-byte clip, and a clip whose
/// probed duration is unavailable or under `floor`. A probe failure counts
/// as "duration unavailable" - an unreadable recording is not uploadable.
pub fn validate_clip(
    clip: Option<&Clip>,
    probe: &dyn ClipProbe,
    floor: Duration,
) -> Result<(), SessionError> {
    let clip = clip.ok_or(SessionError::EmptyRecording)?;
    if clip.is_empty() {
        return Err(SessionError::EmptyRecording);
    }

    let measured = probe.duration(clip).unwrap_or_else(|err| {
        crate::diag!("duration probe failed: {err:#}");
        None
    });
    match measured {
        Some(duration) if duration >= floor => Ok(()),
        other => Err(SessionError::TooShort {
            measured: other,
            floor,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    struct FixedProbe(Option<Duration>);

    impl ClipProbe for FixedProbe {
        fn duration(&self, _clip: &Clip) -> Result<Option<Duration>> {
            Ok(self.0)
        }
    }

    struct FailingProbe;

    impl ClipProbe for FailingProbe {
        fn duration(&self, _clip: &Clip) -> Result<Option<Duration>> {
            anyhow::bail!("unreadable")
        }
    }

    fn clip_of(len: usize) -> Clip {
        Clip::from_chunks(vec![vec![0u8; len]], "audio/mpeg")
    }

    #[test]
    fn missing_clip_rejected() {
        let err = validate_clip(None, &FixedProbe(Some(Duration::from_secs(10))), MIN_CLIP_DURATION)
            .unwrap_err();
        assert!(matches!(err, SessionError::EmptyRecording));
    }

    #[test]
    fn zero_bytes_rejected_regardless_of_duration() {
        let clip = clip_of(0);
        let err = validate_clip(
            Some(&clip),
            &FixedProbe(Some(Duration::from_secs(3600))),
            MIN_CLIP_DURATION,
        )
        .unwrap_err();
        assert!(matches!(err, SessionError::EmptyRecording));
    }

    #[test]
    fn below_floor_rejected() {
        let clip = clip_of(1024);
        let err = validate_clip(
            Some(&clip),
            &FixedProbe(Some(Duration::from_secs(2))),
            MIN_CLIP_DURATION,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SessionError::TooShort {
                measured: Some(d),
                ..
            } if d == Duration::from_secs(2)
        ));
    }

    #[test]
    fn at_floor_accepted() {
        let clip = clip_of(1024);
        assert!(
            validate_clip(
                Some(&clip),
                &FixedProbe(Some(Duration::from_secs(4))),
                MIN_CLIP_DURATION,
            )
            .is_ok()
        );
    }

    #[test]
    fn unavailable_duration_rejected() {
        let clip = clip_of(1024);
        let err = validate_clip(Some(&clip), &FixedProbe(None), MIN_CLIP_DURATION).unwrap_err();
        assert!(matches!(err, SessionError::TooShort { measured: None, .. }));
    }

    #[test]
    fn probe_failure_counts_as_unavailable() {
        let clip = clip_of(1024);
        let err = validate_clip(Some(&clip), &FailingProbe, MIN_CLIP_DURATION).unwrap_err();
        assert!(matches!(err, SessionError::TooShort { measured: None, .. }));
    }
}
