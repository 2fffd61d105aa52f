//! Out-of-band duration probing for recorded clips.
//!
//! Probing demuxes the clip's container metadata without playback: codec
//! parameters when the container declares its length, a packet-duration sum
//! when it does not (streamed MP3 has no length header at all).

use std::io::Cursor;
use std::time::Duration;

use anyhow::{Context, Result};
use symphonia::core::codecs::CodecParameters;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::clip::Clip;

/// Reports a clip's media duration without playing it back.
pub trait ClipProbe: Send + Sync {
    /// `Ok(None)` means the container was readable but carries no usable
    /// duration; an error means the clip could not be read at all. The
    /// validation gate treats both as "duration unavailable".
    fn duration(&self, clip: &Clip) -> Result<Option<Duration>>;
}

/// Demux-only probe over symphonia's format readers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaProbe;

impl ClipProbe for SymphoniaProbe {
    fn duration(&self, clip: &Clip) -> Result<Option<Duration>> {
        let cursor = Cursor::new(clip.data().to_vec());
        let source = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension_for(clip.mime_type()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .context("unreadable media container")?;

        let mut reader = probed.format;
        let Some(track) = reader.default_track() else {
            return Ok(None);
        };
        let track_id = track.id;
        let params = track.codec_params.clone();

        if let Some(duration) = declared_duration(&params) {
            return Ok(Some(duration));
        }

        // No declared length; demux and sum packet durations instead.
        let mut total_ts: u64 = 0;
        loop {
            match reader.next_packet() {
                Ok(packet) => {
                    if packet.track_id() == track_id {
                        total_ts += packet.dur();
                    }
                }
                // A stream that simply ends is the normal case here.
                Err(SymphoniaError::IoError(err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(err) => {
                    return Err(err).context("demux failed while measuring duration");
                }
            }
        }

        Ok(timestamp_to_duration(&params, total_ts))
    }
}

fn declared_duration(params: &CodecParameters) -> Option<Duration> {
    let n_frames = params.n_frames?;
    timestamp_to_duration(params, n_frames)
}

fn timestamp_to_duration(params: &CodecParameters, ts: u64) -> Option<Duration> {
    if ts == 0 {
        return Some(Duration::ZERO);
    }
    let seconds = if let Some(tb) = params.time_base {
        let time = tb.calc_time(ts);
        time.seconds as f64 + time.frac
    } else if let Some(rate) = params.sample_rate {
        ts as f64 / f64::from(rate)
    } else {
        return None;
    };
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}

fn extension_for(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or("").trim();
    match essence {
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        "audio/mp4" | "video/mp4" => Some("mp4"),
        "audio/webm" | "video/webm" => Some("webm"),
        _ => None,
    }
}
