//! Built-in microphone capture backend.
//!
//! Captures audio with cpal and encodes it to MP3 fragments with the
//! embedded LAME encoder. MP3 frames are self-delimiting, so the fixed-
//! cadence fragments this backend emits concatenate into a valid clip with
//! no container finalization step.
//!
//! The `cpal::Stream` is not `Send`, so each encoding run owns a dedicated
//! worker thread: the stream callback feeds samples over a channel, the
//! worker slices them on the timeslice cadence, and dropping the run's stop
//! sender ends the thread and releases the device.

use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use mp3lame_encoder::{Builder, FlushNoGap, MonoPcm};
use tokio::sync::mpsc;

use crate::capture::{CaptureBackend, EncodeOptions, MediaConstraints, MediaStream, RunningEncoder};
use crate::clip::RecordingChunk;
use crate::error::SessionError;

/// Media type this backend produces.
pub const MP3_MIME_TYPE: &str = "audio/mpeg";

/// An input device visible to the backend.
#[derive(Debug, Clone)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub is_default: bool,
}

/// List the audio input devices on this system.
pub fn list_input_devices() -> anyhow::Result<Vec<AudioDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.description().ok())
        .map(|d| d.to_string());

    let mut devices = Vec::new();
    for device in host.input_devices()? {
        if let Ok(description) = device.description() {
            let name = description.to_string();
            devices.push(AudioDeviceInfo {
                is_default: default_name.as_ref() == Some(&name),
                name,
            });
        }
    }
    if devices.is_empty() {
        anyhow::bail!("no audio input devices found");
    }
    Ok(devices)
}

/// Microphone-only capture backend over cpal.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CaptureBackend for CpalBackend {
    async fn acquire(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, SessionError> {
        if constraints.video {
            return Err(SessionError::Unsupported(
                "this backend captures microphone audio only".to_string(),
            ));
        }
        if !constraints.audio {
            return Err(SessionError::Unsupported(
                "constraints request no capturable tracks".to_string(),
            ));
        }

        let host = cpal::default_host();
        let device = match &constraints.device_name {
            Some(name) => host
                .input_devices()
                .map_err(|err| {
                    SessionError::PermissionDenied(format!(
                        "could not enumerate input devices: {err}"
                    ))
                })?
                .find(|d| {
                    d.description()
                        .ok()
                        .map(|desc| desc.to_string())
                        .as_deref()
                        == Some(name)
                })
                .ok_or_else(|| {
                    SessionError::Unsupported(format!("input device '{name}' not found"))
                })?,
            None => host.default_input_device().ok_or_else(|| {
                SessionError::Unsupported("no audio input device available".to_string())
            })?,
        };

        let config = device.default_input_config().map_err(|err| {
            SessionError::PermissionDenied(format!("could not open the input device: {err}"))
        })?;

        Ok(Box::new(CpalMediaStream {
            device,
            config,
            live: true,
            active_stop: None,
        }))
    }

    fn is_format_supported(&self, mime_type: &str) -> bool {
        matches!(
            mime_essence(mime_type),
            "audio/mpeg" | "audio/mp3"
        )
    }
}

struct CpalMediaStream {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    live: bool,
    /// Stop handle of the most recent encoding run, so releasing the tracks
    /// also ends a run that was never finalized.
    active_stop: Option<std_mpsc::Sender<()>>,
}

impl MediaStream for CpalMediaStream {
    fn start_encoder(
        &mut self,
        options: &EncodeOptions,
    ) -> Result<Box<dyn RunningEncoder>, SessionError> {
        if !self.live {
            return Err(SessionError::Unsupported(
                "capture stream already released".to_string(),
            ));
        }
        if let Some(requested) = options.mime_type.as_deref() {
            if !matches!(mime_essence(requested), "audio/mpeg" | "audio/mp3") {
                crate::diag!("requested format {requested} unavailable, recording {MP3_MIME_TYPE}");
            }
        }

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel::<RecordingChunk>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), String>>();

        let worker = EncoderWorker {
            device: self.device.clone(),
            config: self.config.clone(),
            timeslice: options.timeslice,
            bits_per_second: options.bits_per_second,
            chunk_tx,
            stop_rx,
            ready_tx,
        };
        thread::Builder::new()
            .name("greenroom-capture".to_string())
            .spawn(move || worker.run())
            .map_err(|err| {
                SessionError::Unsupported(format!("could not spawn capture thread: {err}"))
            })?;

        // The worker reports once the device stream is playing (or failed
        // to build); startup is fast, the timeout is a backstop.
        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {}
            Ok(Err(detail)) => return Err(SessionError::PermissionDenied(detail)),
            Err(_) => {
                return Err(SessionError::PermissionDenied(
                    "timed out waiting for the input device".to_string(),
                ));
            }
        }

        self.active_stop = Some(stop_tx.clone());
        Ok(Box::new(CpalEncoder {
            mime_type: MP3_MIME_TYPE.to_string(),
            chunk_rx,
            stop_tx: Some(stop_tx),
        }))
    }

    fn stop_tracks(&mut self) {
        if let Some(stop) = self.active_stop.take() {
            let _ = stop.send(());
        }
        self.live = false;
    }

    fn is_live(&self) -> bool {
        self.live
    }
}

struct CpalEncoder {
    mime_type: String,
    chunk_rx: mpsc::UnboundedReceiver<RecordingChunk>,
    stop_tx: Option<std_mpsc::Sender<()>>,
}

#[async_trait]
impl RunningEncoder for CpalEncoder {
    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn next_chunk(&mut self) -> Option<RecordingChunk> {
        self.chunk_rx.recv().await
    }

    fn finalize(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for CpalEncoder {
    fn drop(&mut self) {
        self.finalize();
    }
}

/// Everything the capture thread needs; the `cpal::Stream` itself is built
/// and dropped entirely inside [`EncoderWorker::run`].
struct EncoderWorker {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    timeslice: Duration,
    bits_per_second: u32,
    chunk_tx: mpsc::UnboundedSender<RecordingChunk>,
    stop_rx: std_mpsc::Receiver<()>,
    ready_tx: std_mpsc::Sender<Result<(), String>>,
}

impl EncoderWorker {
    fn run(self) {
        let sample_rate = self.config.sample_rate();
        let channels = self.config.channels();

        let mut encoder = match build_lame_encoder(sample_rate, self.bits_per_second) {
            Ok(encoder) => encoder,
            Err(detail) => {
                let _ = self.ready_tx.send(Err(detail));
                return;
            }
        };

        let (samples_tx, samples_rx) = std_mpsc::channel::<Vec<f32>>();
        let stream = match build_input_stream(
            &self.device,
            &self.config.config(),
            self.config.sample_format(),
            channels,
            samples_tx,
        ) {
            Ok(stream) => stream,
            Err(detail) => {
                let _ = self.ready_tx.send(Err(detail));
                return;
            }
        };
        if let Err(err) = stream.play() {
            let _ = self.ready_tx.send(Err(format!("could not start capture: {err}")));
            return;
        }
        let _ = self.ready_tx.send(Ok(()));

        let mut pending: Vec<f32> = Vec::new();
        let mut next_emit = Instant::now() + self.timeslice;
        loop {
            match self.stop_rx.try_recv() {
                Ok(()) | Err(std_mpsc::TryRecvError::Disconnected) => break,
                Err(std_mpsc::TryRecvError::Empty) => {}
            }

            let now = Instant::now();
            if now >= next_emit {
                self.emit(&mut encoder, &mut pending);
                next_emit = now + self.timeslice;
            }

            let wait = next_emit
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(50));
            match samples_rx.recv_timeout(wait.max(Duration::from_millis(1))) {
                Ok(batch) => pending.extend_from_slice(&batch),
                Err(std_mpsc::RecvTimeoutError::Timeout) => {}
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        // Stop capturing, pick up anything the callback already delivered,
        // then flush the encoder's tail into one last fragment.
        drop(stream);
        while let Ok(batch) = samples_rx.try_recv() {
            pending.extend_from_slice(&batch);
        }
        self.emit(&mut encoder, &mut pending);
        match flush_lame_encoder(&mut encoder) {
            Ok(tail) if !tail.is_empty() => {
                let _ = self.chunk_tx.send(tail);
            }
            Ok(_) => {}
            Err(detail) => crate::diag!("mp3 flush failed: {detail}"),
        }
    }

    fn emit(&self, encoder: &mut mp3lame_encoder::Encoder, pending: &mut Vec<f32>) {
        if pending.is_empty() {
            return;
        }
        let samples = samples_to_i16(pending);
        pending.clear();
        match encode_lame_batch(encoder, &samples) {
            Ok(chunk) if !chunk.is_empty() => {
                let _ = self.chunk_tx.send(chunk);
            }
            Ok(_) => {}
            Err(detail) => crate::diag!("mp3 encode failed: {detail}"),
        }
    }
}

/// Build the input stream for whichever sample format the device reports,
/// downmixing every callback batch to mono f32.
fn build_input_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    channels: u16,
    tx: std_mpsc::Sender<Vec<f32>>,
) -> Result<cpal::Stream, String> {
    match sample_format {
        cpal::SampleFormat::F32 => build_typed_stream::<f32>(device, config, channels, tx),
        cpal::SampleFormat::I16 => build_typed_stream::<i16>(device, config, channels, tx),
        cpal::SampleFormat::U16 => build_typed_stream::<u16>(device, config, channels, tx),
        other => Err(format!("unsupported sample format {other:?}")),
    }
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: u16,
    tx: std_mpsc::Sender<Vec<f32>>,
) -> Result<cpal::Stream, String>
where
    T: cpal::Sample + cpal::SizedSample,
    f32: cpal::FromSample<T>,
{
    let err_fn = |err| {
        crate::diag!("audio stream error (non-fatal): {err}");
    };
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<f32> =
                    data.iter().map(|&s| cpal::Sample::from_sample(s)).collect();
                let mono = downmix_mono(&samples, channels);
                let _ = tx.send(mono);
            },
            err_fn,
            None,
        )
        .map_err(|err| format!("could not open capture stream: {err}"))
}

/// Average all channels of interleaved audio down to mono.
fn downmix_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn samples_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

fn build_lame_encoder(
    sample_rate: u32,
    bits_per_second: u32,
) -> Result<mp3lame_encoder::Encoder, String> {
    let mut builder =
        Builder::new().ok_or_else(|| "failed to create LAME builder".to_string())?;
    builder
        .set_num_channels(1)
        .map_err(|err| format!("failed to set channels: {err:?}"))?;
    builder
        .set_sample_rate(sample_rate)
        .map_err(|err| format!("failed to set sample rate: {err:?}"))?;
    builder
        .set_brate(lame_bitrate(bits_per_second))
        .map_err(|err| format!("failed to set bitrate: {err:?}"))?;
    builder
        .set_quality(mp3lame_encoder::Quality::Best)
        .map_err(|err| format!("failed to set quality: {err:?}"))?;
    builder
        .build()
        .map_err(|err| format!("failed to initialize LAME encoder: {err:?}"))
}

fn encode_lame_batch(
    encoder: &mut mp3lame_encoder::Encoder,
    samples: &[i16],
) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    out.reserve(mp3lame_encoder::max_required_buffer_size(samples.len()));
    let written = encoder
        .encode(MonoPcm(samples), out.spare_capacity_mut())
        .map_err(|err| format!("mp3 encode error: {err:?}"))?;
    // SAFETY: encode reports how many bytes of the spare capacity it
    // initialized.
    unsafe { out.set_len(written) };
    Ok(out)
}

fn flush_lame_encoder(encoder: &mut mp3lame_encoder::Encoder) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    out.reserve(mp3lame_encoder::max_required_buffer_size(0));
    let written = encoder
        .flush::<FlushNoGap>(out.spare_capacity_mut())
        .map_err(|err| format!("mp3 flush error: {err:?}"))?;
    // SAFETY: flush reports how many bytes of the spare capacity it
    // initialized.
    unsafe { out.set_len(written) };
    Ok(out)
}

fn mime_essence(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or("").trim()
}

/// Clamp the requested bitrate ceiling to what LAME offers.
fn lame_bitrate(bits_per_second: u32) -> mp3lame_encoder::Bitrate {
    use mp3lame_encoder::Bitrate;
    match bits_per_second {
        0..=64_000 => Bitrate::Kbps64,
        64_001..=96_000 => Bitrate::Kbps96,
        96_001..=128_000 => Bitrate::Kbps128,
        128_001..=192_000 => Bitrate::Kbps192,
        192_001..=256_000 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let stereo = vec![0.5, 0.3, 0.8, 0.2, 1.0, 0.0];
        let mono = downmix_mono(&stereo, 2);
        assert_eq!(mono.len(), 3);
        assert!((mono[0] - 0.4).abs() < 0.001);
        assert!((mono[1] - 0.5).abs() < 0.001);
        assert!((mono[2] - 0.5).abs() < 0.001);
    }

    #[test]
    fn i16_conversion_clamps() {
        let samples = samples_to_i16(&[0.0, 1.0, -1.0, 2.0, -2.0]);
        assert_eq!(samples[0], 0);
        assert_eq!(samples[1], i16::MAX);
        assert_eq!(samples[3], i16::MAX);
        assert_eq!(samples[4], -i16::MAX);
    }

    #[test]
    fn bitrate_ceiling_is_clamped() {
        use mp3lame_encoder::Bitrate;
        assert!(matches!(lame_bitrate(64_000), Bitrate::Kbps64));
        assert!(matches!(lame_bitrate(128_000), Bitrate::Kbps128));
        assert!(matches!(lame_bitrate(1_500_000), Bitrate::Kbps320));
    }

    #[test]
    fn backend_supports_mp3_only() {
        let backend = CpalBackend::new();
        assert!(backend.is_format_supported("audio/mpeg"));
        assert!(backend.is_format_supported("audio/mp3"));
        assert!(!backend.is_format_supported("audio/ogg;codecs=opus"));
        assert!(!backend.is_format_supported("video/webm"));
    }
}
