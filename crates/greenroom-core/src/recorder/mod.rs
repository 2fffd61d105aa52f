//! Chunked recording engine with duration bounds.
//!
//! State machine: `Idle -> Armed -> Recording -> Stopped`. Only `Armed` may
//! transition to `Recording`, only `Recording` to `Stopped`; re-recording
//! goes back through `Armed`. One drive task per run owns the chunk stream,
//! the hard-stop timer and the remaining-time tick; aborting the task clears
//! every timer with it.

pub mod format;

use std::time::{Duration, Instant};

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::capture::{EncodeOptions, MediaStream};
use crate::clip::{Clip, RecordingChunk};
use crate::error::SessionError;

/// Where the engine currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    /// Stream ready, format picked, waiting for start.
    Armed,
    Recording,
    Stopped,
}

/// Tunables for a recording run.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Hard ceiling on run length; the hard-stop timer fires once here.
    pub max_duration: Duration,
    /// Cadence at which the encoder emits fragments.
    pub timeslice: Duration,
    /// Cadence at which remaining time is recomputed for UI feedback.
    pub tick_interval: Duration,
    /// Bitrate ceiling suited to short clips.
    pub bits_per_second: u32,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(60),
            timeslice: Duration::from_millis(250),
            tick_interval: Duration::from_millis(200),
            bits_per_second: 1_500_000,
        }
    }
}

struct ActiveRun {
    task: JoinHandle<()>,
    stop_tx: Option<oneshot::Sender<()>>,
    clip_rx: oneshot::Receiver<Clip>,
    remaining_rx: watch::Receiver<Duration>,
}

/// Drives one chunked recording at a time.
pub struct RecorderEngine {
    config: RecorderConfig,
    state: RecorderState,
    requested_mime: Option<String>,
    run: Option<ActiveRun>,
}

impl RecorderEngine {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            state: RecorderState::Idle,
            requested_mime: None,
            run: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Declare the stream ready and fix the negotiated format for the next
    /// run. Valid from `Idle` and from `Stopped` (re-record); a call while
    /// `Recording` is ignored.
    pub fn arm(&mut self, negotiated_mime: Option<String>) {
        if self.state == RecorderState::Recording {
            return;
        }
        self.requested_mime = negotiated_mime;
        self.state = RecorderState::Armed;
    }

    /// Begin recording. Valid only from `Armed`; anything else is a no-op
    /// returning `false`.
    pub fn start(&mut self, stream: &mut dyn MediaStream) -> Result<bool, SessionError> {
        if self.state != RecorderState::Armed {
            return Ok(false);
        }

        let options = EncodeOptions {
            mime_type: self.requested_mime.clone(),
            timeslice: self.config.timeslice,
            bits_per_second: self.config.bits_per_second,
        };
        let mut encoder = stream.start_encoder(&options)?;
        let mime = encoder.mime_type().to_string();

        let max_duration = self.config.max_duration;
        let tick_interval = self.config.tick_interval;
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (clip_tx, clip_rx) = oneshot::channel::<Clip>();
        let (remaining_tx, remaining_rx) = watch::channel(max_duration);

        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut chunks: Vec<RecordingChunk> = Vec::new();

            let hard_stop = tokio::time::sleep(max_duration);
            tokio::pin!(hard_stop);
            let mut tick = tokio::time::interval(tick_interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    chunk = encoder.next_chunk() => match chunk {
                        Some(chunk) => chunks.push(chunk),
                        // Encoder closed on its own; treat it as a stop.
                        None => break,
                    },
                    // Hard-stop and manual stop race for the same exit; the
                    // loser arrives after the loop is gone and is a no-op.
                    _ = &mut hard_stop => break,
                    _ = &mut stop_rx => break,
                    _ = tick.tick() => {
                        let remaining = max_duration.saturating_sub(started.elapsed());
                        let _ = remaining_tx.send(remaining);
                    }
                }
            }

            encoder.finalize();
            while let Some(chunk) = encoder.next_chunk().await {
                chunks.push(chunk);
            }

            crate::diag!(
                "recording finalized: {} chunks after {:?}",
                chunks.len(),
                started.elapsed()
            );
            let _ = clip_tx.send(Clip::from_chunks(chunks, mime));
        });

        self.run = Some(ActiveRun {
            task,
            stop_tx: Some(stop_tx),
            clip_rx,
            remaining_rx,
        });
        self.state = RecorderState::Recording;
        Ok(true)
    }

    /// End the run and collect the clip. Valid only from `Recording`;
    /// anything else returns `None`.
    ///
    /// Works identically whether the run is still going (manual stop) or the
    /// hard-stop timer already ended it: the stop signal to a finished run
    /// is a no-op and the clip is collected either way. A run that captured
    /// zero chunks yields a zero-length clip for the validation gate to
    /// reject.
    pub async fn stop(&mut self) -> Option<Clip> {
        if self.state != RecorderState::Recording {
            return None;
        }
        let mut run = self.run.take()?;
        if let Some(stop_tx) = run.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        let mime = self.requested_mime.clone().unwrap_or_default();
        let clip = run.clip_rx.await.unwrap_or_else(|_| Clip::empty(mime));
        self.state = RecorderState::Stopped;
        Some(clip)
    }

    /// Remaining-time feed for the current run, updated on the tick timer.
    pub fn remaining(&self) -> Option<watch::Receiver<Duration>> {
        self.run.as_ref().map(|run| run.remaining_rx.clone())
    }

    /// Synchronous teardown: aborts the drive task, which clears the
    /// hard-stop and tick timers and drops the encoder.
    pub fn abort(&mut self) {
        if let Some(run) = self.run.take() {
            run.task.abort();
        }
        self.state = RecorderState::Idle;
    }
}

impl Drop for RecorderEngine {
    fn drop(&mut self) {
        self.abort();
    }
}
