//! Terminal-state polling of the remote interview record.
//!
//! The poller starts only after a successful queue transition, fetches at a
//! fixed interval, swallows transient fetch failures, and stops permanently
//! on a terminal status or on teardown. Teardown is a synchronous task
//! abort, so no tick can fire afterwards.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::api::{InterviewRecord, InterviewService};

/// Polling cadence and budget.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay between fetches.
    pub interval: Duration,
    /// Total wall-clock budget; `None` polls until terminal, however long
    /// that takes.
    pub max_wait: Option<Duration>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1500),
            max_wait: Some(Duration::from_secs(600)),
        }
    }
}

/// How a polling run ended.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The record reached `complete` or `failed`.
    Terminal(InterviewRecord),
    /// The wall-clock budget ran out first.
    TimedOut,
}

/// A running polling task. Dropping or [`StatusPoller::shutdown`] aborts it.
pub struct StatusPoller {
    task: JoinHandle<()>,
    updates: watch::Receiver<Option<InterviewRecord>>,
    outcome: oneshot::Receiver<PollOutcome>,
}

impl StatusPoller {
    /// Start polling `interview_id` until a terminal status or the budget.
    pub fn spawn(
        service: Arc<dyn InterviewService>,
        interview_id: String,
        config: PollerConfig,
    ) -> Self {
        let (update_tx, updates) = watch::channel(None);
        let (outcome_tx, outcome) = oneshot::channel();

        let task = tokio::spawn(async move {
            let deadline = config.max_wait.map(|wait| Instant::now() + wait);
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first fetch happens one interval after the queue
            // transition, not immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        let _ = outcome_tx.send(PollOutcome::TimedOut);
                        return;
                    }
                }
                match service.fetch_interview(&interview_id).await {
                    Ok(record) => {
                        let terminal = record.status.is_terminal();
                        let _ = update_tx.send(Some(record.clone()));
                        if terminal {
                            let _ = outcome_tx.send(PollOutcome::Terminal(record));
                            return;
                        }
                    }
                    Err(err) => {
                        // Transient by definition; retried on the next tick.
                        crate::diag!("poll fetch failed, retrying: {err:#}");
                    }
                }
            }
        });

        Self {
            task,
            updates,
            outcome,
        }
    }

    /// Every record the poller has fetched so far, latest value wins.
    pub fn updates(&self) -> watch::Receiver<Option<InterviewRecord>> {
        self.updates.clone()
    }

    /// Wait for the run to end. `None` means the poller was torn down
    /// before reaching an outcome.
    pub async fn wait(mut self) -> Option<PollOutcome> {
        (&mut self.outcome).await.ok()
    }

    /// Synchronous teardown; no request is issued afterwards.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
