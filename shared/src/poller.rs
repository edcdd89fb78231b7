//! Response polling
//!
//! The oracle answers asynchronously, so after correlation the session reads
//! the agent's stored response until it appears. The loop is bounded by
//! [`PollPolicy`] and can be cancelled from outside through a [`CancelSignal`].

use crate::ledger::ResponseSource;
use crate::protocol;
use crate::run_id::RunId;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace, warn};

/// Bounds and cadence of a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two reads
    pub interval: Duration,
    /// Maximum number of reads, `None` for no limit
    pub max_attempts: Option<u32>,
    /// Maximum total wait, `None` for no limit
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: protocol::POLL_INTERVAL,
            max_attempts: None,
            max_wait: Some(protocol::POLL_MAX_WAIT),
        }
    }
}

impl PollPolicy {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }
}

/// Why a poll loop gave up
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("No response after {attempts} reads ({elapsed:?})")]
    Timeout { attempts: u32, elapsed: Duration },

    #[error("Polling cancelled")]
    Cancelled,
}

/// Triggers cancellation of every [`CancelSignal`] cloned from its pair
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Cooperative cancellation flag observed by poll loops
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a linked cancel handle and signal
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        let (_, signal) = cancellation();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested; pends forever if the handle
    /// is dropped without cancelling
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Read the response for `run_id` until it is present.
///
/// Read failures are logged and retried. Cancellation is honoured before
/// every read, during a read and during the sleep between reads.
pub async fn poll<R>(
    run_id: &RunId,
    source: &R,
    policy: &PollPolicy,
    cancel: &CancelSignal,
) -> Result<String, PollError>
where
    R: ResponseSource + ?Sized,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            debug!("Poll for run {} cancelled after {} reads", run_id, attempts);
            return Err(PollError::Cancelled);
        }

        if policy.max_attempts == Some(0) {
            return Err(PollError::Timeout {
                attempts,
                elapsed: started.elapsed(),
            });
        }

        if let Some(max_wait) = policy.max_wait {
            if attempts > 0 && started.elapsed() >= max_wait {
                return Err(PollError::Timeout {
                    attempts,
                    elapsed: started.elapsed(),
                });
            }
        }

        attempts += 1;

        let read = tokio::select! {
            read = source.read_response(run_id) => read,
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
        };

        match read {
            Ok(raw) if raw.present => {
                debug!("Run {} answered after {} reads", run_id, attempts);
                return Ok(raw.value);
            }
            Ok(_) => {
                trace!("Run {} not answered yet (read {})", run_id, attempts);
            }
            Err(e) => {
                warn!("Read for run {} failed, retrying: {}", run_id, e);
            }
        }

        if let Some(max_attempts) = policy.max_attempts {
            if attempts >= max_attempts {
                return Err(PollError::Timeout {
                    attempts,
                    elapsed: started.elapsed(),
                });
            }
        }

        let mut delay = policy.interval;
        if let Some(max_wait) = policy.max_wait {
            delay = delay.min(max_wait.saturating_sub(started.elapsed()));
        }

        tokio::select! {
            _ = sleep(delay) => {}
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
        }
    }
}
