//! Command session
//!
//! One session runs one command through the whole protocol:
//!
//! ```text
//! Created -> Submitting -> AwaitingReceipt -> Correlating -> Polling -> Decoding -> Completed
//!    |            |               |                |            |
//!    +------------+---------------+----------------+------------+--> Failed
//! ```
//!
//! Transitions only move forward. A session owns at most one submission and
//! shares nothing with other sessions except the read-only directory.

use crate::correlator::{correlate, CorrelationError};
use crate::decoder::{decode, Action};
use crate::directory::DeviceDirectory;
use crate::ledger::{AgentLedger, LedgerError};
use crate::poller::{poll, CancelSignal, PollError, PollPolicy};
use crate::run_id::RunId;
use crate::{Command, Submission};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Where a session is in the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Submitting,
    AwaitingReceipt,
    Correlating,
    Polling,
    Decoding,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    /// Check if a session may move from `self` to `next`
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;

        match (self, next) {
            (Created, Submitting) => true,
            (Submitting, AwaitingReceipt) => true,
            (AwaitingReceipt, Correlating) => true,
            (Correlating, Polling) => true,
            (Polling, Decoding) => true,
            (Decoding, Completed) => true,

            // Decoding is total, so it has no failure exit
            (Created | Submitting | AwaitingReceipt | Correlating | Polling, Failed) => true,

            _ => false,
        }
    }
}

/// Terminal failure of a session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Submission failed: {0}")]
    Submission(#[source] LedgerError),

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Receipt carries no run id")]
    MissingRunId,

    #[error("Malformed run id {raw:?}: {reason}")]
    MalformedRunId { raw: String, reason: String },

    #[error("No agent response after {attempts} reads ({elapsed:?})")]
    Timeout { attempts: u32, elapsed: Duration },

    #[error("Session cancelled while waiting for the agent response")]
    Cancelled,
}

impl SessionError {
    /// Text shown to the person who sent the command
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::Submission(_) => "Internal Server Error",
            SessionError::TransactionFailed { .. } => "ERROR: Transaction Reverted",
            SessionError::MissingRunId => "ERROR: Missing run ID",
            SessionError::MalformedRunId { .. } => "ERROR: Malformed run ID",
            SessionError::Timeout { .. } => "ERROR: Timed out waiting for the agent response",
            SessionError::Cancelled => "Cancelled",
        }
    }
}

impl From<CorrelationError> for SessionError {
    fn from(e: CorrelationError) -> Self {
        match e {
            CorrelationError::TransactionFailed => SessionError::TransactionFailed {
                reason: "transaction reverted".into(),
            },
            CorrelationError::MissingRunId => SessionError::MissingRunId,
            CorrelationError::MalformedRunId { raw, reason } => {
                SessionError::MalformedRunId { raw, reason }
            }
        }
    }
}

impl From<PollError> for SessionError {
    fn from(e: PollError) -> Self {
        match e {
            PollError::Timeout { attempts, elapsed } => SessionError::Timeout { attempts, elapsed },
            PollError::Cancelled => SessionError::Cancelled,
        }
    }
}

/// Progress notifications emitted while a session runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged { from: SessionState, to: SessionState },
    Correlated { run_id: RunId },
}

/// Everything a finished session knows about itself
#[derive(Debug)]
pub struct SessionReport {
    pub state: SessionState,
    /// Present once the ledger accepted the command
    pub submission: Option<Submission>,
    pub run_id: Option<RunId>,
    pub outcome: Result<Action, SessionError>,
}

/// Runs one command against the agent
pub struct CommandSession<'a, L: AgentLedger + ?Sized> {
    command: Command,
    ledger: &'a L,
    directory: &'a DeviceDirectory,
    policy: PollPolicy,
    cancel: CancelSignal,
    events: Option<mpsc::UnboundedSender<SessionEvent>>,
    state: SessionState,
    submission: Option<Submission>,
    run_id: Option<RunId>,
}

impl<'a, L: AgentLedger + ?Sized> CommandSession<'a, L> {
    /// Create a session in the `Created` state
    pub fn new(command: Command, ledger: &'a L, directory: &'a DeviceDirectory) -> Self {
        Self {
            command,
            ledger,
            directory,
            policy: PollPolicy::default(),
            cancel: CancelSignal::never(),
            events: None,
            state: SessionState::Created,
            submission: None,
            run_id: None,
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send progress notifications to `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion and return the decoded action
    pub async fn execute(self) -> Result<Action, SessionError> {
        self.run().await.outcome
    }

    /// Run the session to completion and report its final state
    pub async fn run(mut self) -> SessionReport {
        let outcome = self.drive().await;

        match &outcome {
            Ok(action) => {
                self.advance(SessionState::Completed);
                info!("Command {:?} completed: {}", self.command.text, action);
            }
            Err(e) => {
                self.advance(SessionState::Failed);
                error!("Command {:?} failed: {}", self.command.text, e);
            }
        }

        SessionReport {
            state: self.state,
            submission: self.submission,
            run_id: self.run_id,
            outcome,
        }
    }

    async fn drive(&mut self) -> Result<Action, SessionError> {
        let ledger = self.ledger;

        // Nothing may reach the ledger once cancellation was requested
        if self.cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        self.advance(SessionState::Submitting);
        let handle = ledger
            .submit(&self.command.text)
            .await
            .map_err(SessionError::Submission)?;
        debug!("Submitted {:?} as {}", self.command.text, handle);
        self.submission = Some(Submission {
            command: self.command.clone(),
            handle: handle.clone(),
        });

        self.advance(SessionState::AwaitingReceipt);
        let receipt = ledger
            .await_receipt(&handle)
            .await
            .map_err(|e| SessionError::TransactionFailed {
                reason: e.to_string(),
            })?;
        if !receipt.is_success() {
            return Err(SessionError::TransactionFailed {
                reason: format!("transaction {} reverted", handle),
            });
        }

        self.advance(SessionState::Correlating);
        let run_id = correlate(&receipt)?;
        debug!("Submission {} started run {}", handle, run_id);
        self.run_id = Some(run_id.clone());
        self.emit(SessionEvent::Correlated {
            run_id: run_id.clone(),
        });

        self.advance(SessionState::Polling);
        let raw = poll(&run_id, ledger, &self.policy, &self.cancel).await?;

        self.advance(SessionState::Decoding);
        Ok(decode(&raw, self.directory))
    }

    fn advance(&mut self, next: SessionState) {
        let from = self.state;
        debug_assert!(
            from.can_advance_to(next),
            "invalid session transition {:?} -> {:?}",
            from,
            next
        );
        debug!("Session {:?} -> {:?}", from, next);
        self.state = next;
        self.emit(SessionEvent::StateChanged { from, to: next });
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            // Nobody listening is fine
            let _ = events.send(event);
        }
    }
}
