//! Collaborator traits for the agent contract and the light registry
//!
//! Front-ends bind these to their own transport; the protocol code in this
//! crate only ever talks to the traits.

use crate::address::AddressError;
use crate::correlator::Receipt;
use crate::rpc::abi::AbiError;
use crate::run_id::{RunId, RunIdError};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by ledger collaborators
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed RPC response: {0}")]
    Malformed(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("ABI decode error: {0}")]
    Abi(#[from] AbiError),

    #[error("Invalid address: {0}")]
    Address(#[from] AddressError),

    #[error("Invalid run id: {0}")]
    RunId(#[from] RunIdError),

    #[error("No sender account configured")]
    NoSender,

    #[error("No receipt after {0:?}")]
    ReceiptTimeout(Duration),

    #[error("Batch request failed: {0}")]
    BatchFailed(String),

    #[error("{0}")]
    Other(String),
}

/// Opaque reference to a submitted transaction (its hash)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionHandle(String);

impl SubmissionHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubmissionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one read of the agent response for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResult {
    pub value: String,
    pub present: bool,
}

impl RawResult {
    /// The oracle has not answered yet
    pub fn pending() -> Self {
        Self {
            value: String::new(),
            present: false,
        }
    }

    pub fn ready(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            present: true,
        }
    }

    /// The agent stores an empty string until the oracle answers
    pub fn from_stored(value: String) -> Self {
        if value.is_empty() {
            Self::pending()
        } else {
            Self::ready(value)
        }
    }
}

/// Read side of the agent: the stored response for a run
#[async_trait]
pub trait ResponseSource: Send + Sync {
    /// Single read; failures are treated as transient by the poller
    async fn read_response(&self, run_id: &RunId) -> Result<RawResult, LedgerError>;
}

/// The agent contract as seen by a command session
#[async_trait]
pub trait AgentLedger: ResponseSource {
    /// Transmit the command text to the agent
    async fn submit(&self, command_text: &str) -> Result<SubmissionHandle, LedgerError>;

    /// Suspend until the submission is finalized
    async fn await_receipt(&self, handle: &SubmissionHandle) -> Result<Receipt, LedgerError>;
}

/// Registry holding the on/off state of every light
#[async_trait]
pub trait LightRegistry: Send + Sync {
    /// Read one light
    async fn light_state(&self, device_id: &str) -> Result<bool, LedgerError>;

    /// Read several lights, one result per id in the same order.
    ///
    /// The default issues every read concurrently; transports that can batch
    /// should override it.
    async fn light_states(&self, device_ids: &[String]) -> Vec<Result<bool, LedgerError>> {
        futures::future::join_all(device_ids.iter().map(|id| self.light_state(id))).await
    }
}
