//! Run correlation
//!
//! Matches a submitted command to the oracle run it started by reading the
//! run id out of the correlation event in the transaction receipt.

use crate::protocol;
use crate::run_id::RunId;
use thiserror::Error;

/// Final status of a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptStatus {
    Success,
    Failure,
}

/// One emitted log: its topic and its remaining indexed fields, as
/// lower-case `0x` hex words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub topic: String,
    pub fields: Vec<String>,
}

impl Event {
    pub fn new(topic: impl Into<String>, fields: Vec<String>) -> Self {
        Self {
            topic: topic.into(),
            fields,
        }
    }
}

/// Outcome of a finalized transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub status: ReceiptStatus,
    pub events: Vec<Event>,
}

impl Receipt {
    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// Errors from correlating a receipt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("Transaction reverted")]
    TransactionFailed,

    #[error("Receipt carries no correlation event")]
    MissingRunId,

    #[error("Malformed run id {raw:?}: {reason}")]
    MalformedRunId { raw: String, reason: String },
}

/// Extract the run id from a receipt.
///
/// A failed receipt is rejected before its events are looked at. Otherwise
/// the first event carrying the correlation topic wins.
pub fn correlate(receipt: &Receipt) -> Result<RunId, CorrelationError> {
    if !receipt.is_success() {
        return Err(CorrelationError::TransactionFailed);
    }

    let event = receipt
        .events
        .iter()
        .find(|e| e.topic == protocol::CORRELATION_TOPIC)
        .ok_or(CorrelationError::MissingRunId)?;

    let raw = event
        .fields
        .first()
        .ok_or_else(|| CorrelationError::MalformedRunId {
            raw: String::new(),
            reason: "correlation event has no indexed fields".into(),
        })?;

    RunId::from_hex(raw).map_err(|e| CorrelationError::MalformedRunId {
        raw: raw.clone(),
        reason: e.to_string(),
    })
}
