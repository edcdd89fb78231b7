//! In-memory smart home for bot and connection tests

use async_trait::async_trait;
use smarthome_shared::{
    protocol, AgentLedger, Event, LedgerError, LightRegistry, RawResult, Receipt, ReceiptStatus,
    ResponseSource, RunId, SubmissionHandle,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// Answers every command with a fixed response and keeps light state
pub struct FakeHome {
    pub answer: String,
    pub revert: bool,
    pub registry_down: AtomicBool,
    pub submits: AtomicU32,
    lights: Mutex<HashMap<String, bool>>,
}

impl FakeHome {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.into(),
            revert: false,
            registry_down: AtomicBool::new(false),
            submits: AtomicU32::new(0),
            lights: Mutex::new(HashMap::new()),
        }
    }

    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponseSource for FakeHome {
    async fn read_response(&self, _run_id: &RunId) -> Result<RawResult, LedgerError> {
        Ok(RawResult::ready(self.answer.clone()))
    }
}

#[async_trait]
impl AgentLedger for FakeHome {
    async fn submit(&self, _command_text: &str) -> Result<SubmissionHandle, LedgerError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if let Some(device) = self.answer.strip_prefix(protocol::TURN_ON_PREFIX) {
            self.lights.lock().unwrap().insert(device.to_lowercase(), true);
        }
        Ok(SubmissionHandle::new("0x01"))
    }

    async fn await_receipt(&self, _handle: &SubmissionHandle) -> Result<Receipt, LedgerError> {
        let status = if self.revert {
            ReceiptStatus::Failure
        } else {
            ReceiptStatus::Success
        };
        Ok(Receipt {
            status,
            events: vec![Event::new(protocol::CORRELATION_TOPIC, vec!["0x2a".to_string()])],
        })
    }
}

#[async_trait]
impl LightRegistry for FakeHome {
    async fn light_state(&self, device_id: &str) -> Result<bool, LedgerError> {
        if self.registry_down.load(Ordering::SeqCst) {
            return Err(LedgerError::Other("registry unreachable".into()));
        }
        Ok(self
            .lights
            .lock()
            .unwrap()
            .get(&device_id.to_lowercase())
            .copied()
            .unwrap_or(false))
    }
}
