//! Smart Home Agent Shared Protocol
//!
//! This crate implements the command/response correlation protocol used by
//! both front-ends (the interactive client and the chat bot):
//! submit a natural-language command to the on-chain agent, derive the run id
//! from the transaction receipt, poll the agent until the oracle has written a
//! response for that run, and decode the response into a device action.

pub mod address;
pub mod config;
pub mod correlator;
pub mod decoder;
pub mod directory;
pub mod ledger;
pub mod poller;
pub mod projector;
pub mod rpc;
pub mod run_id;
pub mod session;

pub use address::{Address, AddressError};
pub use config::LedgerConfig;
pub use correlator::{correlate, CorrelationError, Event, Receipt, ReceiptStatus};
pub use decoder::{decode, Action};
pub use directory::{DeviceDirectory, DeviceRecord, DirectoryError};
pub use ledger::{AgentLedger, LedgerError, LightRegistry, RawResult, ResponseSource, SubmissionHandle};
pub use poller::{cancellation, poll, CancelHandle, CancelSignal, PollError, PollPolicy};
pub use projector::{snapshot, LightSnapshot, LightState, SnapshotError, StatusBoard};
pub use rpc::RpcLedger;
pub use run_id::{RunId, RunIdError};
pub use session::{CommandSession, SessionError, SessionEvent, SessionReport, SessionState};

/// Protocol vocabulary shared with the deployed agent contract
pub mod protocol {
    use std::time::Duration;

    /// Topic of the event the agent emits for every `sendMessage` call.
    /// The run id is its first indexed field.
    pub const CORRELATION_TOPIC: &str =
        "0x03551b986d041cbc5634e1ecf13ea7eb57c58e6ed33c521fc03c6f524e128317";

    /// Oracle response prefix: switch the light on
    pub const TURN_ON_PREFIX: &str = "TGLOON:";

    /// Oracle response prefix: switch the light off
    pub const TURN_OFF_PREFIX: &str = "TGLOFF:";

    /// `sendMessage(string)`
    pub const SEND_MESSAGE_SELECTOR: [u8; 4] = [0x46, 0x9c, 0x81, 0x10];

    /// `messageResponse(uint256) returns (string)`
    pub const MESSAGE_RESPONSE_SELECTOR: [u8; 4] = [0x16, 0x6e, 0x81, 0x22];

    /// `lights(address) returns (address, string, bool)`
    pub const LIGHTS_SELECTOR: [u8; 4] = [0xa0, 0x57, 0x7a, 0x03];

    /// Galadriel devnet
    pub const DEFAULT_CHAIN_ID: u64 = 696969;
    pub const DEFAULT_RPC_URL: &str = "https://devnet.galadriel.com";

    pub const DEFAULT_AGENT_ADDRESS: &str = "0xF834cF13Bb85b28937cc31Db7Ab0a1820412C02a";
    pub const DEFAULT_REGISTRY_ADDRESS: &str = "0x9a312aDFEA6A91eefdb8c7396F820d9B6460B5b2";

    /// Delay between two reads of the agent response
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Upper bound on the time spent waiting for one response
    pub const POLL_MAX_WAIT: Duration = Duration::from_secs(120);

    /// Lights known to the registry, in display order
    pub const DEFAULT_DEVICES: &[(&str, &str)] = &[
        ("0xC95A792EAa763e2a421D4e69028Bda89a8562Ca5", "Bedroom 1"),
        ("0xf4c775745dcB4bA888FE63F17bF03D28DBA54294", "Bedroom 2"),
        ("0x60112a38Cb7a165D7089aAF43f77A5d53eFC1286", "Bedroom 3"),
        ("0xb1956626438724c69Df340406795D404AD774f90", "Living Room"),
        ("0xA79ae97452A4c5aCb92419fe3be3CbD3a7a17364", "Play Zone"),
        ("0x1F5C3E486DB709edd174fc4763AC4D645CB1E600", "Workspace"),
    ];
}

/// A natural-language command typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub text: String,
}

impl Command {
    /// Create a command from user input
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// True when the input holds nothing worth sending to the agent
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A command that the ledger accepted and whose outcome is still pending
#[derive(Debug, Clone)]
pub struct Submission {
    pub command: Command,
    pub handle: SubmissionHandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_blank() {
        assert!(Command::new("   ").is_blank());
        assert!(Command::new("").is_blank());
        assert!(!Command::new("turn on the workspace light").is_blank());
    }

    #[test]
    fn test_default_devices_parse_as_addresses() {
        for (device_id, _) in protocol::DEFAULT_DEVICES {
            assert!(device_id.parse::<Address>().is_ok(), "{device_id}");
        }
        assert!(protocol::DEFAULT_AGENT_ADDRESS.parse::<Address>().is_ok());
        assert!(protocol::DEFAULT_REGISTRY_ADDRESS.parse::<Address>().is_ok());
    }

    #[test]
    fn test_correlation_topic_is_lowercase_word() {
        let digits = protocol::CORRELATION_TOPIC.trim_start_matches("0x");
        assert_eq!(digits.len(), 64);
        assert_eq!(digits, digits.to_ascii_lowercase());
    }
}
