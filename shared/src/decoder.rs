//! Oracle response decoder
//!
//! The agent answers with either a toggle instruction (`TGLOON:<device>`,
//! `TGLOFF:<device>`) or free text. Decoding is total: anything that is not
//! a recognised toggle for a known device is passed through as a message.

use crate::directory::{DeviceDirectory, DeviceRecord};
use crate::protocol;
use serde::Serialize;
use std::fmt;

/// What the agent decided to do with a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    TurnOn { device: DeviceRecord },
    TurnOff { device: DeviceRecord },
    Message { text: String },
}

impl Action {
    /// The device a toggle applies to
    pub fn device(&self) -> Option<&DeviceRecord> {
        match self {
            Action::TurnOn { device } | Action::TurnOff { device } => Some(device),
            Action::Message { .. } => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::TurnOn { device } => write!(f, "Turned ON {} light", device.label),
            Action::TurnOff { device } => write!(f, "Turned OFF {} light", device.label),
            Action::Message { text } => f.write_str(text),
        }
    }
}

/// Decode a raw agent response
pub fn decode(raw: &str, directory: &DeviceDirectory) -> Action {
    if let Some(rest) = raw.strip_prefix(protocol::TURN_ON_PREFIX) {
        return match resolve(rest, directory) {
            Some(device) => Action::TurnOn { device },
            None => passthrough(raw),
        };
    }

    if let Some(rest) = raw.strip_prefix(protocol::TURN_OFF_PREFIX) {
        return match resolve(rest, directory) {
            Some(device) => Action::TurnOff { device },
            None => passthrough(raw),
        };
    }

    passthrough(raw)
}

/// The device id is the field right after the prefix, up to the next ':'
fn resolve(rest: &str, directory: &DeviceDirectory) -> Option<DeviceRecord> {
    let device_id = rest.split(':').next().unwrap_or_default();
    directory.lookup(device_id).cloned()
}

fn passthrough(raw: &str) -> Action {
    Action::Message {
        text: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> DeviceDirectory {
        DeviceDirectory::new(vec![
            DeviceRecord::new("0xc95a792eaa763e2a421d4e69028bda89a8562ca5", "Bedroom 1"),
            DeviceRecord::new("0x1F5C3E486DB709edd174fc4763AC4D645CB1E600", "Workspace"),
        ])
        .unwrap()
    }

    #[test]
    fn test_turn_on_case_insensitive() {
        let action = decode("TGLOON:0xC95A792EAa763e2a421D4e69028Bda89a8562Ca5", &directory());
        match &action {
            Action::TurnOn { device } => assert_eq!(device.label, "Bedroom 1"),
            other => panic!("expected TurnOn, got {other:?}"),
        }
        assert_eq!(action.to_string(), "Turned ON Bedroom 1 light");
    }

    #[test]
    fn test_turn_off() {
        let action = decode("TGLOFF:0x1f5c3e486db709edd174fc4763ac4d645cb1e600", &directory());
        assert!(matches!(&action, Action::TurnOff { device } if device.label == "Workspace"));
        assert_eq!(action.to_string(), "Turned OFF Workspace light");
    }

    #[test]
    fn test_unknown_device_passes_through() {
        let raw = "TGLOFF:0xDEADBEEF";
        assert_eq!(
            decode(raw, &directory()),
            Action::Message { text: raw.into() }
        );
    }

    #[test]
    fn test_free_text_passes_through() {
        let raw = "It is currently 72°F";
        assert_eq!(
            decode(raw, &directory()),
            Action::Message { text: raw.into() }
        );
    }

    #[test]
    fn test_prefix_is_case_sensitive() {
        let raw = "tgloon:0xc95a792eaa763e2a421d4e69028bda89a8562ca5";
        assert!(matches!(decode(raw, &directory()), Action::Message { .. }));
    }

    #[test]
    fn test_trailing_fields_ignored() {
        let action = decode(
            "TGLOON:0xc95a792eaa763e2a421d4e69028bda89a8562ca5:extra",
            &directory(),
        );
        assert!(matches!(action, Action::TurnOn { .. }));
    }

    #[test]
    fn test_empty_device_id() {
        assert_eq!(
            decode("TGLOON:", &directory()),
            Action::Message { text: "TGLOON:".into() }
        );
    }

    #[test]
    fn test_decode_is_pure() {
        let directory = directory();
        let raw = "TGLOON:0xc95a792eaa763e2a421d4e69028bda89a8562ca5";
        assert_eq!(decode(raw, &directory), decode(raw, &directory));
    }

    #[test]
    fn test_action_json() {
        let action = Action::Message { text: "hi".into() };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "message");
        assert_eq!(json["text"], "hi");
    }
}
