//! Device directory
//!
//! Static mapping from a light's on-chain identifier to the room it sits in.
//! Loaded once at start-up and shared read-only by every session.

use crate::protocol;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from building or loading a directory
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Failed to read device directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid device directory JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Device {0} is listed more than once")]
    Duplicate(String),

    #[error("Device labelled {0:?} has an empty id")]
    EmptyId(String),
}

/// One light and its human-readable label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device_id: String,
    pub label: String,
}

impl DeviceRecord {
    pub fn new(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
        }
    }

    /// Ids are compared ignoring ASCII case; configured ids mix case freely
    pub fn matches(&self, device_id: &str) -> bool {
        self.device_id.eq_ignore_ascii_case(device_id)
    }
}

/// Ordered, immutable list of known devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDirectory {
    records: Vec<DeviceRecord>,
}

impl DeviceDirectory {
    /// Build a directory, rejecting empty and duplicate ids
    pub fn new(records: Vec<DeviceRecord>) -> Result<Self, DirectoryError> {
        for (i, record) in records.iter().enumerate() {
            if record.device_id.trim().is_empty() {
                return Err(DirectoryError::EmptyId(record.label.clone()));
            }
            if records[..i].iter().any(|r| r.matches(&record.device_id)) {
                return Err(DirectoryError::Duplicate(record.device_id.clone()));
            }
        }
        Ok(Self { records })
    }

    /// Parse `[{"device_id": "...", "label": "..."}, ...]`
    pub fn from_json(json: &str) -> Result<Self, DirectoryError> {
        let records: Vec<DeviceRecord> = serde_json::from_str(json)?;
        Self::new(records)
    }

    /// Load a JSON directory file
    pub fn load(path: &Path) -> Result<Self, DirectoryError> {
        let json = std::fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Find a device by id, ignoring case
    pub fn lookup(&self, device_id: &str) -> Option<&DeviceRecord> {
        self.records.iter().find(|r| r.matches(device_id))
    }

    pub fn records(&self) -> &[DeviceRecord] {
        &self.records
    }

    /// Device ids in directory order
    pub fn device_ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.device_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for DeviceDirectory {
    fn default() -> Self {
        Self {
            records: protocol::DEFAULT_DEVICES
                .iter()
                .map(|(id, label)| DeviceRecord::new(*id, *label))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directory() {
        let directory = DeviceDirectory::default();
        assert_eq!(directory.len(), 6);
        assert_eq!(directory.records()[0].label, "Bedroom 1");
        assert_eq!(directory.records()[5].label, "Workspace");
    }

    #[test]
    fn test_lookup_ignores_case() {
        let directory = DeviceDirectory::default();
        let record = directory
            .lookup("0x1f5c3e486db709edd174fc4763ac4d645cb1e600")
            .expect("workspace light");
        assert_eq!(record.label, "Workspace");
        assert!(directory.lookup("0xDEADBEEF").is_none());
    }

    #[test]
    fn test_duplicate_rejected() {
        let result = DeviceDirectory::new(vec![
            DeviceRecord::new("0xAB", "Kitchen"),
            DeviceRecord::new("0xab", "Kitchen again"),
        ]);
        assert!(matches!(result, Err(DirectoryError::Duplicate(id)) if id == "0xab"));
    }

    #[test]
    fn test_empty_id_rejected() {
        let result = DeviceDirectory::new(vec![DeviceRecord::new(" ", "Hall")]);
        assert!(matches!(result, Err(DirectoryError::EmptyId(_))));
    }

    #[test]
    fn test_from_json() {
        let directory = DeviceDirectory::from_json(
            r#"[{"device_id": "0x01", "label": "Garage"}, {"device_id": "0x02", "label": "Porch"}]"#,
        )
        .unwrap();
        assert_eq!(directory.device_ids(), vec!["0x01", "0x02"]);

        assert!(matches!(
            DeviceDirectory::from_json("{not json"),
            Err(DirectoryError::Parse(_))
        ));
    }
}
