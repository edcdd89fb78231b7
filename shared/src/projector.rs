//! Light state projection
//!
//! Snapshots the on/off state of every known light for display. A snapshot
//! is built from a complete set of reads or not at all, and the status board
//! swaps whole snapshots so readers never see a half-refreshed view.

use crate::directory::DeviceDirectory;
use crate::ledger::{LedgerError, LightRegistry};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// On/off state of one light
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LightState {
    pub device_id: String,
    pub is_on: bool,
}

/// Immutable, ordered view of every light's state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LightSnapshot {
    states: Vec<LightState>,
}

impl LightSnapshot {
    /// State of one light, id compared ignoring case
    pub fn get(&self, device_id: &str) -> Option<&LightState> {
        self.states
            .iter()
            .find(|s| s.device_id.eq_ignore_ascii_case(device_id))
    }

    pub fn is_on(&self, device_id: &str) -> Option<bool> {
        self.get(device_id).map(|s| s.is_on)
    }

    pub fn states(&self) -> &[LightState] {
        &self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// One line per directory entry, in directory order
    pub fn render(&self, directory: &DeviceDirectory) -> String {
        directory
            .records()
            .iter()
            .map(|record| {
                let (marker, state) = match self.is_on(&record.device_id) {
                    Some(true) => ("🟢", "ON"),
                    Some(false) => ("🔴", "OFF"),
                    None => ("⚪", "UNKNOWN"),
                };
                format!("{} {:<12} {}", marker, record.label, state)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Errors from taking a snapshot
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Failed to read light {device_id}: {source}")]
    PartialRead {
        device_id: String,
        #[source]
        source: LedgerError,
    },

    #[error("Registry returned {got} states for {expected} lights")]
    CountMismatch { expected: usize, got: usize },
}

/// Read every light in `devices`; any failed read fails the whole snapshot
pub async fn snapshot<R>(devices: &[String], registry: &R) -> Result<LightSnapshot, SnapshotError>
where
    R: LightRegistry + ?Sized,
{
    let results = registry.light_states(devices).await;

    if results.len() != devices.len() {
        return Err(SnapshotError::CountMismatch {
            expected: devices.len(),
            got: results.len(),
        });
    }

    let mut states = Vec::with_capacity(devices.len());
    for (device_id, result) in devices.iter().zip(results) {
        match result {
            Ok(is_on) => states.push(LightState {
                device_id: device_id.clone(),
                is_on,
            }),
            Err(source) => {
                return Err(SnapshotError::PartialRead {
                    device_id: device_id.clone(),
                    source,
                })
            }
        }
    }

    debug!("Snapshot of {} lights taken", states.len());
    Ok(LightSnapshot { states })
}

/// Latest known snapshot, replaced wholesale on every successful refresh
pub struct StatusBoard {
    current: RwLock<Arc<LightSnapshot>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(LightSnapshot::default())),
        }
    }

    /// The last successful snapshot (empty before the first refresh)
    pub async fn current(&self) -> Arc<LightSnapshot> {
        self.current.read().await.clone()
    }

    /// Take a fresh snapshot of every light in `directory` and publish it.
    /// On failure the previous snapshot stays in place.
    pub async fn refresh<R>(
        &self,
        directory: &DeviceDirectory,
        registry: &R,
    ) -> Result<Arc<LightSnapshot>, SnapshotError>
    where
        R: LightRegistry + ?Sized,
    {
        let fresh = match snapshot(&directory.device_ids(), registry).await {
            Ok(fresh) => Arc::new(fresh),
            Err(e) => {
                warn!("Light status refresh failed: {}", e);
                return Err(e);
            }
        };

        *self.current.write().await = fresh.clone();
        Ok(fresh)
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
