//! Run output.

use std::time::Duration;

use indexmap::IndexMap;
use log::info;
use serde::{Serialize, Serializer};

use crate::error::FailureKind;
use crate::model::{DeviceAddress, Link, Topology};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// The frontier emptied and nothing was set aside.
    Completed,
    /// The frontier emptied, but neighbors beyond the depth limit were not
    /// probed.
    DepthLimited,
    /// The device limit was reached with addresses still queued.
    DeviceLimit,
    /// A stop was requested.
    Cancelled,
}

/// Snapshot of one discovery run.
///
/// Every address learned during the run appears in exactly one of
/// `topology`, `failed` and `pending`.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub seed: DeviceAddress,
    pub outcome: RunOutcome,
    pub topology: Topology,
    pub failed: IndexMap<DeviceAddress, FailureKind>,
    /// Learned but never attempted (depth or device limit, or stop).
    pub pending: Vec<DeviceAddress>,
    #[serde(rename = "elapsed_secs", serialize_with = "as_secs")]
    pub elapsed: Duration,
}

fn as_secs<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

impl DiscoveryReport {
    /// Whether every learned address was attempted.
    pub fn is_complete(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Number of addresses attempted.
    pub fn attempted(&self) -> usize {
        self.topology.len() + self.failed.len()
    }

    /// Deduplicated links between devices.
    pub fn links(&self) -> Vec<Link> {
        self.topology.links()
    }

    /// Log the run summary.
    pub fn log_summary(&self) {
        info!(
            "Discovery from {} finished ({:?}) in {:.1}s: {} discovered, {} failed, {} pending",
            self.seed,
            self.outcome,
            self.elapsed.as_secs_f64(),
            self.topology.len(),
            self.failed.len(),
            self.pending.len()
        );
        for device in self.topology.devices() {
            info!(
                "  {} {} ({} neighbors)",
                device.address,
                device.vendor.as_deref().unwrap_or("unknown"),
                device.neighbors.len()
            );
        }
        for (address, kind) in &self.failed {
            info!("  {} failed: {}", address, kind);
        }
        if !self.pending.is_empty() {
            let pending: Vec<&str> = self.pending.iter().map(|a| a.as_str()).collect();
            info!("  not attempted: {}", pending.join(", "));
        }
    }
}
