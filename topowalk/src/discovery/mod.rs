//! The discovery walk.
//!
//! Starting from a seed, each frontier address is resolved in turn: the
//! probe identifies the device and hands over an open session, the vendor's
//! extractor reads identity and neighbors, the session is closed and the
//! record is stored. Neighbor addresses not seen before join the frontier.
//!
//! An address is marked visited before any I/O towards it, so it is attempted
//! at most once per run however many neighbors report it. Per-address errors
//! are recorded in the report and never abort the run.

mod report;
mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use tokio::time::Instant;

pub use report::{DiscoveryReport, RunOutcome};
pub use state::{DiscoveryState, Offer};

use crate::config::{Config, DiscoveryLimits};
use crate::error::{DiscoveryError, Error, Result};
use crate::model::{DeviceAddress, DeviceRecord, Topology};
use crate::probe::{Detection, VendorProbe};
use crate::session::{Connector, SshConnector};
use crate::vendor::{Extractor, VendorRegistry};

/// Requests a running discovery to stop.
///
/// The flag is checked between addresses; the address in progress is
/// finished and its session closed before the run returns.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives a discovery run.
pub struct Discovery<C> {
    probe: VendorProbe<C>,
    limits: DiscoveryLimits,
    stop: StopHandle,
}

impl Discovery<SshConnector> {
    /// SSH discovery with the built-in vendor profiles.
    pub fn from_config(config: Config) -> Result<Self> {
        let connector = SshConnector::new(config.session);
        let probe = VendorProbe::new(connector, VendorRegistry::builtin(), config.credentials)?;
        Ok(Self::new(probe).with_limits(config.limits))
    }
}

impl<C: Connector> Discovery<C> {
    /// Create a discovery without limits.
    pub fn new(probe: VendorProbe<C>) -> Self {
        Self {
            probe,
            limits: DiscoveryLimits::default(),
            stop: StopHandle::new(),
        }
    }

    /// Set depth and device limits.
    pub fn with_limits(mut self, limits: DiscoveryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Use an existing stop handle.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Handle for stopping a run from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn limits(&self) -> &DiscoveryLimits {
        &self.limits
    }

    pub fn probe(&self) -> &VendorProbe<C> {
        &self.probe
    }

    /// Walk the network from `seed`.
    ///
    /// Returns an error only for problems that make the whole run
    /// impossible; unreachable, unidentified or unparsable devices are
    /// listed in the report's `failed` map instead.
    pub async fn run(&self, seed: impl Into<DeviceAddress>) -> Result<DiscoveryReport> {
        let seed = seed.into();
        let started = Instant::now();
        info!("Starting discovery from {}", seed);

        let mut state = DiscoveryState::new(seed.clone());
        let mut topology = Topology::new();

        let outcome = loop {
            if self.stop.is_stopped() {
                info!("Stop requested, ending discovery");
                break RunOutcome::Cancelled;
            }
            if let Some(max) = self.limits.max_devices {
                if state.visited().len() >= max && state.has_frontier() {
                    warn!("Device limit of {} reached, ending discovery", max);
                    break RunOutcome::DeviceLimit;
                }
            }

            let Some((address, depth)) = state.next() else {
                break if state.depth_limited() {
                    RunOutcome::DepthLimited
                } else {
                    RunOutcome::Completed
                };
            };

            debug!(
                "Resolving {} (depth {}, {} queued)",
                address,
                depth,
                state.frontier_len()
            );

            match self.resolve(&address).await {
                Ok(record) => {
                    info!(
                        "Discovered {} ({}) with {} neighbors",
                        address,
                        record.vendor.as_deref().unwrap_or("unknown"),
                        record.neighbors.len()
                    );
                    for neighbor in record.neighbor_addresses() {
                        if state.offer(neighbor.clone(), depth + 1, self.limits.max_depth)
                            == Offer::BeyondDepth
                        {
                            debug!("{} is beyond the depth limit", neighbor);
                        }
                    }
                    state.resolve(&address);
                    topology.insert(record);
                }
                Err(e) => match e.failure_kind() {
                    Some(kind) => {
                        warn!("Failed to discover {}: {}", address, e);
                        state.fail(address, kind);
                    }
                    None => return Err(e),
                },
            }
        };

        state.abandon_frontier();
        let (failed, pending) = state.into_outcome();
        let report = DiscoveryReport {
            seed,
            outcome,
            topology,
            failed,
            pending,
            elapsed: started.elapsed(),
        };
        report.log_summary();
        Ok(report)
    }

    /// Probe and extract one address. Every session is closed on return.
    async fn resolve(&self, address: &DeviceAddress) -> Result<DeviceRecord> {
        let Detection {
            profile,
            session,
            credential,
        } = self.probe.detect(address).await?;

        let mut extractor = profile.extractor(session, credential);
        let result = run_extractor(extractor.as_mut()).await;

        if let Err(e) = extractor.disconnect().await {
            debug!("{}: error closing session: {}", address, e);
        }

        result.map_err(|e| match e {
            Error::Discovery(_) => e,
            other => DiscoveryError::Extraction {
                address: address.to_string(),
                message: other.to_string(),
            }
            .into(),
        })
    }
}

async fn run_extractor(extractor: &mut dyn Extractor) -> Result<DeviceRecord> {
    if !extractor.connect().await? {
        return Err(DiscoveryError::NotReady {
            vendor: extractor.vendor().to_string(),
            address: extractor.address().to_string(),
        }
        .into());
    }
    extractor.extract().await
}
