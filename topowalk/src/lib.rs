//! # Topowalk
//!
//! Async topology discovery for industrial switches reachable over SSH.
//!
//! Topowalk logs in to a seed switch, works out which vendor it is by trying
//! vendor profiles and credentials, reads its LLDP neighbors from the CLI and
//! walks outward until every reachable switch has been visited once.
//!
//! ## Features
//!
//! - Async SSH sessions via russh, with password and keyboard-interactive login
//! - Prompt learning and automatic pager handling (`--More--` and friends)
//! - Vendor auto-detection: Hirschmann HiOS, Kontron iStaX, NOMAD, Lantech
//! - Loop-safe breadth-first walk with optional depth and device limits
//! - Serializable report: topology, failed addresses with reasons, pending
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use topowalk::{Config, Discovery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), topowalk::Error> {
//!     let config = Config::load("credentials.toml")?;
//!     let discovery = Discovery::from_config(config)?;
//!
//!     let report = discovery.run("192.168.1.1").await?;
//!     for link in report.links() {
//!         println!("{} <-> {}", link.a, link.b);
//!     }
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod probe;
pub mod session;
pub mod transport;
pub mod vendor;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use config::{Config, Credential, CredentialSet, DiscoveryLimits, SessionSettings};
pub use discovery::{Discovery, DiscoveryReport, RunOutcome, StopHandle};
pub use error::{Error, FailureKind, Result};
pub use model::{DeviceAddress, DeviceRecord, Link, NeighborRecord, SystemInfo, Topology};
pub use probe::{Detection, VendorProbe};
pub use session::{Connector, Session, SshConnector, Transcript};
pub use vendor::{Extractor, VendorProfile, VendorRegistry};
