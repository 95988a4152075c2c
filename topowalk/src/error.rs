//! Error types for topowalk.
//!
//! Errors are layered the same way the crate is: transport (SSH connect and
//! authentication), channel (the interactive shell), discovery (vendor
//! identification and extraction) and configuration. Everything except
//! configuration is local to a single address and is downgraded to a
//! [`FailureKind`] by the orchestrator.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Main error type for topowalk operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SSH transport-level errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Interactive shell errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Vendor detection and extraction errors
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Configuration loading errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Transport layer errors (SSH connection, authentication).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Host key not present in known_hosts (strict mode)
    #[error("Host key for {host}:{port} is not known")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the one recorded in known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Channel layer errors (interactive shell reads and writes).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Failed to open the PTY or start the shell
    #[error("Failed to open shell: {0}")]
    ShellOpenFailed(String),

    /// No output at all arrived before the idle timeout
    #[error("No output within {0:?}")]
    ReadTimeout(Duration),

    /// Channel closed by the remote side
    #[error("Channel closed")]
    Closed,

    /// Session was already closed locally
    #[error("Session is closed")]
    SessionClosed,

    /// SSH protocol error on the channel
    #[error("Channel SSH error: {0}")]
    Ssh(russh::Error),
}

/// Vendor detection and record extraction errors.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// A shell opened but no vendor profile recognized the device
    #[error("No vendor profile matched {address}")]
    VendorMismatch { address: String },

    /// No credentials are configured for any registered vendor
    #[error("No credentials configured for any known vendor")]
    NoCredentials,

    /// The device was identified but its data could not be parsed
    #[error("Extraction failed for {address}: {message}")]
    Extraction { address: String, message: String },

    /// The extractor reported the session unusable
    #[error("Extractor for {vendor} could not prepare the session on {address}")]
    NotReady { vendor: String, address: String },

    /// A vendor profile with this name is already registered
    #[error("Vendor profile '{name}' is already registered")]
    DuplicateProfile { name: String },
}

/// Configuration loading errors. These are fatal to a run.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for the expected structure
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Structurally valid but semantically unusable
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Why a single address could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No transport-level connection
    Unreachable,
    /// Every credential was rejected
    Auth,
    /// No response within a bound
    Timeout,
    /// Connected, but no vendor profile matched
    VendorMismatch,
    /// Identified, but structured data could not be produced
    Extraction,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Unreachable => "unreachable",
            FailureKind::Auth => "auth",
            FailureKind::Timeout => "timeout",
            FailureKind::VendorMismatch => "vendor_mismatch",
            FailureKind::Extraction => "extraction",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Classify this error as a per-address failure.
    ///
    /// Returns `None` for errors that must abort the whole run.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::Transport(e) => Some(match e {
                TransportError::AuthenticationFailed { .. } => FailureKind::Auth,
                TransportError::Timeout(_) => FailureKind::Timeout,
                TransportError::ConnectionFailed { .. }
                | TransportError::Ssh(_)
                | TransportError::HostKeyUnknown { .. }
                | TransportError::HostKeyChanged { .. }
                | TransportError::KnownHosts(_) => FailureKind::Unreachable,
            }),
            Error::Channel(e) => Some(match e {
                ChannelError::ReadTimeout(_) => FailureKind::Timeout,
                ChannelError::ShellOpenFailed(_)
                | ChannelError::Closed
                | ChannelError::SessionClosed
                | ChannelError::Ssh(_) => FailureKind::Unreachable,
            }),
            Error::Discovery(e) => match e {
                DiscoveryError::VendorMismatch { .. } => Some(FailureKind::VendorMismatch),
                DiscoveryError::Extraction { .. } | DiscoveryError::NotReady { .. } => {
                    Some(FailureKind::Extraction)
                }
                DiscoveryError::NoCredentials | DiscoveryError::DuplicateProfile { .. } => None,
            },
            Error::Config(_) => None,
        }
    }

    /// Whether the remote host itself could not be reached.
    ///
    /// The probe stops trying further credentials for an address once this
    /// is true, since another username will not make the host answer.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self.failure_kind(),
            Some(FailureKind::Unreachable) | Some(FailureKind::Timeout)
        ) && matches!(self, Error::Transport(_))
    }

    /// Whether the error means credentials were rejected.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Error::Transport(TransportError::AuthenticationFailed { .. })
        )
    }
}

/// Result type alias using topowalk's Error.
pub type Result<T> = std::result::Result<T, Error>;
