//! SSH connection configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Credential, SessionSettings};
use crate::model::DeviceAddress;

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys. Connection fails if the host
    /// is not already in known_hosts.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    AcceptNew,

    /// Accept all keys without checking. Switches on an unmanaged network
    /// are seen for the first time during discovery, so this is the default.
    #[default]
    Disabled,
}

/// SSH connection configuration for one device and one credential.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Target host (IP address).
    pub host: String,

    /// SSH port.
    pub port: u16,

    /// Login and secret to authenticate with.
    pub credential: Arc<Credential>,

    /// Bound on connect, handshake and authentication.
    pub timeout: Duration,

    /// Terminal width for PTY.
    pub terminal_width: u32,

    /// Terminal height for PTY.
    pub terminal_height: u32,

    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file.
    pub known_hosts_path: Option<PathBuf>,
}

impl SshConfig {
    /// Build a connection config from the run's session settings.
    pub fn new(address: &DeviceAddress, credential: Arc<Credential>, settings: &SessionSettings) -> Self {
        Self {
            host: address.to_string(),
            port: settings.port,
            credential,
            timeout: settings.connect_timeout,
            terminal_width: settings.terminal_width,
            terminal_height: settings.terminal_height,
            host_key_verification: settings.host_key_verification.clone(),
            known_hosts_path: settings.known_hosts_path.clone(),
        }
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Username from the credential.
    pub fn username(&self) -> &str {
        &self.credential.username
    }
}
