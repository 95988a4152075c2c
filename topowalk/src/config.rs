//! Credential and session configuration.
//!
//! The configuration file is read once per run. Any problem loading it is
//! fatal before discovery starts.
//!
//! ```toml
//! [session]
//! port = 22
//! connect_timeout_secs = 30
//!
//! [discovery]
//! max_depth = 5
//!
//! [vendors.hirschmann]
//! username = "admin"
//! password = "private"
//! alternates = [{ username = "user", password = "public" }]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use log::info;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{ConfigError, Result};
use crate::transport::HostKeyVerification;

/// One username/secret pair.
#[derive(Debug)]
pub struct Credential {
    pub username: String,
    pub secret: SecretString,
}

impl Credential {
    /// Create a credential pair.
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    /// Whether both pairs carry the same username and secret.
    pub fn same_as(&self, other: &Credential) -> bool {
        self.username == other.username
            && self.secret.expose_secret() == other.secret.expose_secret()
    }
}

/// Ordered credentials for one vendor: the default first, then alternates.
#[derive(Debug, Clone)]
pub struct CredentialSet {
    credentials: Vec<Arc<Credential>>,
}

impl CredentialSet {
    /// Create a set from a default pair and zero or more alternates.
    pub fn new(default: Credential, alternates: impl IntoIterator<Item = Credential>) -> Self {
        let mut credentials = vec![Arc::new(default)];
        credentials.extend(alternates.into_iter().map(Arc::new));
        Self { credentials }
    }

    /// The default credential.
    pub fn default_credential(&self) -> &Arc<Credential> {
        &self.credentials[0]
    }

    /// All credentials in the order they should be tried.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Credential>> {
        self.credentials.iter()
    }

    /// Number of credentials in the set.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    /// Always false: a set has at least its default credential.
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

/// Vendor name to credential set, in file order.
pub type CredentialTable = IndexMap<String, CredentialSet>;

/// Global settings for every interactive session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// SSH port.
    pub port: u16,
    /// Bound on TCP connect, SSH handshake and authentication.
    pub connect_timeout: Duration,
    /// Silence after which a read is considered finished.
    pub idle_timeout: Duration,
    /// Upper bound on a single command, pager pages included.
    pub command_timeout: Duration,
    /// Maximum pager continuations per command.
    pub max_pages: usize,
    /// Terminal width for the PTY.
    pub terminal_width: u32,
    /// Terminal height for the PTY.
    pub terminal_height: u32,
    /// Host key verification mode.
    pub host_key_verification: HostKeyVerification,
    /// known_hosts file for `strict` and `accept_new`; the user's default
    /// file when unset.
    pub known_hosts_path: Option<PathBuf>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            port: 22,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(3),
            command_timeout: Duration::from_secs(60),
            max_pages: 64,
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::Disabled,
            known_hosts_path: None,
        }
    }
}

/// Optional safety valves for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryLimits {
    /// Deepest hop count from the seed that will be probed.
    pub max_depth: Option<usize>,
    /// Stop after this many addresses have been attempted.
    pub max_devices: Option<usize>,
}

/// A fully loaded configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub session: SessionSettings,
    pub limits: DiscoveryLimits,
    pub credentials: CredentialTable,
}

impl Config {
    /// Load and validate the configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content)?;
        info!(
            "Loaded configuration from {} ({} vendor credential sets)",
            path.display(),
            config.credentials.len()
        );
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::from)?;
        raw.validate()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    session: RawSession,
    #[serde(default)]
    discovery: RawDiscovery,
    #[serde(default)]
    vendors: IndexMap<String, RawVendor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSession {
    port: Option<u16>,
    connect_timeout_secs: Option<u64>,
    idle_timeout_secs: Option<u64>,
    command_timeout_secs: Option<u64>,
    max_pages: Option<usize>,
    terminal_width: Option<u32>,
    terminal_height: Option<u32>,
    host_key_verification: Option<RawHostKeyVerification>,
    known_hosts_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawHostKeyVerification {
    Strict,
    AcceptNew,
    Disabled,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDiscovery {
    max_depth: Option<usize>,
    max_devices: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVendor {
    username: String,
    password: String,
    #[serde(default)]
    alternates: Vec<RawCredential>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCredential {
    username: String,
    password: String,
}

impl RawConfig {
    fn validate(self) -> Result<Config> {
        let defaults = SessionSettings::default();
        let s = self.session;

        let positive = |name: &str, secs: Option<u64>, default: Duration| match secs {
            Some(0) => Err(invalid(format!("session.{name} must be greater than zero"))),
            Some(secs) => Ok(Duration::from_secs(secs)),
            None => Ok(default),
        };

        let session = SessionSettings {
            port: s.port.unwrap_or(defaults.port),
            connect_timeout: positive(
                "connect_timeout_secs",
                s.connect_timeout_secs,
                defaults.connect_timeout,
            )?,
            idle_timeout: positive("idle_timeout_secs", s.idle_timeout_secs, defaults.idle_timeout)?,
            command_timeout: positive(
                "command_timeout_secs",
                s.command_timeout_secs,
                defaults.command_timeout,
            )?,
            max_pages: s.max_pages.unwrap_or(defaults.max_pages),
            terminal_width: s.terminal_width.unwrap_or(defaults.terminal_width),
            terminal_height: s.terminal_height.unwrap_or(defaults.terminal_height),
            host_key_verification: match s.host_key_verification {
                Some(RawHostKeyVerification::Strict) => HostKeyVerification::Strict,
                Some(RawHostKeyVerification::AcceptNew) => HostKeyVerification::AcceptNew,
                Some(RawHostKeyVerification::Disabled) | None => HostKeyVerification::Disabled,
            },
            known_hosts_path: s.known_hosts_path,
        };

        if session.port == 0 {
            return Err(invalid("session.port must not be zero"));
        }

        if self.vendors.is_empty() {
            return Err(invalid("at least one [vendors.<name>] block is required"));
        }

        let mut credentials = CredentialTable::new();
        for (vendor, raw) in self.vendors {
            let vendor = vendor.trim().to_ascii_lowercase();
            if credentials.contains_key(&vendor) {
                return Err(invalid(format!("duplicate vendor block for '{vendor}'")));
            }
            if raw.username.trim().is_empty() {
                return Err(invalid(format!("vendors.{vendor}.username is empty")));
            }
            let mut alternates = Vec::with_capacity(raw.alternates.len());
            for (i, alt) in raw.alternates.into_iter().enumerate() {
                if alt.username.trim().is_empty() {
                    return Err(invalid(format!(
                        "vendors.{vendor}.alternates[{i}].username is empty"
                    )));
                }
                alternates.push(Credential::new(alt.username, alt.password));
            }
            let set = CredentialSet::new(Credential::new(raw.username, raw.password), alternates);
            credentials.insert(vendor, set);
        }

        Ok(Config {
            session,
            limits: DiscoveryLimits {
                max_depth: self.discovery.max_depth,
                max_devices: self.discovery.max_devices,
            },
            credentials,
        })
    }
}

fn invalid(message: impl Into<String>) -> crate::error::Error {
    ConfigError::Invalid {
        message: message.into(),
    }
    .into()
}
