//! Vendor and credential auto-detection.
//!
//! The probe walks the registry in priority order. For each profile it tries
//! the vendor's credentials, default first. The first session that opens is
//! sent the profile's identification commands; if the output contains one of
//! the profile's patterns, that session is handed to the caller. Otherwise it
//! is closed and the next profile is tried.

use std::sync::Arc;

use log::{debug, warn};

use crate::config::{Credential, CredentialTable};
use crate::error::{ChannelError, DiscoveryError, Error, Result};
use crate::model::DeviceAddress;
use crate::session::{Connector, Session};
use crate::vendor::{VendorProfile, VendorRegistry};

/// A successful identification.
#[derive(Debug)]
pub struct Detection {
    /// The matched profile.
    pub profile: VendorProfile,
    /// The open, identified session, ready for extraction.
    pub session: Session,
    /// The credential that was accepted.
    pub credential: Arc<Credential>,
}

impl Detection {
    /// Name of the detected vendor.
    pub fn vendor(&self) -> &str {
        &self.profile.name
    }
}

/// Identifies devices by trying vendor profiles and credentials.
pub struct VendorProbe<C> {
    connector: C,
    registry: VendorRegistry,
    credentials: CredentialTable,
}

impl<C: Connector> VendorProbe<C> {
    /// Create a probe.
    ///
    /// Fails with [`DiscoveryError::NoCredentials`] if no registered profile
    /// has credentials. Credential blocks for unknown vendors are ignored.
    pub fn new(connector: C, registry: VendorRegistry, credentials: CredentialTable) -> Result<Self> {
        for vendor in credentials.keys() {
            if !registry.contains(vendor) {
                warn!("Ignoring credentials for unknown vendor '{}'", vendor);
            }
        }
        if !registry.names().any(|name| credentials.contains_key(name)) {
            return Err(DiscoveryError::NoCredentials.into());
        }
        Ok(Self {
            connector,
            registry,
            credentials,
        })
    }

    /// The profiles this probe tries.
    pub fn registry(&self) -> &VendorRegistry {
        &self.registry
    }

    /// The connector sessions are opened with.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Identify the device at `address`.
    ///
    /// On success the returned session is open and owned by the caller. On
    /// error every session opened along the way has been closed. The error
    /// is [`DiscoveryError::VendorMismatch`] if any session opened, otherwise
    /// the last connection error.
    pub async fn detect(&self, address: &DeviceAddress) -> Result<Detection> {
        let mut rejected: Vec<Arc<Credential>> = Vec::new();
        let mut opened_any = false;
        let mut last_error: Option<Error> = None;

        for profile in self.registry.iter() {
            let Some(credentials) = self.credentials.get(&profile.name) else {
                continue;
            };

            for credential in credentials.iter() {
                if rejected.iter().any(|r| r.same_as(credential)) {
                    continue;
                }

                debug!(
                    "{}: trying {} as {}",
                    address, profile.name, credential.username
                );
                let mut session = match self.connector.open(address, credential).await {
                    Ok(session) => session,
                    Err(e) if e.is_auth() => {
                        debug!("{}: {}", address, e);
                        rejected.push(Arc::clone(credential));
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) if e.is_unreachable() || e.failure_kind().is_none() => return Err(e),
                    Err(e) => {
                        debug!("{}: {}", address, e);
                        last_error = Some(e);
                        continue;
                    }
                };
                opened_any = true;

                match identify(profile, &mut session).await {
                    Ok(true) => {
                        debug!("{}: identified as {}", address, profile.name);
                        return Ok(Detection {
                            profile: profile.clone(),
                            session,
                            credential: Arc::clone(credential),
                        });
                    }
                    Ok(false) => debug!("{}: not {}", address, profile.name),
                    Err(e) => {
                        debug!("{}: identification as {} failed: {}", address, profile.name, e);
                    }
                }

                if let Err(e) = session.close().await {
                    debug!("{}: error closing probe session: {}", address, e);
                }
                break;
            }
        }

        if opened_any {
            return Err(DiscoveryError::VendorMismatch {
                address: address.to_string(),
            }
            .into());
        }
        Err(last_error.unwrap_or_else(|| {
            DiscoveryError::VendorMismatch {
                address: address.to_string(),
            }
            .into()
        }))
    }
}

/// Send the profile's identification commands until one matches.
async fn identify(profile: &VendorProfile, session: &mut Session) -> Result<bool> {
    for command in &profile.identify_commands {
        match session.send_command(command).await {
            Ok(transcript) if profile.matches(&transcript) => return Ok(true),
            Ok(_) | Err(Error::Channel(ChannelError::ReadTimeout(_))) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialSet;
    use crate::error::FailureKind;
    use crate::testing::{FakeDevice, FakeNetwork};

    fn credentials() -> CredentialTable {
        let mut table = CredentialTable::new();
        table.insert(
            "hirschmann".into(),
            CredentialSet::new(
                Credential::new("admin", "private"),
                [Credential::new("user", "public")],
            ),
        );
        table.insert(
            "kontron".into(),
            CredentialSet::new(Credential::new("admin", "admin"), []),
        );
        table
    }

    fn kontron_device() -> FakeDevice {
        FakeDevice::new("kswitch#")
            .with_login("admin", "admin")
            .with_response("show version", &["Product : Kontron KSwitch D10 MMT"])
    }

    #[tokio::test]
    async fn test_detects_second_profile_and_closes_mismatch() {
        let network = FakeNetwork::new().with_device("10.0.0.5", kontron_device());
        let probe = VendorProbe::new(network, VendorRegistry::builtin(), credentials()).unwrap();

        let mut detection = probe.detect(&"10.0.0.5".into()).await.unwrap();
        assert_eq!(detection.vendor(), "kontron");
        assert_eq!(detection.credential.username, "admin");
        assert!(detection.session.is_alive());
        detection.session.close().await.unwrap();

        let network = probe.connector();
        assert_eq!(network.opens("10.0.0.5"), network.closes("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_rejected_credential_not_retried() {
        // hirschmann admin/private and user/public are both rejected; kontron
        // uses a different pair and gets in
        let network = FakeNetwork::new().with_device("10.0.0.5", kontron_device());
        let probe = VendorProbe::new(network, VendorRegistry::builtin(), credentials()).unwrap();

        let mut detection = probe.detect(&"10.0.0.5".into()).await.unwrap();
        detection.session.close().await.unwrap();
        assert_eq!(probe.connector().attempts("10.0.0.5"), 3);
    }

    #[tokio::test]
    async fn test_unreachable_short_circuits() {
        let network = FakeNetwork::new();
        let probe = VendorProbe::new(network, VendorRegistry::builtin(), credentials()).unwrap();

        let err = probe.detect(&"10.0.0.99".into()).await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::Unreachable));
        assert_eq!(probe.connector().attempts("10.0.0.99"), 1);
    }

    #[tokio::test]
    async fn test_no_match_is_vendor_mismatch() {
        let device = FakeDevice::new("linux$")
            .with_login("admin", "private")
            .with_response("show system info", &["bash: show: command not found"]);
        let network = FakeNetwork::new().with_device("10.0.0.7", device);
        let probe = VendorProbe::new(network, VendorRegistry::builtin(), credentials()).unwrap();

        let err = probe.detect(&"10.0.0.7".into()).await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::VendorMismatch));

        let network = probe.connector();
        assert_eq!(network.opens("10.0.0.7"), 1);
        assert_eq!(network.closes("10.0.0.7"), 1);
    }

    #[tokio::test]
    async fn test_all_rejected_is_auth() {
        let device = FakeDevice::new("switch#").with_login("root", "toor");
        let network = FakeNetwork::new().with_device("10.0.0.8", device);
        let probe = VendorProbe::new(network, VendorRegistry::builtin(), credentials()).unwrap();

        let err = probe.detect(&"10.0.0.8".into()).await.unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::Auth));
        assert_eq!(probe.connector().opens("10.0.0.8"), 0);
    }

    #[test]
    fn test_no_usable_credentials() {
        let mut table = CredentialTable::new();
        table.insert(
            "acme".into(),
            CredentialSet::new(Credential::new("admin", "admin"), []),
        );
        let err = VendorProbe::new(FakeNetwork::new(), VendorRegistry::builtin(), table)
            .err()
            .unwrap();
        assert!(err.failure_kind().is_none());
    }
}
