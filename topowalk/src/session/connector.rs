//! Opening sessions.

use std::future::Future;
use std::sync::Arc;

use log::debug;

use super::Session;
use crate::channel::PtyChannel;
use crate::config::{Credential, SessionSettings};
use crate::error::Result;
use crate::model::DeviceAddress;
use crate::transport::{SshConfig, SshTransport};

/// Opens settled interactive sessions to devices.
pub trait Connector: Send + Sync {
    /// Connect, authenticate and wait for the shell to settle.
    ///
    /// On error nothing is left open.
    fn open(
        &self,
        address: &DeviceAddress,
        credential: &Arc<Credential>,
    ) -> impl Future<Output = Result<Session>> + Send;
}

/// Connector for real devices over SSH.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    settings: SessionSettings,
}

impl SshConnector {
    /// Create a connector using the given session settings.
    pub fn new(settings: SessionSettings) -> Self {
        Self { settings }
    }

    /// Session settings in effect.
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }
}

impl Connector for SshConnector {
    async fn open(&self, address: &DeviceAddress, credential: &Arc<Credential>) -> Result<Session> {
        debug!("{}: connecting as {}", address, credential.username);

        let config = SshConfig::new(address, Arc::clone(credential), &self.settings);
        let transport = SshTransport::connect(config).await?;
        let channel = PtyChannel::open(transport).await?;

        let mut session = Session::new(address.clone(), Box::new(channel), &self.settings);
        if let Err(e) = session.settle().await {
            let _ = session.close().await;
            return Err(e);
        }
        Ok(session)
    }
}
