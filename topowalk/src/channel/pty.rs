//! PTY shell channel over an SSH connection.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::trace;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::time::Instant;

use super::ShellChannel;
use crate::error::{ChannelError, Result};
use crate::transport::SshTransport;

/// Interactive shell on a russh channel.
///
/// Owns the SSH transport as well, so closing the channel also tears down
/// the connection.
pub struct PtyChannel {
    channel: Channel<Msg>,
    transport: Option<SshTransport>,
}

impl PtyChannel {
    /// Open a PTY shell on an authenticated transport.
    pub async fn open(transport: SshTransport) -> Result<Self> {
        match transport.open_shell().await {
            Ok(channel) => Ok(Self {
                channel,
                transport: Some(transport),
            }),
            Err(e) => {
                let _ = transport.close().await;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ShellChannel for PtyChannel {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.channel.data(data).await.map_err(ChannelError::Ssh)?;
        Ok(())
    }

    async fn recv(&mut self, wait: Duration) -> Result<Option<Bytes>> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let msg = match tokio::time::timeout(remaining, self.channel.wait()).await {
                Ok(msg) => msg,
                Err(_) => return Ok(None),
            };

            match msg {
                Some(ChannelMsg::Data { data }) | Some(ChannelMsg::ExtendedData { data, .. }) => {
                    trace!("received {} bytes", data.len());
                    return Ok(Some(Bytes::copy_from_slice(&data)));
                }
                Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                    return Err(ChannelError::Closed.into());
                }
                Some(other) => trace!("ignoring channel message {:?}", other),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.channel.close().await;
        if let Some(transport) = self.transport.take() {
            transport.close().await?;
        }
        Ok(())
    }
}
