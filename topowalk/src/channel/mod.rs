//! Channel layer: the raw interactive shell under a session.
//!
//! This module handles the byte stream of a remote shell, output cleaning
//! (ANSI escapes, carriage-return overwrites) and the prompt and pager
//! patterns used to decide when a read is complete.

mod buffer;
mod patterns;
mod pty;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub use buffer::TranscriptBuffer;
pub use patterns::{PagerMatcher, PromptMatcher};
pub use pty::PtyChannel;

use crate::error::Result;

/// A raw, bidirectional interactive shell.
///
/// Implementations own whatever connection backs the shell and release it in
/// [`close`](Self::close).
#[async_trait]
pub trait ShellChannel: Send {
    /// Write raw bytes to the shell.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Wait up to `wait` for the next chunk of output.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. A channel closed by
    /// the remote side is an error.
    async fn recv(&mut self, wait: Duration) -> Result<Option<Bytes>>;

    /// Close the shell and the connection under it.
    async fn close(&mut self) -> Result<()>;
}
