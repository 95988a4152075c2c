//! SSH transport layer wrapping russh.
//!
//! Connection setup, host key policy and authentication. The interactive
//! shell on top of a connection lives in [`crate::channel`].

pub mod config;
mod ssh;

pub use config::{HostKeyVerification, SshConfig};
pub use ssh::SshTransport;
