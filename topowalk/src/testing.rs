//! Simulated switches for tests.
//!
//! [`FakeDevice`] scripts a switch CLI: banner, prompt, per-command output
//! (optionally split into pager pages) and login credentials.
//! [`ScriptedChannel`] plays it back as a [`ShellChannel`], and
//! [`FakeNetwork`] is a [`Connector`] over a set of fake devices that counts
//! connection attempts, opens and closes per address.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use secrecy::ExposeSecret;

use crate::channel::ShellChannel;
use crate::config::{Credential, SessionSettings};
use crate::error::{ChannelError, Result, TransportError};
use crate::model::DeviceAddress;
use crate::session::{Connector, ReadSettings, Session};

const MORE: &str = "--More--";
const ERASE: &str = "\r        \r";

/// Shared counter.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn incr(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
enum Script {
    Pages(Vec<Vec<String>>),
    Endless,
    Unterminated(Vec<String>),
    Hangup,
}

/// A scripted switch.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    prompt: String,
    banner: String,
    pager: String,
    scripts: HashMap<String, Script>,
    logins: Vec<(String, String)>,
    silent: bool,
    echo_after_prompt: bool,
    opens: Counter,
    closes: Counter,
}

impl FakeDevice {
    /// A device with the given prompt that accepts any login.
    pub fn new(prompt: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            banner: String::new(),
            pager: MORE.to_string(),
            scripts: HashMap::new(),
            logins: Vec::new(),
            silent: false,
            echo_after_prompt: false,
            opens: Counter::default(),
            closes: Counter::default(),
        }
    }

    /// A device that accepts the login but never prints anything.
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Self::new("silent#")
        }
    }

    pub fn with_banner(mut self, banner: &str) -> Self {
        self.banner = banner.to_string();
        self
    }

    /// Print `marker` instead of `--More--` between pages.
    pub fn with_pager_marker(mut self, marker: &str) -> Self {
        self.pager = marker.to_string();
        self
    }

    /// Only accept this username/password (may be called repeatedly).
    pub fn with_login(mut self, username: &str, password: &str) -> Self {
        self.logins.push((username.to_string(), password.to_string()));
        self
    }

    /// Single-page output for a command.
    pub fn with_response(self, command: &str, lines: &[&str]) -> Self {
        self.with_pages(command, &[lines])
    }

    /// Output split into pager pages.
    pub fn with_pages(mut self, command: &str, pages: &[&[&str]]) -> Self {
        let pages = pages
            .iter()
            .map(|page| page.iter().map(|l| l.to_string()).collect())
            .collect();
        self.scripts.insert(command.to_string(), Script::Pages(pages));
        self
    }

    /// A command whose pager never ends.
    pub fn with_endless_pager(mut self, command: &str) -> Self {
        self.scripts.insert(command.to_string(), Script::Endless);
        self
    }

    /// Output that never returns to the prompt.
    pub fn with_unterminated(mut self, command: &str, lines: &[&str]) -> Self {
        let lines = lines.iter().map(|l| l.to_string()).collect();
        self.scripts
            .insert(command.to_string(), Script::Unterminated(lines));
        self
    }

    /// A command that makes the device drop the connection.
    pub fn with_hangup(mut self, command: &str) -> Self {
        self.scripts.insert(command.to_string(), Script::Hangup);
        self
    }

    /// Echo commands after a fresh copy of the prompt.
    pub fn with_echo_after_prompt(mut self) -> Self {
        self.echo_after_prompt = true;
        self
    }

    /// Counter of channels closed on this device.
    pub fn close_counter(&self) -> Counter {
        self.closes.clone()
    }

    fn accepts(&self, credential: &Credential) -> bool {
        self.logins.is_empty()
            || self.logins.iter().any(|(user, pass)| {
                *user == credential.username && pass.as_str() == credential.secret.expose_secret()
            })
    }
}

enum Paging {
    Pages(VecDeque<Vec<String>>),
    Endless(usize),
}

/// A [`ShellChannel`] that plays back a [`FakeDevice`].
///
/// `recv` never waits: an empty outbox reads as idle immediately.
pub struct ScriptedChannel {
    device: FakeDevice,
    outbox: VecDeque<Bytes>,
    line: Vec<u8>,
    paging: Option<Paging>,
    hung_up: bool,
    closed: bool,
}

impl ScriptedChannel {
    pub fn new(device: FakeDevice) -> Self {
        device.opens.incr();
        let mut channel = Self {
            device,
            outbox: VecDeque::new(),
            line: Vec::new(),
            paging: None,
            hung_up: false,
            closed: false,
        };
        if !channel.device.silent {
            if !channel.device.banner.is_empty() {
                let banner = channel.device.banner.clone();
                channel.push(&banner);
            }
            channel.push_prompt();
        }
        channel
    }

    fn push(&mut self, text: &str) {
        self.outbox.push_back(Bytes::copy_from_slice(text.as_bytes()));
    }

    fn push_prompt(&mut self) {
        let prompt = self.device.prompt.clone();
        self.push(&prompt);
    }

    fn push_pager(&mut self) {
        let marker = self.device.pager.clone();
        self.push(&marker);
    }

    fn push_lines(&mut self, lines: &[String]) {
        let mut text = String::new();
        for line in lines {
            text.push_str(line);
            text.push_str("\r\n");
        }
        if !text.is_empty() {
            self.push(&text);
        }
    }

    fn next_page(&mut self) {
        match self.paging.take() {
            Some(Paging::Pages(mut pages)) => {
                self.push(ERASE);
                if let Some(page) = pages.pop_front() {
                    self.push_lines(&page);
                }
                if pages.is_empty() {
                    self.push_prompt();
                } else {
                    self.push_pager();
                    self.paging = Some(Paging::Pages(pages));
                }
            }
            Some(Paging::Endless(n)) => {
                self.push(ERASE);
                self.push(&format!("log line {n}\r\n"));
                self.push_pager();
                self.paging = Some(Paging::Endless(n + 1));
            }
            None => {}
        }
    }

    fn run_line(&mut self, command: &str) {
        if self.device.silent {
            return;
        }

        if self.device.echo_after_prompt && !command.is_empty() {
            let echo = format!("{} {}\r\n", self.device.prompt, command);
            self.push(&echo);
        } else {
            self.push(&format!("{command}\r\n"));
        }

        if command.is_empty() {
            self.push_prompt();
            return;
        }

        match self.device.scripts.get(command).cloned() {
            Some(Script::Pages(pages)) => {
                let mut pages: VecDeque<_> = pages.into();
                if let Some(first) = pages.pop_front() {
                    self.push_lines(&first);
                }
                if pages.is_empty() {
                    self.push_prompt();
                } else {
                    self.push_pager();
                    self.paging = Some(Paging::Pages(pages));
                }
            }
            Some(Script::Endless) => {
                self.push("log line 0\r\n");
                self.push_pager();
                self.paging = Some(Paging::Endless(1));
            }
            Some(Script::Unterminated(lines)) => self.push_lines(&lines),
            Some(Script::Hangup) => self.hung_up = true,
            None => {
                self.push("% Unknown command.\r\n");
                self.push_prompt();
            }
        }
    }
}

#[async_trait]
impl ShellChannel for ScriptedChannel {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if self.closed || self.hung_up {
            return Err(ChannelError::Closed.into());
        }

        if self.paging.is_some() {
            match data {
                b" " => self.next_page(),
                b"q" => {
                    self.paging = None;
                    self.push(ERASE);
                    self.push_prompt();
                }
                _ => {}
            }
            return Ok(());
        }

        for &byte in data {
            if byte == b'\n' {
                let line = String::from_utf8_lossy(&self.line).trim().to_string();
                self.line.clear();
                self.run_line(&line);
            } else {
                self.line.push(byte);
            }
        }
        Ok(())
    }

    async fn recv(&mut self, _wait: Duration) -> Result<Option<Bytes>> {
        if self.closed || (self.hung_up && self.outbox.is_empty()) {
            return Err(ChannelError::Closed.into());
        }
        Ok(self.outbox.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.device.closes.incr();
        }
        Ok(())
    }
}

/// Read settings for fake sessions.
pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        idle_timeout: Duration::from_millis(50),
        command_timeout: Duration::from_secs(5),
        max_pages: 8,
        ..SessionSettings::default()
    }
}

/// A settled session on a fake device.
pub async fn test_session(address: &str, device: FakeDevice) -> Session {
    let mut session = Session::new(
        address.into(),
        Box::new(ScriptedChannel::new(device)),
        ReadSettings::from(&fast_settings()),
    );
    session.settle().await.expect("fake device settles");
    session
}

/// A [`Connector`] over fake devices. Unknown addresses refuse connections.
#[derive(Default)]
pub struct FakeNetwork {
    devices: HashMap<String, FakeDevice>,
    timeouts: Vec<String>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, address: &str, device: FakeDevice) -> Self {
        self.devices.insert(address.to_string(), device);
        self
    }

    /// An address whose connection attempts time out.
    pub fn with_timeout(mut self, address: &str) -> Self {
        self.timeouts.push(address.to_string());
        self
    }

    /// Connection attempts made to `address`, successful or not.
    pub fn attempts(&self, address: &str) -> usize {
        self.attempts
            .lock()
            .map(|a| a.get(address).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Every address a connection was attempted to.
    pub fn attempted(&self) -> Vec<String> {
        self.attempts
            .lock()
            .map(|a| a.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Sessions opened to `address`.
    pub fn opens(&self, address: &str) -> usize {
        self.devices.get(address).map_or(0, |d| d.opens.get())
    }

    /// Sessions closed on `address`.
    pub fn closes(&self, address: &str) -> usize {
        self.devices.get(address).map_or(0, |d| d.closes.get())
    }

    /// Total sessions opened across all devices.
    pub fn total_opens(&self) -> usize {
        self.devices.values().map(|d| d.opens.get()).sum()
    }

    /// Addresses of all fake devices.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }
}

impl Connector for FakeNetwork {
    async fn open(&self, address: &DeviceAddress, credential: &Arc<Credential>) -> Result<Session> {
        if let Ok(mut attempts) = self.attempts.lock() {
            *attempts.entry(address.to_string()).or_default() += 1;
        }

        if self.timeouts.iter().any(|a| a == address.as_str()) {
            return Err(TransportError::Timeout(Duration::from_secs(30)).into());
        }

        let Some(device) = self.devices.get(address.as_str()) else {
            return Err(TransportError::ConnectionFailed {
                host: address.to_string(),
                port: 22,
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            }
            .into());
        };

        if !device.accepts(credential) {
            return Err(TransportError::AuthenticationFailed {
                user: credential.username.clone(),
            }
            .into());
        }

        let mut session = Session::new(
            address.clone(),
            Box::new(ScriptedChannel::new(device.clone())),
            &fast_settings(),
        );
        if let Err(e) = session.settle().await {
            let _ = session.close().await;
            return Err(e);
        }
        Ok(session)
    }
}
