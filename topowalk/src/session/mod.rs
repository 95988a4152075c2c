//! Interactive sessions with remote switch shells.
//!
//! A [`Session`] owns one shell on one device. It sends lines, collects
//! output until the shell goes idle, and drives pagers so that callers get
//! complete transcripts. Sessions are opened through a [`Connector`] and
//! must be closed explicitly on every path.

mod connector;
mod transcript;

use std::time::Duration;

use log::{debug, trace, warn};
use tokio::time::Instant;

pub use connector::{Connector, SshConnector};
pub use transcript::{ReadEnd, Transcript};

use crate::channel::{PagerMatcher, PromptMatcher, ShellChannel, TranscriptBuffer};
use crate::config::SessionSettings;
use crate::error::{ChannelError, Error, Result};
use crate::model::DeviceAddress;

/// Keystroke that advances a pager by one page.
const PAGER_CONTINUE: &[u8] = b" ";

/// Keystroke that leaves a pager.
const PAGER_QUIT: &[u8] = b"q";

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Open; the shell has not yet been seen at its prompt.
    Connected,
    /// Open and the last read ended at the prompt.
    Idle,
    /// The channel failed; only `close` is meaningful.
    Dead,
    /// Closed locally.
    Closed,
}

/// Read limits for a session.
#[derive(Debug, Clone)]
pub struct ReadSettings {
    /// Silence after which a read is considered finished.
    pub idle_timeout: Duration,
    /// Upper bound on one read, pager pages included.
    pub command_timeout: Duration,
    /// Maximum pager continuations per read.
    pub max_pages: usize,
}

impl From<&SessionSettings> for ReadSettings {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            idle_timeout: settings.idle_timeout,
            command_timeout: settings.command_timeout,
            max_pages: settings.max_pages,
        }
    }
}

/// One live interactive connection to one device.
pub struct Session {
    address: DeviceAddress,
    channel: Box<dyn ShellChannel>,
    buffer: TranscriptBuffer,
    prompt: PromptMatcher,
    pager: PagerMatcher,
    settings: ReadSettings,
    state: SessionState,
}

impl Session {
    /// Wrap an open shell channel.
    pub fn new(
        address: DeviceAddress,
        channel: Box<dyn ShellChannel>,
        settings: impl Into<ReadSettings>,
    ) -> Self {
        Self {
            address,
            channel,
            buffer: TranscriptBuffer::new(),
            prompt: PromptMatcher::new(),
            pager: PagerMatcher::new(),
            settings: settings.into(),
            state: SessionState::Connected,
        }
    }

    /// Use a custom prompt matcher instead of the generic prompt shape.
    pub fn with_prompt(mut self, prompt: PromptMatcher) -> Self {
        self.prompt = prompt;
        self
    }

    /// Use a custom pager matcher.
    pub fn with_pager(mut self, pager: PagerMatcher) -> Self {
        self.pager = pager;
        self
    }

    /// The device this session is connected to.
    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session can still be used.
    pub fn is_alive(&self) -> bool {
        matches!(self.state, SessionState::Connected | SessionState::Idle)
    }

    /// The prompt learned from the device, if one has been seen.
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.learned()
    }

    /// Read limits in effect.
    pub fn settings(&self) -> &ReadSettings {
        &self.settings
    }

    /// Consume the login banner and wait for the shell to settle.
    ///
    /// If the banner ends without a recognizable prompt, or nothing arrives
    /// at all, an empty line is sent once to provoke a prompt. Complete
    /// silence after that is a timeout.
    pub async fn settle(&mut self) -> Result<()> {
        match self.read(None, self.settings.idle_timeout).await {
            Ok(t) if t.is_complete() => {
                debug!("{}: shell settled at prompt {:?}", self.address, self.prompt());
                return Ok(());
            }
            Ok(_) | Err(Error::Channel(ChannelError::ReadTimeout(_))) => {}
            Err(e) => return Err(e),
        }

        self.send_line("").await?;
        let t = self.read(None, self.settings.idle_timeout).await?;
        debug!(
            "{}: shell settled after nudge (prompt {:?}, complete: {})",
            self.address,
            self.prompt(),
            t.is_complete()
        );
        Ok(())
    }

    /// Send one line of text followed by a newline.
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        self.ensure_alive()?;
        let mut line = Vec::with_capacity(text.len() + 1);
        line.extend_from_slice(text.as_bytes());
        line.push(b'\n');
        if let Err(e) = self.channel.send(&line).await {
            self.state = SessionState::Dead;
            return Err(e);
        }
        Ok(())
    }

    /// Collect output until the shell is idle.
    ///
    /// The read ends at the prompt, when output stops for `idle_timeout`, at
    /// the pager limit, or at the whole-read deadline. Ending without a
    /// prompt and without any output is a [`ChannelError::ReadTimeout`].
    pub async fn read_until_idle(&mut self, idle_timeout: Duration) -> Result<Transcript> {
        self.read(None, idle_timeout).await
    }

    /// Send a command and collect its output, with the echo removed.
    pub async fn send_command(&mut self, command: &str) -> Result<Transcript> {
        debug!("{}: sending {:?}", self.address, command);
        self.send_line(command).await?;
        self.read(Some(command), self.settings.idle_timeout).await
    }

    /// Close the session and the connection under it.
    ///
    /// Safe to call more than once; only the first call reaches the channel.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.state = SessionState::Closed;
        debug!("{}: closing session", self.address);
        self.channel.close().await
    }

    fn ensure_alive(&self) -> Result<()> {
        match self.state {
            SessionState::Connected | SessionState::Idle => Ok(()),
            SessionState::Dead => Err(ChannelError::Closed.into()),
            SessionState::Closed => Err(ChannelError::SessionClosed.into()),
        }
    }

    async fn read(&mut self, command: Option<&str>, idle_timeout: Duration) -> Result<Transcript> {
        self.ensure_alive()?;

        let start = Instant::now();
        let deadline = start + self.settings.command_timeout;
        let mut pages = 0;

        let end = loop {
            let now = Instant::now();
            if now >= deadline {
                break ReadEnd::Deadline;
            }

            let chunk = match self.channel.recv(idle_timeout.min(deadline - now)).await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break ReadEnd::Idle,
                Err(e) => {
                    self.state = SessionState::Dead;
                    return Err(e);
                }
            };
            trace!("{}: {} bytes", self.address, chunk.len());
            self.buffer.extend(&chunk);

            if let Some(range) = self.pager.find(self.buffer.tail(2)) {
                self.buffer.remove_from_tail(2, range);
                if pages >= self.settings.max_pages {
                    warn!(
                        "{}: pager limit of {} pages reached, truncating output",
                        self.address, self.settings.max_pages
                    );
                    self.quit_pager(idle_timeout).await?;
                    break ReadEnd::PageLimit;
                }
                pages += 1;
                if let Err(e) = self.channel.send(PAGER_CONTINUE).await {
                    self.state = SessionState::Dead;
                    return Err(e);
                }
                continue;
            }

            if self.prompt.matches(self.buffer.last_line()) {
                break ReadEnd::Prompt;
            }
        };

        let raw = self.buffer.take();
        let transcript = self.build_transcript(command, &raw, end, pages, start.elapsed());

        if end == ReadEnd::Prompt {
            self.state = SessionState::Idle;
            if self.prompt.learned().is_none() {
                if let Some(prompt) = &transcript.prompt {
                    self.prompt.learn(prompt);
                }
            }
        } else if transcript.is_empty() {
            return Err(ChannelError::ReadTimeout(idle_timeout).into());
        }

        Ok(transcript)
    }

    /// Leave a pager after the page limit and discard whatever follows.
    async fn quit_pager(&mut self, idle_timeout: Duration) -> Result<()> {
        let kept = self.buffer.take();
        if let Err(e) = self.channel.send(PAGER_QUIT).await {
            self.state = SessionState::Dead;
            return Err(e);
        }

        let drain_deadline = Instant::now() + idle_timeout;
        let mut drained = TranscriptBuffer::new();
        loop {
            let remaining = drain_deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.channel.recv(remaining).await {
                Ok(Some(chunk)) => {
                    drained.extend(&chunk);
                    if self.prompt.matches(drained.last_line()) {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    self.state = SessionState::Dead;
                    return Err(e);
                }
            }
        }

        self.buffer.extend(kept.as_bytes());
        Ok(())
    }

    fn build_transcript(
        &self,
        command: Option<&str>,
        raw: &str,
        end: ReadEnd,
        pages: usize,
        elapsed: Duration,
    ) -> Transcript {
        let mut lines: Vec<String> = raw.split('\n').map(|l| l.trim_end().to_string()).collect();

        let prompt = if end == ReadEnd::Prompt {
            lines.pop().map(|p| p.trim().to_string())
        } else {
            None
        };

        if let Some(command) = command.map(str::trim) {
            lines.retain(|line| !self.is_echo(line, command));
        }

        while lines.first().is_some_and(|l| l.trim().is_empty()) {
            lines.remove(0);
        }
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }

        Transcript {
            command: command.map(str::to_string),
            lines,
            prompt,
            end,
            pages,
            elapsed,
        }
    }

    /// A line echoing the sent command, either alone or after the prompt.
    fn is_echo(&self, line: &str, command: &str) -> bool {
        let line = line.trim();
        if command.is_empty() {
            return false;
        }
        if line == command {
            return true;
        }
        line.strip_suffix(command)
            .is_some_and(|before| self.prompt.matches(before))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            warn!("Session to {} dropped without close()", self.address);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("prompt", &self.prompt.learned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDevice, ScriptedChannel};

    fn settings(max_pages: usize) -> ReadSettings {
        ReadSettings {
            idle_timeout: Duration::from_millis(50),
            command_timeout: Duration::from_secs(5),
            max_pages,
        }
    }

    fn session(device: FakeDevice, max_pages: usize) -> Session {
        let channel = ScriptedChannel::new(device);
        Session::new("10.0.0.1".into(), Box::new(channel), settings(max_pages))
    }

    #[tokio::test]
    async fn test_settle_learns_prompt_after_banner() {
        let device = FakeDevice::new("(Hirschmann BOBCAT) >")
            .with_banner("Copyright (c) 2011-2023 Hirschmann\r\nWelcome\r\n");
        let mut session = session(device, 8);

        session.settle().await.unwrap();
        assert_eq!(session.prompt(), Some("(Hirschmann BOBCAT) >"));
        assert_eq!(session.state(), SessionState::Idle);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_command_echo_and_prompt_removed() {
        let device = FakeDevice::new("switch#").with_response(
            "show version",
            &["Kontron KSwitch D10", "MAC Address : 00-a0-a5-00-00-01"],
        );
        let mut session = session(device, 8);
        session.settle().await.unwrap();

        let t = session.send_command("show version").await.unwrap();
        assert_eq!(
            t.lines,
            vec!["Kontron KSwitch D10", "MAC Address : 00-a0-a5-00-00-01"]
        );
        assert_eq!(t.prompt.as_deref(), Some("switch#"));
        assert_eq!(t.end, ReadEnd::Prompt);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_pager_pages_are_joined_in_order() {
        let device = FakeDevice::new("switch#").with_pages(
            "show lldp neighbors",
            &[&["entry 1", "entry 2"], &["entry 3"], &["entry 4"]],
        );
        let mut session = session(device, 8);
        session.settle().await.unwrap();

        let t = session.send_command("show lldp neighbors").await.unwrap();
        assert_eq!(t.lines, vec!["entry 1", "entry 2", "entry 3", "entry 4"]);
        assert_eq!(t.pages, 2);
        assert!(t.is_complete());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_quit_only_pager_is_continued() {
        let device = FakeDevice::new("TPES-L308>")
            .with_pager_marker("Press <SPACE> for next page, (q)uit")
            .with_pages("show lldp info", &[&["port 1"], &["port 2"], &["port 3"]]);
        let mut session = session(device, 8);
        session.settle().await.unwrap();

        let t = session.send_command("show lldp info").await.unwrap();
        assert_eq!(t.lines, vec!["port 1", "port 2", "port 3"]);
        assert_eq!(t.pages, 2);
        assert!(t.is_complete());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_endless_pager_stops_at_limit() {
        let device = FakeDevice::new("switch#").with_endless_pager("show log");
        let mut session = session(device, 5);
        session.settle().await.unwrap();

        let t = session.send_command("show log").await.unwrap();
        assert_eq!(t.end, ReadEnd::PageLimit);
        assert_eq!(t.pages, 5);
        assert_eq!(t.lines.len(), 6);
        assert_eq!(t.lines[0], "log line 0");

        // The session is still usable after quitting the pager
        let t = session.send_command("show log").await.unwrap();
        assert_eq!(t.end, ReadEnd::PageLimit);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_idle_with_output_is_partial_success() {
        let device = FakeDevice::new("switch#").with_unterminated("show tech", &["partial 1"]);
        let mut session = session(device, 8);
        session.settle().await.unwrap();

        let t = session.send_command("show tech").await.unwrap();
        assert_eq!(t.end, ReadEnd::Idle);
        assert_eq!(t.lines, vec!["partial 1"]);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_silence_is_timeout() {
        let device = FakeDevice::new("switch#").with_unterminated("reload", &[]);
        let mut session = session(device, 8);
        session.settle().await.unwrap();

        let err = session.send_command("reload").await.unwrap_err();
        assert!(matches!(err, Error::Channel(ChannelError::ReadTimeout(_))));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_device_fails_settle() {
        let device = FakeDevice::silent();
        let mut session = session(device, 8);
        let err = session.settle().await.unwrap_err();
        assert!(matches!(err, Error::Channel(ChannelError::ReadTimeout(_))));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_final() {
        let device = FakeDevice::new("switch#");
        let closes = device.close_counter();
        let mut session = session(device, 8);
        session.settle().await.unwrap();

        session.close().await.unwrap();
        session.close().await.unwrap();
        assert_eq!(closes.get(), 1);
        assert_eq!(session.state(), SessionState::Closed);

        let err = session.send_command("show version").await.unwrap_err();
        assert!(matches!(err, Error::Channel(ChannelError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_echo_after_prompt_is_removed() {
        let device = FakeDevice::new("switch#")
            .with_response("show version", &["Kontron"])
            .with_echo_after_prompt();
        let mut session = session(device, 8);
        session.settle().await.unwrap();

        let t = session.send_command("show version").await.unwrap();
        assert_eq!(t.lines, vec!["Kontron"]);
        session.close().await.unwrap();
    }
}
