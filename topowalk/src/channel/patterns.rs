//! Prompt and pager detection.
//!
//! The device type is unknown when a session opens, so the prompt is first
//! recognized by shape alone. Once a prompt has been seen it is remembered
//! and later reads wait for exactly that prompt.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Generic CLI prompt shape: up to 63 hostname-ish characters followed by
/// one of the usual prompt terminators, e.g. `(Hirschmann BOBCAT) >`,
/// `switch#`, `!RSP35>`, `admin@nomad:~$` or a bare `#`.
const GENERIC_PROMPT: &str = r"^[\w.\-@/:~\[\]()!* ]{0,63}[>#$%]$";

/// Pager markers: HiOS `--More-- or (q)uit`, iStaX `-- more --, next page:
/// Space, continue: g, quit: ^C`, Lantech `Press <SPACE> for next page,
/// (q)uit` and generic `Press any key to continue`. A bare `(q)uit` marks
/// the whole line it ends.
const PAGER: &str = r"(?i)(?:-{2,}\s*more\s*-{2,}|next page:\s*space|press any key to continue|[^\n]*\(q\)uit)[^\n]*";

static GENERIC_PROMPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(GENERIC_PROMPT).expect("generic prompt pattern is valid"));

static PAGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PAGER).expect("pager pattern is valid"));

/// Decides whether a trailing line is the device's idle prompt.
#[derive(Debug, Clone)]
pub struct PromptMatcher {
    shape: Regex,
    learned: Option<String>,
}

impl PromptMatcher {
    /// Matcher using the generic prompt shape.
    pub fn new() -> Self {
        Self {
            shape: GENERIC_PROMPT_RE.clone(),
            learned: None,
        }
    }

    /// Matcher using a custom prompt shape.
    pub fn with_shape(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            shape: Regex::new(pattern)?,
            learned: None,
        })
    }

    /// Check a trailing line against the learned prompt, or against the
    /// generic shape while no prompt has been learned.
    pub fn matches(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        match &self.learned {
            Some(prompt) => line == prompt,
            None => self.shape.is_match(line),
        }
    }

    /// Remember `line` as the device prompt if it has prompt shape.
    pub fn learn(&mut self, line: &str) -> bool {
        let line = line.trim();
        if !line.is_empty() && self.shape.is_match(line) {
            self.learned = Some(line.to_string());
            true
        } else {
            false
        }
    }

    /// The learned prompt, if any.
    pub fn learned(&self) -> Option<&str> {
        self.learned.as_deref()
    }
}

impl Default for PromptMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Finds pagination markers in shell output.
#[derive(Debug, Clone)]
pub struct PagerMatcher {
    pattern: Regex,
}

impl PagerMatcher {
    /// Matcher for the built-in pager markers.
    pub fn new() -> Self {
        Self {
            pattern: PAGER_RE.clone(),
        }
    }

    /// Matcher for a custom marker pattern.
    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// Byte range of the first marker in `text`.
    pub fn find(&self, text: &str) -> Option<Range<usize>> {
        self.pattern.find(text).map(|m| m.range())
    }
}

impl Default for PagerMatcher {
    fn default() -> Self {
        Self::new()
    }
}
