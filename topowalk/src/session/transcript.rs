//! Transcript type for command execution results.

use std::fmt;
use std::time::Duration;

/// How a read finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadEnd {
    /// The shell returned to its prompt.
    Prompt,
    /// Output stopped for the idle timeout without a prompt.
    Idle,
    /// The pager continuation limit was reached.
    PageLimit,
    /// The whole-command deadline passed while output kept arriving.
    Deadline,
}

/// Output of one read from an interactive shell.
#[derive(Debug, Clone)]
pub struct Transcript {
    /// The command that was sent, if this read followed a command.
    pub command: Option<String>,

    /// Output lines in arrival order: echo, pager markers and the trailing
    /// prompt removed.
    pub lines: Vec<String>,

    /// The prompt line that ended the read, if any.
    pub prompt: Option<String>,

    /// How the read finished.
    pub end: ReadEnd,

    /// Pager continuations sent during the read.
    pub pages: usize,

    /// Time taken by the read.
    pub elapsed: Duration,
}

impl Transcript {
    /// The output lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Whether the read ended at the prompt.
    pub fn is_complete(&self) -> bool {
        self.end == ReadEnd::Prompt
    }

    /// Whether no output lines were collected.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Case-insensitive substring search over the whole output.
    pub fn contains_ignore_case(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.lines
            .iter()
            .any(|line| line.to_lowercase().contains(&needle))
    }

    /// Get the output lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(lines: &[&str]) -> Transcript {
        Transcript {
            command: Some("show version".into()),
            lines: lines.iter().map(|l| l.to_string()).collect(),
            prompt: Some("switch#".into()),
            end: ReadEnd::Prompt,
            pages: 0,
            elapsed: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_text_joins_in_order() {
        let t = transcript(&["a", "b", "c"]);
        assert_eq!(t.text(), "a\nb\nc");
        assert_eq!(t.to_string(), "a\nb\nc");
        assert!(t.is_complete());
    }

    #[test]
    fn test_contains_ignore_case() {
        let t = transcript(&["Kontron KSwitch D10 MMT", "Version 4.1"]);
        assert!(t.contains_ignore_case("kswitch"));
        assert!(t.contains_ignore_case("KONTRON"));
        assert!(!t.contains_ignore_case("hirschmann"));
    }
}
