//! Transcript buffer that renders raw shell output into clean text.
//!
//! Switch CLIs emit colour codes, cursor movement and pager erase sequences
//! (`\r` followed by spaces, or backspaces). The buffer runs the byte stream
//! through a `vte` parser and applies the few terminal controls that matter
//! for line-oriented output, so that parsers see what a human would see.

use std::ops::Range;

use memchr::memrchr;

/// Accumulates cleaned shell output between reads.
pub struct TranscriptBuffer {
    parser: vte::Parser,
    screen: Screen,
}

/// The `vte` performer: a minimal line-oriented screen.
#[derive(Debug, Default)]
struct Screen {
    text: String,
    /// Byte offset in `text` where the current (last) line starts.
    line_start: usize,
    /// A carriage return was seen; the next printable overwrites the line.
    carriage_return: bool,
}

impl vte::Perform for Screen {
    fn print(&mut self, c: char) {
        if self.carriage_return {
            self.text.truncate(self.line_start);
            self.carriage_return = false;
        }
        self.text.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => {
                self.text.push('\n');
                self.line_start = self.text.len();
                self.carriage_return = false;
            }
            b'\r' => self.carriage_return = true,
            b'\t' => self.print('\t'),
            // Backspace
            0x08 => {
                if self.text.len() > self.line_start {
                    self.text.pop();
                }
            }
            _ => {}
        }
    }
}

impl TranscriptBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            parser: vte::Parser::new(),
            screen: Screen::default(),
        }
    }

    /// Feed raw bytes from the shell.
    pub fn extend(&mut self, data: &[u8]) {
        self.parser.advance(&mut self.screen, data);
    }

    /// All cleaned text accumulated since the last [`take`](Self::take).
    pub fn text(&self) -> &str {
        &self.screen.text
    }

    /// The trailing, possibly incomplete line.
    pub fn last_line(&self) -> &str {
        &self.screen.text[self.screen.line_start..]
    }

    /// Offset where the last `lines` lines begin (the current line counts
    /// as one).
    fn tail_start(&self, lines: usize) -> usize {
        let bytes = self.screen.text.as_bytes();
        let mut end = bytes.len();
        for i in 0..lines {
            match memrchr(b'\n', &bytes[..end]) {
                Some(pos) if i + 1 == lines => return pos + 1,
                Some(pos) => end = pos,
                None => return 0,
            }
        }
        end
    }

    /// The last `lines` lines (the current line counts as one).
    pub fn tail(&self, lines: usize) -> &str {
        &self.screen.text[self.tail_start(lines)..]
    }

    /// Remove a byte range given relative to [`tail`](Self::tail)`(lines)`.
    pub fn remove_from_tail(&mut self, lines: usize, range: Range<usize>) {
        let base = self.tail_start(lines);
        let len = self.screen.text.len();
        let start = (base + range.start).min(len);
        let end = (base + range.end).min(len);
        self.screen.text.replace_range(start..end, "");
        self.screen.line_start = memrchr(b'\n', self.screen.text.as_bytes())
            .map(|pos| pos + 1)
            .unwrap_or(0);
    }

    /// Whether any non-whitespace text has arrived.
    pub fn has_content(&self) -> bool {
        self.screen.text.chars().any(|c| !c.is_whitespace())
    }

    /// Take the accumulated text and reset for the next read.
    ///
    /// Parser state is kept, so an escape sequence split across reads is
    /// still recognized.
    pub fn take(&mut self) -> String {
        self.screen.line_start = 0;
        self.screen.carriage_return = false;
        std::mem::take(&mut self.screen.text)
    }

    /// Current length of the cleaned text in bytes.
    pub fn len(&self) -> usize {
        self.screen.text.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.screen.text.is_empty()
    }
}

impl Default for TranscriptBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TranscriptBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptBuffer")
            .field("len", &self.screen.text.len())
            .field("last_line", &self.last_line())
            .finish()
    }
}
