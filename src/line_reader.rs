//! Buffered physical-line splitting over files, byte streams and memory.
//!
//! In stream mode unconsumed bytes are compacted to the front of a single
//! buffer before each refill, so a line crossing a read boundary is
//! reassembled in place. The buffer grows on demand but never beyond the
//! maximum line length plus a `\r\n` terminator. Memory mode runs the same
//! scan directly over the borrowed slice.

use std::fs::File;
use std::io::{self, Read};
use std::ops::Range;
use std::path::Path;

use log::trace;
use memchr::memchr;

use crate::encoding::has_utf8_bom;
use crate::error::{CsvError, Result};

/// Default upper bound on the length of one physical line, in bytes.
pub const DEFAULT_MAX_LINE_LEN: usize = 1 << 20;

/// Initial stream buffer size.
const BLOCK_LEN: usize = 1 << 16;

enum Input<'a> {
    Memory(&'a [u8]),
    Stream(Box<dyn Read + 'a>),
}

/// Splits a source into physical lines.
///
/// # Example
///
/// ```
/// use csv_typed::LineReader;
///
/// let mut lines = LineReader::from_bytes("inline", b"first\r\nsecond\n");
/// assert_eq!(lines.next_line().unwrap(), Some(&b"first"[..]));
/// assert_eq!(lines.next_line().unwrap(), Some(&b"second"[..]));
/// assert_eq!(lines.next_line().unwrap(), None);
/// assert_eq!(lines.line_number(), 2);
/// ```
pub struct LineReader<'a> {
    name: String,
    input: Input<'a>,
    /// Stream mode storage; unused in memory mode.
    buf: Vec<u8>,
    /// Start of the unconsumed window.
    start: usize,
    /// End of valid data.
    end: usize,
    /// Span of the most recent line.
    line: Range<usize>,
    line_number: u64,
    eof: bool,
    bom_checked: bool,
    max_line_len: usize,
}

impl<'a> LineReader<'a> {
    /// Open the file at `path`. The path doubles as the display name.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<LineReader<'static>> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let file = File::open(path).map_err(|source| CsvError::CannotOpenSource {
            file: name.clone(),
            source,
        })?;
        Ok(LineReader::from_reader(name, file))
    }

    /// Read lines from any byte stream.
    pub fn from_reader<R: Read + 'a>(name: impl Into<String>, reader: R) -> Self {
        Self::new(name.into(), Input::Stream(Box::new(reader)), 0, false)
    }

    /// Read lines from a borrowed buffer without copying it.
    pub fn from_bytes(name: impl Into<String>, data: &'a [u8]) -> Self {
        Self::new(name.into(), Input::Memory(data), data.len(), true)
    }

    fn new(name: String, input: Input<'a>, end: usize, eof: bool) -> Self {
        Self {
            name,
            input,
            buf: Vec::new(),
            start: 0,
            end,
            line: 0..0,
            line_number: 0,
            eof,
            bom_checked: false,
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }

    /// Display name of the source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of the most recently returned line, 1-based; 0 before the first.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Renumber lines, e.g. when the stream starts in the middle of a file.
    /// The next line returned will be `line_number + 1`.
    pub fn set_line_number(&mut self, line_number: u64) {
        self.line_number = line_number;
    }

    /// Maximum accepted line length in bytes, excluding the terminator.
    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    /// Change the maximum accepted line length.
    pub fn set_max_line_len(&mut self, max_line_len: usize) -> &mut Self {
        self.max_line_len = max_line_len.max(1);
        self
    }

    /// Return the next physical line without its terminator, or `None` once
    /// the input is exhausted.
    pub fn next_line(&mut self) -> Result<Option<&[u8]>> {
        if self.advance()? {
            Ok(Some(self.current()))
        } else {
            Ok(None)
        }
    }

    /// The line found by the last successful [`advance`](Self::advance).
    pub fn current(&self) -> &[u8] {
        &self.data()[self.line.clone()]
    }

    /// Move to the next physical line. Returns false at end of input.
    pub fn advance(&mut self) -> Result<bool> {
        if !self.bom_checked {
            self.skip_bom()?;
        }
        let mut scanned = self.start;
        loop {
            if let Some(pos) = memchr(b'\n', &self.data()[scanned..self.end]) {
                let newline = scanned + pos;
                return self.emit(self.start, newline, newline + 1);
            }
            // one extra byte for a '\r' that may precede the next '\n'
            if self.end - self.start > self.max_line_len.saturating_add(1) {
                return Err(self.too_long(self.line_number + 1));
            }
            if self.eof {
                if self.start == self.end {
                    return Ok(false);
                }
                return self.emit(self.start, self.end, self.end);
            }
            let consumed = self.start;
            let before = self.end;
            self.refill()?;
            scanned = before - consumed;
        }
    }

    fn data(&self) -> &[u8] {
        match &self.input {
            Input::Memory(data) => *data,
            Input::Stream(_) => &self.buf[..self.end],
        }
    }

    fn emit(&mut self, begin: usize, newline: usize, next: usize) -> Result<bool> {
        self.line_number += 1;
        self.start = next;
        let mut end = newline;
        if end > begin && self.data()[end - 1] == b'\r' {
            end -= 1;
        }
        if end - begin > self.max_line_len {
            self.line = begin..begin;
            return Err(self.too_long(self.line_number));
        }
        self.line = begin..end;
        Ok(true)
    }

    fn too_long(&self, line: u64) -> CsvError {
        CsvError::LineTooLong {
            file: self.name.clone(),
            line,
            max: self.max_line_len,
        }
    }

    fn skip_bom(&mut self) -> Result<()> {
        while !self.eof && self.end < 3 {
            self.refill()?;
        }
        if has_utf8_bom(&self.data()[self.start..self.end]) {
            self.start += 3;
        }
        self.bom_checked = true;
        Ok(())
    }

    /// Compact the unconsumed window to the buffer front and read more bytes.
    fn refill(&mut self) -> Result<()> {
        let Input::Stream(reader) = &mut self.input else {
            self.eof = true;
            return Ok(());
        };

        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
            self.line = 0..0;
        }

        if self.end == self.buf.len() {
            let cap = self.max_line_len.saturating_add(2);
            let grown = self.buf.len().saturating_mul(2).clamp(BLOCK_LEN.min(cap), cap);
            trace!(
                "{}: growing line buffer from {} to {} bytes",
                self.name,
                self.buf.len(),
                grown
            );
            self.buf.resize(grown, 0);
        }

        loop {
            match reader.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => {
                    self.end += n;
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(CsvError::Io {
                        file: self.name.clone(),
                        line: self.line_number + 1,
                        source,
                    });
                }
            }
        }
        trace!("{}: refilled, {} bytes buffered", self.name, self.end);
        Ok(())
    }
}

impl std::fmt::Debug for LineReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineReader")
            .field("name", &self.name)
            .field("line_number", &self.line_number)
            .field("eof", &self.eof)
            .field("max_line_len", &self.max_line_len)
            .finish_non_exhaustive()
    }
}
