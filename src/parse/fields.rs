//! Quote-aware splitting of one physical line into cleaned fields.

use std::borrow::Cow;

use memchr::memchr;

use crate::policy::{ByteSet, Dialect, Quote};

/// A quoted field was still open at the end of the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unterminated {
    /// 1-based physical position of the offending field.
    pub field: usize,
}

/// Iterator over the cleaned fields of a line.
///
/// An empty line yields a single empty field. After an [`Unterminated`]
/// error the iterator is exhausted.
#[derive(Debug, Clone)]
pub struct Fields<'l> {
    line: &'l [u8],
    pos: usize,
    done: bool,
    index: usize,
    delimiter: u8,
    quote: Quote,
    trim: ByteSet,
}

impl<'l> Fields<'l> {
    pub fn new(line: &'l [u8], dialect: &Dialect) -> Self {
        Self {
            line,
            pos: 0,
            done: false,
            index: 0,
            delimiter: dialect.delimiter,
            quote: dialect.quote,
            trim: dialect.trim,
        }
    }

    /// Find the end of the raw field starting at `self.pos`.
    fn raw_end(&self, quote: Option<u8>) -> Option<usize> {
        let rest = &self.line[self.pos..];
        let Some(q) = quote else {
            return Some(memchr(self.delimiter, rest).map_or(self.line.len(), |i| self.pos + i));
        };

        let next_delimiter = memchr(self.delimiter, rest);
        // leading trim bytes never reach past the field's own delimiter
        let head = &rest[..next_delimiter.unwrap_or(rest.len())];
        let lead = head.len() - self.trim.trim_start(head).len();
        if head.get(lead) != Some(&q) {
            return Some(next_delimiter.map_or(self.line.len(), |i| self.pos + i));
        }

        // inside quotes: a doubled quote is literal, a single one closes
        let mut i = self.pos + lead + 1;
        loop {
            let close = i + memchr(q, &self.line[i..])?;
            if self.line.get(close + 1) == Some(&q) {
                i = close + 2;
                continue;
            }
            let after = close + 1;
            return Some(
                memchr(self.delimiter, &self.line[after..]).map_or(self.line.len(), |j| after + j),
            );
        }
    }
}

impl<'l> Iterator for Fields<'l> {
    type Item = Result<Cow<'l, [u8]>, Unterminated>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.index += 1;

        let Some(end) = self.raw_end(self.quote.char()) else {
            self.done = true;
            return Some(Err(Unterminated { field: self.index }));
        };

        let raw = &self.line[self.pos..end];
        if end == self.line.len() {
            self.done = true;
        } else {
            self.pos = end + 1;
        }
        Some(Ok(clean(raw, self.trim, self.quote)))
    }
}

/// Trim a raw field, then strip its outer quotes and collapse doubled quotes.
///
/// Only borrows unless a doubled quote has to be collapsed.
pub fn clean(raw: &[u8], trim: ByteSet, quote: Quote) -> Cow<'_, [u8]> {
    let field = trim.trim(raw);
    let Quote::Some(q) = quote else {
        return Cow::Borrowed(field);
    };
    if field.len() < 2 || field[0] != q || field[field.len() - 1] != q {
        return Cow::Borrowed(field);
    }

    let inner = &field[1..field.len() - 1];
    let Some(first) = memchr(q, inner) else {
        return Cow::Borrowed(inner);
    };

    let mut out = Vec::with_capacity(inner.len());
    out.extend_from_slice(&inner[..first]);
    let mut bytes = inner[first..].iter().copied().peekable();
    while let Some(b) = bytes.next() {
        out.push(b);
        if b == q && bytes.peek() == Some(&q) {
            bytes.next();
        }
    }
    Cow::Owned(out)
}
