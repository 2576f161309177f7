//! Reading policies: quoting, trimming, comment skipping, overflow handling
//! and header strictness.
//!
//! Each axis is an independent value; a [`Dialect`] simply bundles the
//! construction-time ones.

use std::fmt;

use crate::error::{CsvError, Result};

/// A set of bytes, used for trim characters and comment markers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ByteSet {
    bits: [u64; 4],
}

impl ByteSet {
    /// The empty set.
    pub const EMPTY: ByteSet = ByteSet { bits: [0; 4] };

    /// Build a set from the given bytes.
    pub const fn new(bytes: &[u8]) -> Self {
        let mut bits = [0u64; 4];
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i] as usize;
            bits[b >> 6] |= 1 << (b & 63);
            i += 1;
        }
        Self { bits }
    }

    /// Returns true if `byte` is in the set.
    #[inline]
    pub const fn contains(&self, byte: u8) -> bool {
        let b = byte as usize;
        self.bits[b >> 6] & (1 << (b & 63)) != 0
    }

    /// Returns true if the set has no members.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.bits[0] == 0 && self.bits[1] == 0 && self.bits[2] == 0 && self.bits[3] == 0
    }

    /// Iterate over the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..=u8::MAX).filter(|&b| self.contains(b))
    }

    /// Strip members of the set from both ends of `bytes`.
    #[inline]
    pub fn trim<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        let start = bytes
            .iter()
            .position(|&b| !self.contains(b))
            .unwrap_or(bytes.len());
        let end = bytes
            .iter()
            .rposition(|&b| !self.contains(b))
            .map_or(start, |i| i + 1);
        &bytes[start..end]
    }

    /// Strip members of the set from the start of `bytes`.
    #[inline]
    pub fn trim_start<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        let start = bytes
            .iter()
            .position(|&b| !self.contains(b))
            .unwrap_or(bytes.len());
        &bytes[start..]
    }
}

impl fmt::Debug for ByteSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.iter().map(|b| b as char))
            .finish()
    }
}

impl From<&[u8]> for ByteSet {
    fn from(bytes: &[u8]) -> Self {
        ByteSet::new(bytes)
    }
}

/// Quote character configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Quote {
    /// No quoting.
    #[default]
    None,
    /// Quote with the specified character. Doubling it inside a quoted
    /// field yields a literal quote.
    Some(u8),
}

impl Quote {
    /// Returns the quote character if set.
    pub fn char(&self) -> Option<u8> {
        match self {
            Quote::None => None,
            Quote::Some(c) => Some(*c),
        }
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quote::None => write!(f, "none"),
            Quote::Some(c) => write!(f, "{}", *c as char),
        }
    }
}

/// Which physical lines are skipped before tokenizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comment {
    /// Every line is data.
    #[default]
    None,
    /// Lines whose first byte (after leading trim bytes) is a marker.
    Prefix(ByteSet),
    /// Empty lines and lines made only of spaces and tabs.
    Blank,
    /// Both marker lines and blank lines.
    PrefixOrBlank(ByteSet),
}

impl Comment {
    /// Skip lines starting with any of `markers`.
    pub const fn prefix(markers: &[u8]) -> Self {
        Comment::Prefix(ByteSet::new(markers))
    }

    /// Skip lines starting with any of `markers`, and blank lines.
    pub const fn prefix_or_blank(markers: &[u8]) -> Self {
        Comment::PrefixOrBlank(ByteSet::new(markers))
    }

    /// Returns true if `line` should be skipped. `trim` is the field trim set,
    /// whose bytes may precede a marker up to the first `delimiter`.
    pub fn is_comment(&self, line: &[u8], trim: &ByteSet, delimiter: u8) -> bool {
        match self {
            Comment::None => false,
            Comment::Prefix(markers) => starts_with_marker(line, markers, trim, delimiter),
            Comment::Blank => is_blank(line),
            Comment::PrefixOrBlank(markers) => {
                is_blank(line) || starts_with_marker(line, markers, trim, delimiter)
            }
        }
    }
}

fn starts_with_marker(line: &[u8], markers: &ByteSet, trim: &ByteSet, delimiter: u8) -> bool {
    line.iter()
        .find(|&&b| b == delimiter || !trim.contains(b))
        .is_some_and(|&b| markers.contains(b))
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|&b| b == b' ' || b == b'\t')
}

/// What happens when a numeric field does not fit its destination type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Overflow {
    /// Fail the row with an overflow or underflow error.
    #[default]
    Fail,
    /// Saturate at the destination type's minimum or maximum.
    Clamp,
}

/// Header strictness, chosen per [`read_header`](crate::CsvReader::read_header) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderPolicy {
    /// Tolerate header columns that were not requested.
    pub ignore_extra: bool,
    /// Tolerate requested columns that are absent from the header.
    pub ignore_missing: bool,
}

impl HeaderPolicy {
    /// Header must contain exactly the requested columns.
    pub const STRICT: HeaderPolicy = HeaderPolicy::new(false, false);
    /// Unrequested header columns are skipped.
    pub const IGNORE_EXTRA: HeaderPolicy = HeaderPolicy::new(true, false);
    /// Requested columns may be absent.
    pub const IGNORE_MISSING: HeaderPolicy = HeaderPolicy::new(false, true);
    /// Both relaxations.
    pub const IGNORE_EXTRA_AND_MISSING: HeaderPolicy = HeaderPolicy::new(true, true);

    /// Create a new header policy.
    pub const fn new(ignore_extra: bool, ignore_missing: bool) -> Self {
        Self {
            ignore_extra,
            ignore_missing,
        }
    }
}

/// Construction-time reading policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Dialect {
    /// Field delimiter character.
    pub delimiter: u8,
    /// Quote character configuration.
    pub quote: Quote,
    /// Bytes stripped from both ends of every field.
    pub trim: ByteSet,
    /// Comment and blank line handling.
    pub comment: Comment,
    /// Numeric overflow handling.
    pub overflow: Overflow,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: Quote::None,
            trim: ByteSet::new(b" \t"),
            comment: Comment::None,
            overflow: Overflow::Fail,
        }
    }
}

impl Dialect {
    /// Check that the axes do not contradict each other.
    pub fn validate(&self) -> Result<()> {
        if matches!(self.delimiter, b'\n' | b'\r') {
            return Err(CsvError::InvalidConfig(
                "delimiter cannot be a line terminator".to_string(),
            ));
        }
        if let Quote::Some(q) = self.quote {
            if matches!(q, b'\n' | b'\r') {
                return Err(CsvError::InvalidConfig(
                    "quote cannot be a line terminator".to_string(),
                ));
            }
            if q == self.delimiter {
                return Err(CsvError::InvalidConfig(format!(
                    "quote and delimiter are both {:?}",
                    q as char
                )));
            }
            if self.trim.contains(q) {
                return Err(CsvError::InvalidConfig(format!(
                    "quote {:?} is also a trim character",
                    q as char
                )));
            }
        }
        Ok(())
    }
}
