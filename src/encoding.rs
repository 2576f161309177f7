//! Charset transcoding with `encoding_rs`, charset guessing with chardetng,
//! and the tied sink that transcodes a field straight into a caller variable.

use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};
use log::debug;
use simdutf8::basic::from_utf8;
use thiserror::Error;

use crate::parse::convert::{FieldError, FieldSink};
use crate::policy::Overflow;

/// Check if the given bytes are valid UTF-8.
///
/// Uses SIMD-accelerated validation for performance.
pub fn is_utf8(data: &[u8]) -> bool {
    from_utf8(data).is_ok()
}

/// Check if the data starts with a UTF-8 BOM (Byte Order Mark).
///
/// The UTF-8 BOM is the byte sequence: EF BB BF
pub fn has_utf8_bom(data: &[u8]) -> bool {
    data.starts_with(&[0xEF, 0xBB, 0xBF])
}

/// Skip the UTF-8 BOM if present and return the remaining data.
pub fn skip_bom(data: &[u8]) -> &[u8] {
    if has_utf8_bom(data) { &data[3..] } else { data }
}

/// Guess the charset of a sample and return its canonical name.
///
/// Valid UTF-8 is reported as UTF-8 without consulting the detector.
pub fn detect_charset(sample: &[u8]) -> &'static str {
    if is_utf8(skip_bom(sample)) {
        return UTF_8.name();
    }
    let mut detector = EncodingDetector::new();
    detector.feed(sample, true);
    detector.guess(None, true).name()
}

/// Errors raised by [`Converter`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("unknown charset \"{0}\"")]
    UnknownCharset(String),
    #[error("input is not valid {charset}")]
    Malformed { charset: &'static str },
    #[error("character {ch:?} cannot be represented in {charset}")]
    Unmappable { charset: &'static str, ch: char },
}

/// Transcodes byte strings from one charset to another.
///
/// Holds no per-conversion state, so one converter can serve any number of
/// readers and threads.
///
/// # Example
///
/// ```
/// use csv_typed::Converter;
///
/// let utf2gbk = Converter::new("GBK", "UTF-8").unwrap();
/// let gbk = utf2gbk.convert("赵".as_bytes()).unwrap();
/// assert_eq!(gbk, b"\xD5\xD4");
/// assert_eq!(utf2gbk.reversed().convert(&gbk).unwrap(), "赵".as_bytes());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Converter {
    to: &'static Encoding,
    from: &'static Encoding,
}

impl Converter {
    /// Build a converter from charset `from` to charset `to`, both given as
    /// WHATWG labels (`"UTF-8"`, `"gbk"`, `"latin1"`, `"shift_jis"`, ...).
    pub fn new(to: &str, from: &str) -> Result<Self, EncodingError> {
        Ok(Self {
            to: resolve(to)?,
            from: resolve(from)?,
        })
    }

    /// Canonical name of the target charset.
    pub fn to_charset(&self) -> &'static str {
        self.to.name()
    }

    /// Canonical name of the source charset.
    pub fn from_charset(&self) -> &'static str {
        self.from.name()
    }

    /// The converter for the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            to: self.from,
            from: self.to,
        }
    }

    /// Transcode `input` into a new buffer.
    pub fn convert(&self, input: &[u8]) -> Result<Vec<u8>, EncodingError> {
        let mut output = Vec::with_capacity(input.len());
        self.convert_into(input, &mut output)?;
        Ok(output)
    }

    /// Transcode `input`, replacing the contents of `output`.
    ///
    /// On error `output` holds unspecified partial data.
    pub fn convert_into(&self, input: &[u8], output: &mut Vec<u8>) -> Result<(), EncodingError> {
        output.clear();
        let text = self.decode(input)?;
        self.encode(&text, output)
    }

    /// Transcode `value` in place. On failure `value` is left unchanged and
    /// false is returned.
    pub fn try_convert(&self, value: &mut Vec<u8>) -> bool {
        match self.convert(value) {
            Ok(converted) => {
                *value = converted;
                true
            }
            Err(e) => {
                debug!(
                    "{} -> {} conversion left value unchanged: {e}",
                    self.from_charset(),
                    self.to_charset()
                );
                false
            }
        }
    }

    fn decode<'i>(&self, input: &'i [u8]) -> Result<Cow<'i, str>, EncodingError> {
        if self.from == UTF_8 {
            return from_utf8(input)
                .map(Cow::Borrowed)
                .map_err(|_| EncodingError::Malformed {
                    charset: UTF_8.name(),
                });
        }
        self.from
            .decode_without_bom_handling_and_without_replacement(input)
            .ok_or(EncodingError::Malformed {
                charset: self.from.name(),
            })
    }

    fn encode(&self, text: &str, output: &mut Vec<u8>) -> Result<(), EncodingError> {
        // encoding_rs only decodes UTF-16
        if self.to == UTF_16LE {
            output.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
            return Ok(());
        }
        if self.to == UTF_16BE {
            output.extend(text.encode_utf16().flat_map(u16::to_be_bytes));
            return Ok(());
        }
        if self.to == UTF_8 {
            output.extend_from_slice(text.as_bytes());
            return Ok(());
        }

        let (bytes, _, had_unmappable) = self.to.encode(text);
        if had_unmappable {
            return Err(EncodingError::Unmappable {
                charset: self.to.name(),
                ch: self.first_unmappable(text),
            });
        }
        output.extend_from_slice(&bytes);
        Ok(())
    }

    fn first_unmappable(&self, text: &str) -> char {
        let mut buf = [0u8; 4];
        text.chars()
            .find(|c| self.to.encode(c.encode_utf8(&mut buf)).2)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
    }
}

fn resolve(label: &str) -> Result<&'static Encoding, EncodingError> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| EncodingError::UnknownCharset(label.to_string()))
}

/// Destinations a [`Tied`] sink can write into.
pub trait TiedTarget {
    /// Replace the destination with `bytes`.
    fn store(&mut self, bytes: Vec<u8>) -> Result<(), FieldError>;
}

impl TiedTarget for Vec<u8> {
    fn store(&mut self, bytes: Vec<u8>) -> Result<(), FieldError> {
        *self = bytes;
        Ok(())
    }
}

impl TiedTarget for String {
    fn store(&mut self, bytes: Vec<u8>) -> Result<(), FieldError> {
        *self = String::from_utf8(bytes).map_err(|_| FieldError::InvalidUtf8)?;
        Ok(())
    }
}

/// A row sink that transcodes its field through a converter into a borrowed
/// destination. Build it right before the row read that uses it.
#[derive(Debug)]
pub struct Tied<'a, D: ?Sized> {
    converter: &'a Converter,
    dest: &'a mut D,
}

/// Tie `dest` to `converter` for one row read.
///
/// ```
/// use csv_typed::{Converter, ReaderBuilder, tie};
///
/// let gbk2utf = Converter::new("UTF-8", "GBK").unwrap();
/// let data = b"id,name\n1,\xD5\xD4\n";
/// let mut reader = ReaderBuilder::new(2).from_bytes("gbk.csv", data).unwrap();
/// reader.read_header(Default::default(), &["id", "name"]).unwrap();
///
/// let (mut id, mut name) = (0u32, String::new());
/// while reader.read_row((&mut id, tie(&gbk2utf, &mut name))).unwrap() {
///     assert_eq!(name, "赵");
/// }
/// ```
pub fn tie<'a, D: TiedTarget + ?Sized>(converter: &'a Converter, dest: &'a mut D) -> Tied<'a, D> {
    Tied { converter, dest }
}

impl<D: TiedTarget + ?Sized> FieldSink for Tied<'_, D> {
    fn accept(&mut self, field: &[u8], _: Overflow) -> Result<(), FieldError> {
        let converted = self.converter.convert(field)?;
        self.dest.store(converted)
    }
}
