//! csv-typed: a streaming, typed CSV reader
//!
//! Reads delimiter-separated text line by line from a file, any byte stream
//! or a borrowed buffer, and writes each row straight into caller variables of
//! the requested types. Memory use is bounded by the longest line, not by the
//! size of the input.
//!
//! # Quick Start
//!
//! ```
//! use csv_typed::{HeaderPolicy, ReaderBuilder};
//!
//! let data = b"id,first_name,last_name\n1,zhao,yishang\n2,qian,erbai\n";
//! let mut reader = ReaderBuilder::new(3).from_bytes("people.csv", data).unwrap();
//! reader
//!     .read_header(HeaderPolicy::STRICT, &["id", "last_name", "first_name"])
//!     .unwrap();
//!
//! let mut id = 0u32;
//! let mut last = String::new();
//! let mut first = String::new();
//! while reader.read_row((&mut id, &mut last, &mut first)).unwrap() {
//!     println!("{id}: {first} {last}");
//! }
//! assert_eq!(reader.rows_read(), 2);
//! ```
//!
//! # Policies
//!
//! Quoting, trimming, comment skipping and overflow handling are independent
//! settings on [`ReaderBuilder`]:
//!
//! ```
//! use csv_typed::{Comment, Overflow, Quote, ReaderBuilder};
//!
//! let mut builder = ReaderBuilder::new(3);
//! builder
//!     .delimiter(b'|')
//!     .quote(Quote::Some(b'"'))
//!     .trim(b" \t")
//!     .comment(Comment::prefix_or_blank(b"#"))
//!     .overflow(Overflow::Clamp);
//! ```
//!
//! Header strictness is chosen per [`CsvReader::read_header`] call with a
//! [`HeaderPolicy`].
//!
//! # Encodings
//!
//! Fields in another charset can be transcoded while the row is read by
//! passing a [`tie`]d sink built from a [`Converter`].

mod columns;
mod encoding;
mod error;
mod line_reader;
mod parse;
mod policy;
mod reader;

pub use error::{CsvError, Result};
pub use line_reader::{DEFAULT_MAX_LINE_LEN, LineReader};
pub use parse::convert::{FieldError, FieldSink, RowSinks};
pub use policy::{ByteSet, Comment, Dialect, HeaderPolicy, Overflow, Quote};
pub use reader::{CsvReader, ReaderBuilder};

pub use encoding::{
    Converter, EncodingError, Tied, TiedTarget, detect_charset, has_utf8_bom, is_utf8, skip_bom,
    tie,
};
