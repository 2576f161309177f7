//! The typed CSV reader and its builder.

use std::io::Read;
use std::path::Path;

use log::debug;

use crate::columns::{ColumnMap, HeaderMismatch};
use crate::error::{CsvError, Result};
use crate::line_reader::{DEFAULT_MAX_LINE_LEN, LineReader};
use crate::parse::convert::{FieldError, RowSinks};
use crate::parse::fields::{Fields, Unterminated};
use crate::policy::{ByteSet, Comment, Dialect, HeaderPolicy, Overflow, Quote};

/// Configures and builds a [`CsvReader`].
///
/// # Example
///
/// ```
/// use csv_typed::{Comment, HeaderPolicy, Quote, ReaderBuilder};
///
/// let data = b"# people\nid;name\n1;\"Li\"\"Lee\"\n";
/// let mut reader = ReaderBuilder::new(2)
///     .delimiter(b';')
///     .quote(Quote::Some(b'"'))
///     .comment(Comment::prefix(b"#"))
///     .from_bytes("people.csv", data)
///     .unwrap();
/// reader.read_header(HeaderPolicy::STRICT, &["name", "id"]).unwrap();
///
/// let (mut name, mut id) = (String::new(), 0u32);
/// assert!(reader.read_row((&mut name, &mut id)).unwrap());
/// assert_eq!((name.as_str(), id), ("Li\"Lee", 1));
/// ```
#[derive(Debug, Clone)]
pub struct ReaderBuilder {
    columns: usize,
    dialect: Dialect,
    max_line_len: usize,
    allow_short_rows: bool,
    allow_long_rows: bool,
}

impl ReaderBuilder {
    /// Create a builder for rows of `columns` values with the default dialect:
    /// comma delimited, unquoted, space and tab trimmed, no comments, failing
    /// on numeric overflow.
    pub fn new(columns: usize) -> Self {
        Self {
            columns,
            dialect: Dialect::default(),
            max_line_len: DEFAULT_MAX_LINE_LEN,
            allow_short_rows: false,
            allow_long_rows: false,
        }
    }

    /// Replace the whole dialect.
    pub fn dialect(&mut self, dialect: Dialect) -> &mut Self {
        self.dialect = dialect;
        self
    }

    /// Set the field delimiter.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.dialect.delimiter = delimiter;
        self
    }

    /// Set the quote character, or disable quoting.
    pub fn quote(&mut self, quote: Quote) -> &mut Self {
        self.dialect.quote = quote;
        self
    }

    /// Set the bytes trimmed from both ends of every field.
    pub fn trim(&mut self, chars: &[u8]) -> &mut Self {
        self.dialect.trim = ByteSet::new(chars);
        self
    }

    /// Set the comment and blank line policy.
    pub fn comment(&mut self, comment: Comment) -> &mut Self {
        self.dialect.comment = comment;
        self
    }

    /// Set the numeric overflow policy.
    pub fn overflow(&mut self, overflow: Overflow) -> &mut Self {
        self.dialect.overflow = overflow;
        self
    }

    /// Set the maximum physical line length in bytes.
    pub fn max_line_len(&mut self, max_line_len: usize) -> &mut Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Accept rows with fewer fields than the header; the missing trailing
    /// fields are converted from an empty field.
    pub fn allow_short_rows(&mut self, yes: bool) -> &mut Self {
        self.allow_short_rows = yes;
        self
    }

    /// Accept rows with more fields than the header; the extra trailing
    /// fields are discarded.
    pub fn allow_long_rows(&mut self, yes: bool) -> &mut Self {
        self.allow_long_rows = yes;
        self
    }

    /// Read the file at `path`.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<CsvReader<'static>> {
        self.validate()?;
        let lines = LineReader::open(path)?;
        Ok(self.build(lines))
    }

    /// Read from any byte stream.
    pub fn from_reader<'a, R: Read + 'a>(
        &self,
        name: impl Into<String>,
        reader: R,
    ) -> Result<CsvReader<'a>> {
        self.validate()?;
        Ok(self.build(LineReader::from_reader(name, reader)))
    }

    /// Read from a borrowed buffer; the reader never copies it.
    pub fn from_bytes<'a>(&self, name: impl Into<String>, data: &'a [u8]) -> Result<CsvReader<'a>> {
        self.validate()?;
        Ok(self.build(LineReader::from_bytes(name, data)))
    }

    fn validate(&self) -> Result<()> {
        if self.columns == 0 {
            return Err(CsvError::InvalidConfig(
                "a reader needs at least one column".to_string(),
            ));
        }
        self.dialect.validate()
    }

    fn build<'a>(&self, mut lines: LineReader<'a>) -> CsvReader<'a> {
        lines.set_max_line_len(self.max_line_len);
        CsvReader {
            lines,
            dialect: self.dialect.clone(),
            columns: self.columns,
            map: ColumnMap::identity(self.columns),
            allow_short_rows: self.allow_short_rows,
            allow_long_rows: self.allow_long_rows,
            rows_read: 0,
        }
    }
}

/// Reads typed rows of a fixed number of columns.
///
/// Outputs are passed to [`read_row`](Self::read_row) as a tuple (or slice) of
/// sinks, in the order the columns were requested in
/// [`read_header`](Self::read_header), regardless of their order on disk.
#[derive(Debug)]
pub struct CsvReader<'a> {
    lines: LineReader<'a>,
    dialect: Dialect,
    columns: usize,
    map: ColumnMap,
    allow_short_rows: bool,
    allow_long_rows: bool,
    rows_read: u64,
}

impl<'a> CsvReader<'a> {
    /// Read the header line and map the requested `names` onto it.
    pub fn read_header(&mut self, policy: HeaderPolicy, names: &[&str]) -> Result<()> {
        ColumnMap::check_request(self.columns, names)?;
        if !self.next_data_line()? {
            return Err(CsvError::HeaderMissing {
                file: self.lines.name().to_string(),
            });
        }

        let fields = Fields::new(self.lines.current(), &self.dialect)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| self.unterminated(e))?;

        let map = ColumnMap::resolve(names, fields.iter().map(|f| &**f), policy)
            .map_err(|mismatch| {
                let file = self.lines.name().to_string();
                let line = self.lines.line_number();
                match mismatch {
                    HeaderMismatch::Duplicate(column) => {
                        CsvError::DuplicateColumnInHeader { file, line, column }
                    }
                    HeaderMismatch::Missing(column) => {
                        CsvError::ColumnMissingInHeader { file, line, column }
                    }
                    HeaderMismatch::Extra(column) => {
                        CsvError::ExtraColumnInHeader { file, line, column }
                    }
                }
            })?;
        debug!(
            "{}: header on line {} maps {} physical column(s) onto {:?}",
            self.lines.name(),
            self.lines.line_number(),
            map.physical().len(),
            names
        );
        self.map = map;
        Ok(())
    }

    /// Use `names` as the header without reading one; physical column order
    /// equals the order of `names`.
    pub fn set_header(&mut self, names: &[&str]) -> Result<()> {
        ColumnMap::check_request(self.columns, names)?;
        self.map = ColumnMap::in_order(names);
        Ok(())
    }

    /// True if `name` was requested and found in the header.
    pub fn has_column(&self, name: &str) -> bool {
        self.map.has_column(name)
    }

    /// Requested column names, in slot order. Empty until a header is set.
    pub fn column_names(&self) -> &[String] {
        self.map.names()
    }

    /// Read the next data row into `out`. Returns false at end of input, in
    /// which case `out` is untouched.
    ///
    /// A failed read consumes its line; reading again continues with the next
    /// one.
    pub fn read_row<R: RowSinks>(&mut self, mut out: R) -> Result<bool> {
        if out.width() != self.columns {
            return Err(CsvError::InvalidConfig(format!(
                "{} output(s) given for a reader of {} column(s)",
                out.width(),
                self.columns
            )));
        }
        if !self.next_data_line()? {
            return Ok(false);
        }

        let physical = self.map.physical();
        let overflow = self.dialect.overflow;
        let mut seen = 0;
        for field in Fields::new(self.lines.current(), &self.dialect) {
            if seen == physical.len() {
                if !self.allow_long_rows {
                    return Err(CsvError::TooManyColumns {
                        file: self.lines.name().to_string(),
                        line: self.lines.line_number(),
                        expected: physical.len(),
                    });
                }
                debug!(
                    "{}: dropping extra fields on line {}",
                    self.lines.name(),
                    self.lines.line_number()
                );
                break;
            }
            let field = field.map_err(|e| self.unterminated(e))?;
            if let Some(slot) = physical[seen] {
                out.accept(slot, &field, overflow)
                    .map_err(|e| self.field_error(slot, &field, e))?;
            }
            seen += 1;
        }

        if seen < physical.len() {
            if !self.allow_short_rows {
                return Err(CsvError::TooFewColumns {
                    file: self.lines.name().to_string(),
                    line: self.lines.line_number(),
                    expected: physical.len(),
                    found: seen,
                });
            }
            debug!(
                "{}: padding line {} from {} to {} field(s)",
                self.lines.name(),
                self.lines.line_number(),
                seen,
                physical.len()
            );
            for &slot in physical[seen..].iter().flatten() {
                out.accept(slot, b"", overflow)
                    .map_err(|e| self.field_error(slot, b"", e))?;
            }
        }

        self.rows_read += 1;
        Ok(true)
    }

    /// Next raw physical line, bypassing comment skipping and tokenizing.
    pub fn next_line(&mut self) -> Result<Option<&[u8]>> {
        self.lines.next_line()
    }

    /// Number of the last physical line read.
    pub fn line_number(&self) -> u64 {
        self.lines.line_number()
    }

    /// Renumber physical lines; the next line read is `line_number + 1`.
    pub fn set_line_number(&mut self, line_number: u64) {
        self.lines.set_line_number(line_number);
    }

    /// Display name of the source.
    pub fn source_name(&self) -> &str {
        self.lines.name()
    }

    /// Data rows successfully read so far.
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    /// The reader's policies.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Advance to the next line that is neither a comment nor blank.
    fn next_data_line(&mut self) -> Result<bool> {
        while self.lines.advance()? {
            if !self
                .dialect
                .comment
                .is_comment(self.lines.current(), &self.dialect.trim, self.dialect.delimiter)
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn unterminated(&self, e: Unterminated) -> CsvError {
        CsvError::UnterminatedQuotedField {
            file: self.lines.name().to_string(),
            line: self.lines.line_number(),
            field: e.field,
        }
    }

    fn field_error(&self, slot: usize, field: &[u8], e: FieldError) -> CsvError {
        let file = self.lines.name().to_string();
        let line = self.lines.line_number();
        let column = self.map.display_name(slot);
        let value = String::from_utf8_lossy(field).into_owned();
        match e {
            FieldError::Overflow => CsvError::IntegerOverflow {
                file,
                line,
                column,
                value,
            },
            FieldError::Underflow => CsvError::IntegerUnderflow {
                file,
                line,
                column,
                value,
            },
            FieldError::Invalid => CsvError::InvalidNumericField {
                file,
                line,
                column,
                value,
            },
            FieldError::InvalidUtf8 => CsvError::InvalidUtf8Field { file, line, column },
            FieldError::Encoding(source) => CsvError::EncodingConversionFailed {
                file,
                line,
                column,
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_validation() {
        assert!(matches!(
            ReaderBuilder::new(0).from_bytes("buf", b""),
            Err(CsvError::InvalidConfig(_))
        ));
        assert!(matches!(
            ReaderBuilder::new(2)
                .delimiter(b'"')
                .quote(Quote::Some(b'"'))
                .from_bytes("buf", b""),
            Err(CsvError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_positional_rows_without_header() {
        let mut reader = ReaderBuilder::new(2).from_bytes("buf", b"1,a\n2,b\n").unwrap();
        let (mut n, mut s) = (0u8, String::new());
        assert!(reader.read_row((&mut n, &mut s)).unwrap());
        assert_eq!((n, s.as_str()), (1, "a"));
        assert!(reader.read_row((&mut n, &mut s)).unwrap());
        assert!(!reader.read_row((&mut n, &mut s)).unwrap());
        assert_eq!((n, s.as_str()), (2, "b"));
        assert_eq!(reader.rows_read(), 2);
    }

    #[test]
    fn test_row_width_must_match() {
        let mut reader = ReaderBuilder::new(2).from_bytes("buf", b"1,2\n").unwrap();
        let mut only = 0i32;
        assert!(matches!(
            reader.read_row((&mut only,)),
            Err(CsvError::InvalidConfig(_))
        ));
        // the line was not consumed
        assert_eq!(reader.line_number(), 0);
    }

    #[test]
    fn test_header_request_must_match() {
        let mut reader = ReaderBuilder::new(2).from_bytes("buf", b"a,b\n").unwrap();
        assert!(matches!(
            reader.read_header(HeaderPolicy::STRICT, &["a"]),
            Err(CsvError::InvalidConfig(_))
        ));
        assert!(matches!(
            reader.read_header(HeaderPolicy::STRICT, &["a", "a"]),
            Err(CsvError::InvalidConfig(_))
        ));
        reader.read_header(HeaderPolicy::STRICT, &["a", "b"]).unwrap();
    }

    #[test]
    fn test_set_header() {
        let mut reader = ReaderBuilder::new(2).from_bytes("buf", b"7,x\n").unwrap();
        reader.set_header(&["num", "text"]).unwrap();
        assert!(reader.has_column("num"));
        assert_eq!(reader.column_names(), &["num", "text"]);
        let (mut n, mut t) = (0i64, String::new());
        assert!(reader.read_row((&mut n, &mut t)).unwrap());
        assert_eq!((n, t.as_str()), (7, "x"));
    }

    #[test]
    fn test_error_names_column() {
        let mut reader = ReaderBuilder::new(2).from_bytes("buf", b"id,n\n1,x\n").unwrap();
        reader.read_header(HeaderPolicy::STRICT, &["id", "n"]).unwrap();
        let (mut id, mut n) = (0i32, 0i32);
        match reader.read_row((&mut id, &mut n)).unwrap_err() {
            CsvError::InvalidNumericField {
                file,
                line,
                column,
                value,
            } => {
                assert_eq!(file, "buf");
                assert_eq!(line, 2);
                assert_eq!(column, "n");
                assert_eq!(value, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_next_line_passthrough() {
        let mut reader = ReaderBuilder::new(1)
            .comment(Comment::prefix(b"#"))
            .from_bytes("buf", b"#raw\nv\n")
            .unwrap();
        assert_eq!(reader.next_line().unwrap(), Some(&b"#raw"[..]));
        let mut v = String::new();
        assert!(reader.read_row((&mut v,)).unwrap());
        assert_eq!(v, "v");
    }
}
