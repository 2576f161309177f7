use std::io;
use thiserror::Error;

use crate::encoding::EncodingError;

/// Error type for reading operations.
///
/// Every variant raised while reading carries the display name of the source.
/// Line numbers are 1-based physical line numbers.
#[derive(Error, Debug)]
pub enum CsvError {
    /// The source file could not be opened.
    #[error("cannot open \"{file}\": {source}")]
    CannotOpenSource {
        file: String,
        #[source]
        source: io::Error,
    },

    /// IO error while refilling the line buffer.
    #[error("IO error in \"{file}\" near line {line}: {source}")]
    Io {
        file: String,
        line: u64,
        #[source]
        source: io::Error,
    },

    /// A physical line is longer than the reader's maximum line length.
    #[error("line {line} in \"{file}\" is longer than the maximum of {max} bytes")]
    LineTooLong { file: String, line: u64, max: usize },

    /// The input ended before a header line was found.
    #[error("\"{file}\" has no header line")]
    HeaderMissing { file: String },

    /// A requested column name appears more than once in the header.
    #[error("column \"{column}\" appears more than once in the header of \"{file}\" (line {line})")]
    DuplicateColumnInHeader {
        file: String,
        line: u64,
        column: String,
    },

    /// A requested column name does not appear in the header.
    #[error("column \"{column}\" is missing from the header of \"{file}\" (line {line})")]
    ColumnMissingInHeader {
        file: String,
        line: u64,
        column: String,
    },

    /// The header contains a column that was not requested.
    #[error("unexpected column \"{column}\" in the header of \"{file}\" (line {line})")]
    ExtraColumnInHeader {
        file: String,
        line: u64,
        column: String,
    },

    /// A row has fewer fields than the header.
    #[error("line {line} in \"{file}\" has {found} column(s), expected {expected}")]
    TooFewColumns {
        file: String,
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A row has more fields than the header.
    #[error("line {line} in \"{file}\" has more than the expected {expected} column(s)")]
    TooManyColumns {
        file: String,
        line: u64,
        expected: usize,
    },

    /// A quoted field is not closed before the end of the line.
    #[error("quoted field {field} on line {line} in \"{file}\" is not terminated")]
    UnterminatedQuotedField { file: String, line: u64, field: usize },

    /// A numeric value is larger than the destination type allows.
    #[error("value \"{value}\" of column \"{column}\" on line {line} in \"{file}\" overflows")]
    IntegerOverflow {
        file: String,
        line: u64,
        column: String,
        value: String,
    },

    /// A numeric value is smaller than the destination type allows.
    #[error("value \"{value}\" of column \"{column}\" on line {line} in \"{file}\" underflows")]
    IntegerUnderflow {
        file: String,
        line: u64,
        column: String,
        value: String,
    },

    /// A field bound for a numeric, boolean or character destination cannot be parsed.
    #[error("value \"{value}\" of column \"{column}\" on line {line} in \"{file}\" is not valid")]
    InvalidNumericField {
        file: String,
        line: u64,
        column: String,
        value: String,
    },

    /// A field bound for a string destination is not valid UTF-8.
    #[error("column \"{column}\" on line {line} in \"{file}\" is not valid UTF-8")]
    InvalidUtf8Field {
        file: String,
        line: u64,
        column: String,
    },

    /// A tied sink could not transcode its field.
    #[error("column \"{column}\" on line {line} in \"{file}\": {source}")]
    EncodingConversionFailed {
        file: String,
        line: u64,
        column: String,
        #[source]
        source: EncodingError,
    },

    /// Invalid reader configuration or call arguments.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CsvError {
    /// The display name of the source the error came from, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            CsvError::CannotOpenSource { file, .. }
            | CsvError::Io { file, .. }
            | CsvError::LineTooLong { file, .. }
            | CsvError::HeaderMissing { file }
            | CsvError::DuplicateColumnInHeader { file, .. }
            | CsvError::ColumnMissingInHeader { file, .. }
            | CsvError::ExtraColumnInHeader { file, .. }
            | CsvError::TooFewColumns { file, .. }
            | CsvError::TooManyColumns { file, .. }
            | CsvError::UnterminatedQuotedField { file, .. }
            | CsvError::IntegerOverflow { file, .. }
            | CsvError::IntegerUnderflow { file, .. }
            | CsvError::InvalidNumericField { file, .. }
            | CsvError::InvalidUtf8Field { file, .. }
            | CsvError::EncodingConversionFailed { file, .. } => Some(file),
            CsvError::InvalidConfig(_) => None,
        }
    }

    /// The physical line the error refers to, if any.
    pub fn line(&self) -> Option<u64> {
        match self {
            CsvError::Io { line, .. }
            | CsvError::LineTooLong { line, .. }
            | CsvError::DuplicateColumnInHeader { line, .. }
            | CsvError::ColumnMissingInHeader { line, .. }
            | CsvError::ExtraColumnInHeader { line, .. }
            | CsvError::TooFewColumns { line, .. }
            | CsvError::TooManyColumns { line, .. }
            | CsvError::UnterminatedQuotedField { line, .. }
            | CsvError::IntegerOverflow { line, .. }
            | CsvError::IntegerUnderflow { line, .. }
            | CsvError::InvalidNumericField { line, .. }
            | CsvError::InvalidUtf8Field { line, .. }
            | CsvError::EncodingConversionFailed { line, .. } => Some(*line),
            CsvError::CannotOpenSource { .. }
            | CsvError::HeaderMissing { .. }
            | CsvError::InvalidConfig(_) => None,
        }
    }
}

/// Result type alias for reading operations.
pub type Result<T> = std::result::Result<T, CsvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_accessors() {
        let err = CsvError::TooFewColumns {
            file: "data.csv".to_string(),
            line: 7,
            expected: 3,
            found: 2,
        };
        assert_eq!(err.file(), Some("data.csv"));
        assert_eq!(err.line(), Some(7));
        assert_eq!(
            err.to_string(),
            "line 7 in \"data.csv\" has 2 column(s), expected 3"
        );

        let err = CsvError::InvalidConfig("zero columns".to_string());
        assert_eq!(err.file(), None);
        assert_eq!(err.line(), None);
    }
}
