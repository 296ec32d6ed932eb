use std::error::Error as StdError;

/// Custom Result type for affybin operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the affybin library, encompassing all possible error cases
/// that can occur while decoding microarray data files.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The input is not a format (or format version) this crate can decode
    #[error("Unrecognized format: {0}")]
    FormatError(#[from] FormatError),

    /// Errors that occur while reading primitive values from the stream
    #[error("Error reading file: {0}")]
    ReadError(#[from] ReadError),

    /// Errors in the bracketed sections of the legacy text formats
    #[error("Malformed section: {0}")]
    SectionError(#[from] SectionError),

    /// Errors in decoded body records
    #[error("Error decoding records: {0}")]
    RecordError(#[from] RecordError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// Errors raised while sniffing or decompressing a compressed input
    #[error("Error decompressing input: {0}")]
    CompressionError(#[from] niffler::Error),

    /// A worker thread panicked while decoding a batch of files
    #[error("Worker thread {0} panicked")]
    WorkerPanic(usize),

    /// Conversion errors from anyhow errors
    #[cfg(feature = "anyhow")]
    #[error("Generic error: {0}")]
    AnyhowError(#[from] anyhow::Error),

    /// Generic errors for other unexpected situations
    #[error("Generic error: {0}")]
    GenericError(#[from] Box<dyn StdError + Send + Sync>),
}

/// Coarse classification of every [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnrecognizedFormat,
    TruncatedInput,
    OutOfRangeCoordinate,
    GeometryMismatch,
    MalformedSection,
    InvalidRecord,
    Io,
    Other,
}

impl Error {
    /// Classifies the error into one of the decoding failure kinds
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FormatError(_) => ErrorKind::UnrecognizedFormat,
            Self::ReadError(ReadError::TruncatedInput { .. }) => ErrorKind::TruncatedInput,
            Self::ReadError(_) => ErrorKind::InvalidRecord,
            Self::SectionError(_) => ErrorKind::MalformedSection,
            Self::RecordError(RecordError::OutOfRangeCoordinate { .. }) => {
                ErrorKind::OutOfRangeCoordinate
            }
            Self::RecordError(RecordError::GeometryMismatch { .. }) => ErrorKind::GeometryMismatch,
            Self::RecordError(_) => ErrorKind::InvalidRecord,
            Self::IoError(_) | Self::CompressionError(_) => ErrorKind::Io,
            _ => ErrorKind::Other,
        }
    }

    /// Checks if the stream ended before a required field
    ///
    /// An `UnexpectedEof` surfacing as a plain I/O error counts as well.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        match self {
            Self::ReadError(ReadError::TruncatedInput { .. }) => true,
            Self::IoError(err) => err.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }

    /// Returns the byte offset at which the error was detected, if known
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::FormatError(err) => err.offset(),
            Self::ReadError(err) => err.offset(),
            Self::RecordError(err) => err.offset(),
            _ => None,
        }
    }
}

/// Errors identifying an unknown format family, version or results type
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// The leading four bytes match no known format family
    ///
    /// # Arguments
    /// * `u32` - The signature read as a little-endian integer
    #[error("Unrecognized file signature: {0}")]
    UnrecognizedSignature(u32),

    /// A decoder was handed a stream whose magic belongs to another format
    #[error("Invalid {format} magic number {found} at byte 0 (expected {expected})")]
    InvalidMagicNumber {
        format: &'static str,
        expected: i64,
        found: i64,
    },

    /// The format family is known but this version of it is not
    #[error("Unrecognized {format} version {version} at byte {offset}")]
    UnrecognizedVersion {
        format: &'static str,
        version: i32,
        offset: u64,
    },

    /// The CHP header names a results type outside the known set
    #[error("Unrecognized CHP results type {results_type} at byte {offset}")]
    UnrecognizedResultsType { results_type: i32, offset: u64 },

    /// A generic container column declares an unknown type tag
    #[error("Unrecognized column type tag {tag} for column '{column}' at byte {offset}")]
    UnrecognizedColumnType {
        column: String,
        tag: u8,
        offset: u64,
    },
}
impl FormatError {
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::UnrecognizedSignature(_) | Self::InvalidMagicNumber { .. } => Some(0),
            Self::UnrecognizedVersion { offset, .. }
            | Self::UnrecognizedResultsType { offset, .. }
            | Self::UnrecognizedColumnType { offset, .. } => Some(*offset),
        }
    }
}

/// Errors that can occur while reading primitive values
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The stream ended before a required field
    ///
    /// # Fields
    /// * `offset` - The byte position at which the read started
    /// * `needed` - The number of bytes the read required
    #[error("Input truncated at byte {offset}: needed {needed} more bytes")]
    TruncatedInput { offset: u64, needed: usize },

    /// A length prefix was negative
    #[error("Invalid length prefix {length} at byte {offset}")]
    InvalidLength { offset: u64, length: i64 },

    /// A wide string contained an unpaired UTF-16 surrogate
    #[error("Invalid UTF-16 string at byte {offset}")]
    InvalidWideString { offset: u64 },

    /// The file being read is not a regular file (e.g., it might be a directory or special file)
    #[error("File is not regular")]
    IncompatibleFile,
}
impl ReadError {
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::TruncatedInput { offset, .. }
            | Self::InvalidLength { offset, .. }
            | Self::InvalidWideString { offset } => Some(*offset),
            Self::IncompatibleFile => None,
        }
    }
}

/// Errors in the bracketed `[Section]` / `Tag=Value` layout of the legacy text formats
///
/// Line numbers are 1-based.
#[derive(thiserror::Error, Debug)]
pub enum SectionError {
    /// The file does not open with the expected section
    #[error("Expected section [{expected}] at line {line}")]
    MissingHeader { expected: &'static str, line: usize },

    /// A required section was not found
    #[error("Missing section [{section}]")]
    MissingSection { section: String },

    /// A required tag was not found in a section
    #[error("Missing tag '{tag}' in section [{section}] (line {line})")]
    MissingTag {
        section: String,
        tag: String,
        line: usize,
    },

    /// A tag or data row could not be parsed
    #[error("Invalid value '{value}' for '{tag}' in section [{section}] (line {line})")]
    InvalidValue {
        section: String,
        tag: String,
        value: String,
        line: usize,
    },

    /// A unit is named `NONE` and none of its blocks carries a name
    #[error("Unit {unit} has no name in its unit or block sections")]
    UnresolvedUnitName { unit: u32 },

    /// A section lists fewer or more entries than it declares
    ///
    /// Raised for text files cut short on a section boundary or inside a
    /// row list. `line` is the line of the declaring tag.
    #[error("Section [{section}] declares {declared} via '{tag}' (line {line}) but holds {found}")]
    CountMismatch {
        section: String,
        tag: &'static str,
        declared: usize,
        found: usize,
        line: usize,
    },

    /// A `[` header line has no closing `]`
    #[error("Unterminated section header at line {line}")]
    UnterminatedHeader { line: usize },
}

/// Errors in decoded body records
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// A masked or outlier coordinate lies outside the declared geometry
    #[error("{list} record {record} at {location} references cell ({x}, {y}) outside {cols}x{rows}")]
    OutOfRangeCoordinate {
        list: &'static str,
        record: usize,
        x: u32,
        y: u32,
        cols: u32,
        rows: u32,
        location: Location,
    },

    /// The declared cell count does not equal `rows * cols`
    ///
    /// Only raised under [`GeometryPolicy::Fail`](crate::GeometryPolicy::Fail);
    /// the default policy logs a warning instead.
    #[error("Declared cell count {declared} does not match {cols}x{rows} at {location}")]
    GeometryMismatch {
        declared: u32,
        cols: u32,
        rows: u32,
        location: Location,
    },

    /// A resequencing record size that leaves a negative or misaligned score array
    #[error(
        "Record {record} at byte {offset}: size {record_size} with sequence length {sequence_length} leaves an invalid score array"
    )]
    InvalidRecordSize {
        record: usize,
        offset: u64,
        record_size: i32,
        sequence_length: i32,
    },

    /// A generic container column is narrower than its type requires
    #[error("Column '{column}' at byte {offset} has width {width} but its type needs {expected} bytes")]
    InvalidColumnWidth {
        column: String,
        width: u32,
        expected: u32,
        offset: u64,
    },

    /// A string value runs past the width of its generic container column
    #[error("Column '{column}' value at byte {offset} spans {length} bytes, more than its width {width}")]
    ColumnOverflow {
        column: String,
        length: u64,
        width: u32,
        offset: u64,
    },

    /// A CDF unit number was negative
    #[error("Invalid unit number {unit} at byte {offset}")]
    InvalidUnitNumber { unit: i32, offset: u64 },

    /// A count field was negative, or nested parent headers went too deep
    #[error("Invalid {field} count {count} at byte {offset}")]
    InvalidCount {
        field: &'static str,
        count: i64,
        offset: u64,
    },
}
impl RecordError {
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::OutOfRangeCoordinate { location, .. }
            | Self::GeometryMismatch { location, .. } => location.offset(),
            Self::InvalidRecordSize { offset, .. }
            | Self::InvalidCount { offset, .. }
            | Self::InvalidColumnWidth { offset, .. }
            | Self::ColumnOverflow { offset, .. }
            | Self::InvalidUnitNumber { offset, .. } => Some(*offset),
        }
    }
}

/// Where a record-level error was detected
///
/// Binary formats report byte offsets; the text formats report 1-based lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Byte(u64),
    Line(usize),
}
impl Location {
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Byte(offset) => Some(*offset),
            Self::Line(_) => None,
        }
    }
}
impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Byte(offset) => write!(f, "byte {offset}"),
            Self::Line(line) => write!(f, "line {line}"),
        }
    }
}

/// Trait for converting arbitrary errors into `Error`
pub trait IntoDecodeError {
    fn into_decode_error(self) -> Error;
}

// Implement conversion for Box<dyn Error>
impl<E> IntoDecodeError for E
where
    E: StdError + Send + Sync + 'static,
{
    fn into_decode_error(self) -> Error {
        Error::GenericError(Box::new(self))
    }
}
