/// Custom Result type for variantkey operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the variantkey library.
///
/// Lookups never fail: a missing key is reported through an out-of-range position
/// or an empty `Option`. The variants here cover loading index files and parsing
/// textual input.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors related to index file headers
    #[error("Error processing header: {0}")]
    HeaderError(#[from] HeaderError),

    /// Errors that occur while opening or mapping an index file
    #[error("Error reading file: {0}")]
    ReadError(#[from] ReadError),

    /// Errors raised while parsing chromosome names or hexadecimal keys
    #[error("Error decoding key: {0}")]
    CodecError(#[from] CodecError),

    /// Errors in a search field configuration
    #[error("Error configuring search: {0}")]
    SearchError(#[from] SearchError),

    /// Errors that occur while building index files
    #[error("Error writing file: {0}")]
    WriteError(#[from] WriteError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),
}
impl Error {
    /// Checks if the error is a truncation error
    ///
    /// A truncated index file is usually the result of an interrupted copy and
    /// has to be rebuilt or fetched again.
    ///
    /// # Returns
    ///
    /// * `true` if the error is a `ReadError::FileTruncation`
    /// * `false` for all other error types
    #[must_use]
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::ReadError(ReadError::FileTruncation(_)))
    }
}

/// Errors specific to processing and validating index file headers
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The magic bytes in the header do not match the expected value
    ///
    /// # Arguments
    /// * `String` - The magic bytes that were found, lossily decoded
    #[error("Invalid magic bytes: {0}")]
    InvalidMagic(String),

    /// The format version in the header is not supported
    ///
    /// # Arguments
    /// * `u8` - The unsupported version number that was found
    #[error("Invalid format version: {0}")]
    InvalidFormatVersion(u8),

    /// The table stored in the file is not the one that was requested
    #[error("Unexpected table kind: found {found}, expected {expected}")]
    UnexpectedKind { expected: u8, found: u8 },

    /// The layout byte is neither row nor column
    #[error("Invalid table layout: {0}")]
    InvalidLayout(u8),

    /// The number of columns does not match the table kind
    #[error("Invalid number of columns: found {found}, expected {expected}")]
    InvalidColumnCount { expected: u8, found: u8 },

    /// A column byte-width is not one of 1, 2, 4 or 8
    ///
    /// # Arguments
    /// * `usize` - The column index
    /// * `u8` - The invalid width
    #[error("Invalid byte width for column {0}: {1}")]
    InvalidColumnWidth(usize, u8),

    /// The genome reference index is not monotonically increasing
    ///
    /// # Arguments
    /// * `usize` - The chromosome code where the offset decreases
    #[error("Genome reference index decreases at chromosome {0}")]
    UnsortedGenomeIndex(usize),
}

/// Errors that can occur while opening and mapping index files
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The file being read is not a regular file (e.g., it might be a directory or special file)
    #[error("File is not regular")]
    IncompatibleFile,

    /// The file or buffer contains no bytes
    #[error("File is empty")]
    EmptyFile,

    /// The file appears to be truncated or corrupted
    ///
    /// # Arguments
    /// * `usize` - The number of bytes the header requires
    #[error(
        "Number of bytes in file does not match expectation - possibly truncated before byte pos {0}"
    )]
    FileTruncation(usize),
}

/// Errors produced while parsing textual representations of keys
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The chromosome name does not map to a known chromosome code
    #[error("Invalid chromosome name: {0:?}")]
    InvalidChromosome(String),

    /// A hexadecimal key does not have exactly 16 characters
    #[error("Invalid hexadecimal key length: {0} (expected 16)")]
    InvalidHexLength(usize),

    /// A hexadecimal key contains a byte outside `[0-9a-fA-F]`
    ///
    /// # Arguments
    /// * `char` - The offending character
    /// * `usize` - Its position in the input
    #[error("Invalid hexadecimal character {0:?} at position {1}")]
    InvalidHexDigit(char, usize),
}

/// Errors in the configuration of a binary search field
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    /// The bit range is empty or exceeds the field width
    #[error("Invalid bit range [{start}, {end}] for a {bits}-bit field")]
    InvalidBitRange { start: u8, end: u8, bits: u8 },
}

/// Errors that can occur while building index files
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// An allele does not fit the one-byte length prefix of an NRVK entry
    ///
    /// # Arguments
    /// * `usize` - The allele length in bytes
    #[error("Allele of {0} bytes exceeds the maximum of 255")]
    AlleleTooLong(usize),

    /// Chromosome sequences must be pushed once each, in ascending code order
    ///
    /// # Arguments
    /// * `u8` - The chromosome code that broke the order
    #[error("Chromosome {0} pushed out of order or outside 1..=25")]
    UnsortedChromosome(u8),
}
