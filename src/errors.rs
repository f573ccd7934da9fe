//! Submodule defining the errors used across the crate.

/// Errors surfaced by the changeset reader and writer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying file could not be opened, read or written.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The byte stream violates the changeset format.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors describing a malformed changeset byte stream.
///
/// Every variant carries the byte offset at which decoding failed. Once a
/// reader has reported a `ParseError` it stays failed; re-reading requires
/// a fresh reader.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The stream ended in the middle of a record.
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),

    /// A row record appeared before the first table record.
    #[error("row record before first table record at offset {0}")]
    RowBeforeTable(usize),

    /// The byte at a record boundary is neither a table marker nor a known
    /// operation code.
    #[error("invalid operation code 0x{0:02x} at offset {1}")]
    InvalidOpCode(u8, usize),

    /// A value tag outside the six known tags.
    #[error("unknown value tag 0x{0:02x} at offset {1}")]
    UnknownValueTag(u8, usize),

    /// A varint ran past five bytes or past the 32-bit range.
    #[error("oversized varint at offset {0}")]
    OversizedVarint(usize),

    /// A table name that is not valid UTF-8.
    #[error("invalid UTF-8 in table name at offset {0}")]
    InvalidTableName(usize),

    /// A table name with no NUL terminator before the end of the stream.
    #[error("table name not NUL-terminated at offset {0}")]
    UnterminatedTableName(usize),
}
