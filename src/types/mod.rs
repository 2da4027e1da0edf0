#![forbid(unsafe_code)]
//! Shared identifiers, error types and checksums.

use std::fmt;

/// CRC32 helpers over buffer payloads.
pub mod checksum;

/// Position of a record, measured from the first byte of its buffer.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct Offset(pub u32);

/// Identity of a non-empty vector, map or set inside one buffer.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ContainerId(pub u32);

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Offset {
    fn from(value: u32) -> Self {
        Offset(value)
    }
}

impl Offset {
    /// Returns the offset as a slice index.
    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

/// First structural fault found while certifying a buffer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Header is missing, truncated or describes another format.
    #[error("bad header: {0}")]
    BadHeader(&'static str),
    /// Stored checksum does not match the payload.
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    Checksum {
        /// Value recorded in the header.
        stored: u32,
        /// Value computed over the payload.
        computed: u32,
    },
    /// A record or field starts or ends outside the buffer.
    #[error("offset {offset} (+{len} bytes) is outside the buffer of {buffer_len} bytes")]
    OutOfRange {
        /// Start of the access.
        offset: u64,
        /// Bytes requested.
        len: u64,
        /// Buffer extent.
        buffer_len: u64,
    },
    /// Length arithmetic would wrap.
    #[error("length overflow in record at offset {offset}")]
    LengthOverflow {
        /// Record start.
        offset: u32,
    },
    /// Cell carries a tag no reader understands.
    #[error("unknown type tag {tag} at offset {offset}")]
    UnknownTag {
        /// Position of the cell.
        offset: u32,
        /// Raw tag value.
        tag: u32,
    },
    /// Inline payload is out of range for its kind.
    #[error("invalid inline payload {data} for tag {tag} at offset {offset}")]
    InvalidInline {
        /// Position of the cell.
        offset: u32,
        /// Raw tag value.
        tag: u32,
        /// Raw payload.
        data: u32,
    },
    /// String bytes are not UTF-8.
    #[error("string at offset {offset} is not valid utf-8")]
    InvalidUtf8 {
        /// Record start.
        offset: u32,
    },
    /// Hash table layout is inconsistent.
    #[error("malformed hash table at offset {offset}: {reason}")]
    MalformedHashTable {
        /// Record start.
        offset: u32,
        /// Which property failed.
        reason: &'static str,
    },
    /// Map key or set element is of an unhashable kind.
    #[error("unhashable key at offset {offset}")]
    UnhashableKey {
        /// Record start of the owning table.
        offset: u32,
    },
    /// A hashable vector holds an unhashable element.
    #[error("vector at offset {offset} is marked hashable but holds unhashable items")]
    FalselyHashable {
        /// Record start.
        offset: u32,
    },
    /// Container reaches itself.
    #[error("cycle through container at offset {offset}")]
    Cycle {
        /// Record start.
        offset: u32,
    },
    /// Container id out of range or used twice.
    #[error("invalid container id {id} at offset {offset}")]
    ContainerId {
        /// Record start.
        offset: u32,
        /// Stored id.
        id: u32,
    },
    /// Nesting deeper than the configured limit.
    #[error("nesting deeper than {limit} at offset {offset}")]
    TooDeep {
        /// Record start.
        offset: u32,
        /// Configured maximum depth.
        limit: usize,
    },
}

/// Errors returned by every fallible operation in the crate.
#[derive(thiserror::Error, Debug)]
pub enum FlatError {
    /// Buffer failed structural validation and must not be read.
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),
    /// Index or slice outside the current extent.
    #[error("index {index} out of bounds for length {len}")]
    Bounds {
        /// Requested index.
        index: u64,
        /// Current length.
        len: u64,
    },
    /// Operation applied to the wrong value kind.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Kind the operation needs.
        expected: &'static str,
        /// Kind that was supplied.
        found: &'static str,
    },
    /// Operation would exceed a representable length.
    #[error("capacity exceeded: {0}")]
    Capacity(&'static str),
    /// Mutation attempted while a zero-copy export is outstanding.
    #[error("existing exports of data: object cannot be re-sized")]
    ResizeWhileBorrowed,
    /// Allocation failed; the structure is unchanged.
    #[error("allocation failed")]
    Allocation,
    /// Mutation attempted on a buffer-backed value.
    #[error("value is backed by a serialized buffer and is read-only")]
    ReadOnly,
    /// Read attempted before validation succeeded.
    #[error("buffer has not been validated")]
    NotValidated,
    /// Read attempted after the buffer was closed.
    #[error("buffer is closed")]
    Closed,
    /// A value reference produced by a different reader.
    #[error("value reference belongs to another buffer")]
    ForeignReference,
    /// Map key or set element is not hashable.
    #[error("value of kind {0} is not hashable")]
    Unhashable(&'static str),
    /// Serialized primitive vector blob is malformed.
    #[error("invalid primitive vector blob: {0}")]
    InvalidBlob(&'static str),
    /// Argument outside the accepted domain.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
    /// Underlying I/O failure.
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FlatError>;

impl FlatError {
    pub(crate) fn bounds(index: impl TryInto<u64>, len: impl TryInto<u64>) -> Self {
        FlatError::Bounds {
            index: index.try_into().unwrap_or(u64::MAX),
            len: len.try_into().unwrap_or(u64::MAX),
        }
    }

    pub(crate) fn mismatch(expected: &'static str, found: &'static str) -> Self {
        FlatError::TypeMismatch { expected, found }
    }
}
