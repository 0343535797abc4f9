//! Error types for the rudnik-core library.
//!
//! Wire-level errors are field-local: the walker resynchronises past them.
//! Tile errors are fatal for the one buffer being decoded and nothing else.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rudnik operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all rudnik operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A varint ran past ten bytes or past the end of the buffer
    #[error("malformed varint at offset {offset}")]
    MalformedVarint {
        /// Byte offset of the field that contained the varint
        offset: usize,
    },

    /// A fixed-width or length-delimited read needed more bytes than remain
    #[error("truncated buffer at offset {offset}: need {needed} bytes, {available} available")]
    TruncatedBuffer {
        /// Byte offset of the field that was being read
        offset: usize,
        /// Bytes the read required
        needed: u64,
        /// Bytes actually left in the buffer
        available: usize,
    },

    /// The field key carried a wire type this decoder does not handle
    #[error("unknown wire type {wire_type} at offset {offset}")]
    UnknownWireType {
        /// Byte offset of the field key
        offset: usize,
        /// The raw three-bit wire type
        wire_type: u8,
    },

    /// The buffer does not follow the vector tile schema
    #[error("vector tile decode failed: {details}")]
    TileDecode {
        /// What structural invariant was violated
        details: String,
    },

    /// Failed to read a capture or its sidecar from disk
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Self::tile_decode(err.to_string())
    }
}

impl Error {
    /// Creates a new malformed varint error
    pub fn malformed_varint(offset: usize) -> Self {
        Self::MalformedVarint { offset }
    }

    /// Creates a new truncated buffer error
    pub fn truncated(offset: usize, needed: u64, available: usize) -> Self {
        Self::TruncatedBuffer {
            offset,
            needed,
            available,
        }
    }

    /// Creates a new unknown wire type error
    pub fn unknown_wire_type(offset: usize, wire_type: u8) -> Self {
        Self::UnknownWireType { offset, wire_type }
    }

    /// Creates a new tile decode error
    pub fn tile_decode(details: impl Into<String>) -> Self {
        Self::TileDecode {
            details: details.into(),
        }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Re-anchors a wire-level error at the start of the enclosing field.
    ///
    /// Primitive reads report the offset they were handed; the field decoder
    /// rewrites that to the key offset so the walker can resume after it.
    pub(crate) fn at_field(self, field_offset: usize) -> Self {
        match self {
            Self::MalformedVarint { .. } => Self::MalformedVarint {
                offset: field_offset,
            },
            Self::TruncatedBuffer {
                needed, available, ..
            } => Self::TruncatedBuffer {
                offset: field_offset,
                needed,
                available,
            },
            Self::UnknownWireType { wire_type, .. } => Self::UnknownWireType {
                offset: field_offset,
                wire_type,
            },
            other => other,
        }
    }

    /// Byte offset a wire-level error refers to
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::MalformedVarint { offset }
            | Self::TruncatedBuffer { offset, .. }
            | Self::UnknownWireType { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Where a best-effort walk should pick up after this error
    pub fn resume_offset(&self) -> Option<usize> {
        self.offset().map(|offset| offset + 1)
    }

    /// Returns true if this is a recoverable error that should be skipped
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedVarint { .. } | Self::TruncatedBuffer { .. } | Self::UnknownWireType { .. }
        )
    }
}
