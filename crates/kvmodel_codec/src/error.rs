//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while packing or unpacking procedure arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A value could not be packed.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// What went wrong.
        message: String,
    },

    /// Input ended before a complete value was read.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Bytes were left over after the top-level value.
    #[error("{remaining} trailing bytes after value")]
    TrailingBytes {
        /// Number of unread bytes.
        remaining: usize,
    },

    /// Indefinite-length items are not produced by the encoder and are rejected.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// A text item was not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Well-formed CBOR with the wrong shape for the envelope being read.
    #[error("invalid structure: {message}")]
    InvalidStructure {
        /// Description of the mismatch.
        message: String,
    },

    /// A CBOR item kind the envelopes never use (floats, tags, booleans).
    #[error("unsupported CBOR item: {kind}")]
    UnsupportedType {
        /// Item kind.
        kind: String,
    },

    /// A declared length exceeds what the decoder accepts.
    #[error("declared length {claimed} exceeds limit {max_allowed}")]
    SizeLimitExceeded {
        /// Length announced by the header.
        claimed: u64,
        /// Maximum accepted.
        max_allowed: u64,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(kind: impl Into<String>) -> Self {
        Self::UnsupportedType { kind: kind.into() }
    }
}
