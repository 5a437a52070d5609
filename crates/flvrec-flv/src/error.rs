//! Error types for flvrec-flv.

use crate::tag::TagType;
use std::io;
use thiserror::Error;

/// Result type for flvrec-flv operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for flvrec-flv operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the output sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream does not start with the supported FLV signature.
    #[error("Not an FLV stream or unsupported header (mismatch at byte {offset})")]
    UnsupportedFormat { offset: usize },

    /// The first tag of the stream is not a script data tag.
    #[error("onMetaData not found: first tag is {0}")]
    MissingMetadata(TagType),

    /// Script data could not be decoded or encoded.
    #[error("Invalid script data: {0}")]
    InvalidScriptData(String),

    /// The processor has already been finalized.
    #[error("Stream file already closed")]
    StreamClosed,

    /// The processor hit a fatal error earlier and cannot be used.
    #[error("Stream processor failed earlier and is no longer usable")]
    Failed,

    /// Stream metadata has not been captured yet.
    #[error("Stream metadata not captured yet")]
    MetadataNotReady,

    /// Re-encoded metadata no longer fits the region written at capture.
    #[error("Metadata size changed: wrote {written} bytes, re-encoded {encoded} bytes")]
    MetadataSizeChanged { written: usize, encoded: usize },

    /// A tag trailer does not match the tag it follows.
    #[error("Invalid previous tag size at {offset}: expected {expected}, found {found}")]
    InvalidTrailer {
        offset: u64,
        expected: u32,
        found: u32,
    },

    /// A tag payload exceeds the 24-bit size field.
    #[error("Tag payload too large: {0} bytes")]
    PayloadTooLarge(usize),

    /// Buffer too small for operation.
    #[error("Buffer underflow: need {need} bytes, have {have}")]
    BufferUnderflow { need: usize, have: usize },
}

impl Error {
    /// Create an invalid script data error.
    pub fn invalid_script_data(msg: impl Into<String>) -> Self {
        Self::InvalidScriptData(msg.into())
    }

    /// Whether this error leaves the processor permanently unusable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::StreamClosed | Self::Failed | Self::MetadataNotReady
        )
    }
}
