//! flvrec-flv: incremental FLV remuxing for live stream recording
//!
//! This crate turns a live FLV byte stream, delivered in chunks of any size,
//! into a seekable FLV file whose metadata is corrected when the stream ends.
//!
//! # Modules
//!
//! - `header` - The 13-byte signature block
//! - `tag` - Tag header layout, trailers and serialization
//! - `metadata` - The `onMetaData` key/value map over `scuffle-amf0` values
//! - `processor` - The chunk-driven state machine and remux writer
//! - `clip` - Snapshots of recorded tags and clip export
//! - `reader` - Sequential reading of recorded files
//!
//! # Output layout
//!
//! ```text
//! offset 0   signature block (13 bytes)
//! offset 13  onMetaData tag: header + AMF0 payload + trailer
//! ...        every later tag: header + payload + trailer
//! ```
//!
//! The metadata record is rewritten in place on finalize, so its encoded
//! length is fixed when it is first written.

pub mod clip;
pub mod error;
pub mod header;
pub mod metadata;
pub mod processor;
pub mod reader;
pub mod tag;

pub use clip::{ClipExporter, ClipSnapshot, ClipSummary, FlvClipWriter};
pub use error::{Error, Result};
pub use metadata::FlvMetadata;
pub use scuffle_amf0::Amf0Value;
pub use processor::{ProcessorConfig, StreamEvent, StreamProcessor, StreamSummary};
pub use reader::FlvReader;
pub use tag::{FlvTag, TagHeader, TagType};
