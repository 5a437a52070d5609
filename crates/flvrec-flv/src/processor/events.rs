//! Notifications published by the stream processor.
//!
//! Subscribers receive events over a `tokio::sync::broadcast` channel. A
//! subscriber that falls behind by more than the channel capacity loses the
//! oldest events and sees `RecvError::Lagged`.

use crate::clip::ClipSnapshot;
use crate::tag::FlvTag;
use std::sync::Arc;

/// Totals for a stream, reported when it is finalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct StreamSummary {
    /// Ordinary tags written after the metadata record.
    pub tags_written: u64,
    /// Largest tag timestamp seen, in milliseconds.
    pub max_timestamp: u32,
    /// Bytes written to the output sink.
    pub bytes_written: u64,
}

impl StreamSummary {
    pub fn duration_secs(&self) -> f64 {
        self.max_timestamp as f64 / 1000.0
    }
}

#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// An ordinary tag was appended to the output.
    TagProcessed(Arc<FlvTag>),
    /// The output was patched and flushed.
    ///
    /// `clip` holds the history as of the close, over the configured clip
    /// window. It is `None` when the stream never produced metadata.
    Finalized {
        summary: StreamSummary,
        clip: Option<Arc<ClipSnapshot>>,
    },
}
