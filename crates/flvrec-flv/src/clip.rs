//! Clip export from a snapshot of recorded tags.
//!
//! The processor hands out [`ClipSnapshot`]s; anything implementing
//! [`ClipExporter`] turns one into a derivative output. [`FlvClipWriter`]
//! writes the trailing window as a standalone FLV file.

use crate::header::FLV_SIGNATURE;
use crate::metadata::FlvMetadata;
use crate::tag::{FlvTag, TagType};
use crate::Result;
use bytes::BytesMut;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Point-in-time view of a stream for clip export.
#[derive(Debug, Clone)]
pub struct ClipSnapshot {
    /// Copy of the stream metadata.
    pub metadata: FlvMetadata,
    /// Tags recorded so far, oldest first.
    pub tags: Vec<Arc<FlvTag>>,
    /// Trailing window the clip should cover.
    pub window: Duration,
}

impl ClipSnapshot {
    /// Largest timestamp in the snapshot.
    pub fn max_timestamp(&self) -> Option<u32> {
        self.tags.iter().map(|t| t.timestamp).max()
    }

    /// Tags from the first one inside the trailing window to the end.
    pub fn window_tags(&self) -> &[Arc<FlvTag>] {
        let Some(max) = self.max_timestamp() else {
            return &[];
        };
        let window_ms = u32::try_from(self.window.as_millis()).unwrap_or(u32::MAX);
        let cutoff = max.saturating_sub(window_ms);
        let start = self
            .tags
            .iter()
            .position(|t| t.timestamp >= cutoff)
            .unwrap_or(self.tags.len());
        &self.tags[start..]
    }
}

/// Result of a clip export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ClipSummary {
    pub tags: usize,
    pub duration_ms: u32,
    pub bytes: u64,
}

/// Consumer of clip snapshots.
pub trait ClipExporter {
    fn export(&mut self, snapshot: &ClipSnapshot) -> Result<ClipSummary>;
}

/// Writes a clip as an FLV file with timestamps rebased to zero.
pub struct FlvClipWriter<W> {
    writer: W,
}

impl FlvClipWriter<BufWriter<File>> {
    /// Create a new clip file. Fails if it already exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::options().write(true).create_new(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> FlvClipWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ClipExporter for FlvClipWriter<W> {
    fn export(&mut self, snapshot: &ClipSnapshot) -> Result<ClipSummary> {
        let tags = snapshot.window_tags();
        let base = tags.iter().map(|t| t.timestamp).min().unwrap_or(0);
        let last = tags.iter().map(|t| t.timestamp).max().unwrap_or(0);
        let duration_ms = last - base;

        let mut metadata = snapshot.metadata.clone();
        metadata.set_stream_times(duration_ms);
        let script = FlvTag::new(TagType::ScriptData, 0, metadata.to_bytes()?)?;

        let mut buf = BytesMut::with_capacity(4096);
        buf.extend_from_slice(&FLV_SIGNATURE);
        script.write_to(&mut buf);
        let mut bytes = buf.len() as u64;
        self.writer.write_all(&buf)?;

        for tag in tags {
            buf.clear();
            let rebased = FlvTag {
                timestamp: tag.timestamp - base,
                ..FlvTag::clone(tag)
            };
            rebased.write_to(&mut buf);
            self.writer.write_all(&buf)?;
            bytes += buf.len() as u64;
        }
        self.writer.flush()?;

        tracing::info!(
            "Exported clip: {} tags, {}ms, {} bytes",
            tags.len(),
            duration_ms,
            bytes
        );

        Ok(ClipSummary {
            tags: tags.len(),
            duration_ms,
            bytes,
        })
    }
}
