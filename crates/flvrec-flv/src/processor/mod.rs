//! Live FLV stream processor.
//!
//! [`StreamProcessor`] takes the bytes of a live FLV stream in arbitrary
//! chunks and remuxes them into a seekable sink:
//!
//! 1. The signature block is validated as it arrives.
//! 2. The first tag must be `onMetaData`. It is decoded, given fixed-width
//!    `duration` and `last_timestamp` slots, re-encoded and written right
//!    after the signature.
//! 3. Every later tag is written as soon as its payload is complete, with a
//!    freshly computed trailer, and kept in the tag history.
//! 4. [`StreamProcessor::finalize`] writes the real duration into the
//!    reserved slots in place and hands the sink back.
//!
//! All public operations share one lock, so a clip snapshot never observes a
//! half-processed tag.

mod events;
mod history;
mod parser;

pub use events::{StreamEvent, StreamSummary};

use crate::clip::ClipSnapshot;
use crate::header::FLV_SIGNATURE;
use crate::metadata::FlvMetadata;
use crate::tag::{FlvTag, TagHeader, MAX_PAYLOAD_SIZE};
use crate::{Error, Result};
use bytes::BytesMut;
use history::TagHistory;
use parking_lot::Mutex;
use parser::TagParser;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Processor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serialize",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct ProcessorConfig {
    /// Trailing window of the clip snapshot carried by the finalized event.
    pub clip_window_secs: u64,
    /// Retention window of the tag history. `None` keeps every tag.
    pub history_window_secs: Option<u64>,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            clip_window_secs: 30,
            history_window_secs: None,
            event_capacity: 1024,
        }
    }
}

impl ProcessorConfig {
    pub fn clip_window(&self) -> Duration {
        Duration::from_secs(self.clip_window_secs)
    }

    fn history_retention_ms(&self) -> Option<u32> {
        self.history_window_secs
            .map(|secs| u32::try_from(secs.saturating_mul(1000)).unwrap_or(u32::MAX))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    Failed,
    Closed,
}

/// Where the metadata record was written, for the finalize patch.
#[derive(Debug, Clone, Copy)]
struct MetadataRecord {
    offset: u64,
    header: TagHeader,
}

struct Inner<W> {
    status: Status,
    parser: TagParser,
    sink: Option<W>,
    metadata: Option<FlvMetadata>,
    record: Option<MetadataRecord>,
    history: TagHistory,
    summary: StreamSummary,
}

/// Incremental FLV remuxer writing to a seekable sink.
pub struct StreamProcessor<W> {
    inner: Mutex<Inner<W>>,
    events: broadcast::Sender<StreamEvent>,
    config: ProcessorConfig,
}

impl StreamProcessor<File> {
    /// Create a processor writing to a new file at `path`.
    ///
    /// Fails if the file already exists or cannot seek.
    pub fn create<P: AsRef<Path>>(path: P, config: ProcessorConfig) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::options().write(true).create_new(true).open(path)?;
        if let Err(e) = file.stream_position() {
            drop(file);
            let _ = std::fs::remove_file(path);
            return Err(e.into());
        }
        tracing::debug!("Recording to {:?}", path);
        Ok(Self::new(file, config))
    }
}

impl<W: Write + Seek> StreamProcessor<W> {
    pub fn new(sink: W, config: ProcessorConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Mutex::new(Inner {
                status: Status::Open,
                parser: TagParser::new(),
                sink: Some(sink),
                metadata: None,
                record: None,
                history: TagHistory::new(config.history_retention_ms()),
                summary: StreamSummary::default(),
            }),
            events,
            config,
        }
    }

    /// Subscribe to tag and finalize notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Consume a chunk of the stream.
    ///
    /// The whole chunk is processed before returning; bytes belonging to an
    /// incomplete tag are kept for the next call. Format and I/O errors are
    /// fatal: the processor refuses all further input.
    pub fn feed(&self, chunk: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.check_open()?;

        let result = inner.consume(chunk, &self.events);
        if let Err(e) = &result {
            if e.is_fatal() {
                tracing::error!("Stream processing failed: {}", e);
                inner.status = Status::Failed;
            }
        }
        result
    }

    /// Patch the metadata record with the final duration, flush, and return
    /// the sink. Dropping the returned sink closes it.
    ///
    /// Can only succeed once; later calls fail with [`Error::StreamClosed`].
    pub fn finalize(&self) -> Result<W> {
        let mut inner = self.inner.lock();
        inner.check_open()?;

        let pending = inner.parser.pending_bytes();
        if pending > 0 {
            tracing::warn!("Discarding {} bytes of an incomplete tag", pending);
        }

        let mut sink = match inner.patch_metadata() {
            Ok(sink) => sink,
            Err(e) => {
                tracing::error!("Finalize failed: {}", e);
                inner.status = Status::Failed;
                return Err(e);
            }
        };
        if let Err(e) = sink.flush() {
            inner.status = Status::Failed;
            return Err(e.into());
        }

        inner.parser.release();
        let tags = inner.history.take();
        inner.status = Status::Closed;

        let summary = inner.summary;
        let clip = inner.metadata.as_ref().map(|metadata| {
            Arc::new(ClipSnapshot {
                metadata: metadata.clone(),
                tags,
                window: self.config.clip_window(),
            })
        });
        tracing::info!(
            "Stream finalized: {} tags, {:.3}s, {} bytes",
            summary.tags_written,
            summary.duration_secs(),
            summary.bytes_written
        );
        let _ = self.events.send(StreamEvent::Finalized { summary, clip });

        Ok(sink)
    }

    /// Consistent copy of the metadata and tag history for clip export.
    pub fn snapshot_for_clip(&self, window: Duration) -> Result<ClipSnapshot> {
        let inner = self.inner.lock();
        inner.check_open()?;

        let metadata = inner.metadata.clone().ok_or(Error::MetadataNotReady)?;
        Ok(ClipSnapshot {
            metadata,
            tags: inner.history.snapshot(),
            window,
        })
    }

    /// Copy of the stream metadata, once captured.
    pub fn metadata(&self) -> Option<FlvMetadata> {
        self.inner.lock().metadata.clone()
    }

    pub fn summary(&self) -> StreamSummary {
        self.inner.lock().summary
    }

    /// Largest timestamp of any ordinary tag so far.
    pub fn max_timestamp(&self) -> u32 {
        self.inner.lock().summary.max_timestamp
    }

    /// Number of tags currently held in the history.
    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }

    /// Total input bytes consumed.
    pub fn bytes_consumed(&self) -> u64 {
        self.inner.lock().parser.offset()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().status == Status::Closed
    }
}

impl<W: Write + Seek> Inner<W> {
    fn check_open(&self) -> Result<()> {
        match self.status {
            Status::Open => Ok(()),
            Status::Failed => Err(Error::Failed),
            Status::Closed => Err(Error::StreamClosed),
        }
    }

    fn consume(&mut self, mut input: &[u8], events: &broadcast::Sender<StreamEvent>) -> Result<()> {
        while !input.is_empty() {
            if let Some(tag) = self.parser.step(&mut input)? {
                self.on_tag_complete(tag, events)?;
            }
        }
        Ok(())
    }

    fn on_tag_complete(&mut self, tag: FlvTag, events: &broadcast::Sender<StreamEvent>) -> Result<()> {
        if self.metadata.is_none() {
            return self.capture_metadata(tag);
        }

        let tag = Arc::new(tag);
        self.summary.max_timestamp = self.summary.max_timestamp.max(tag.timestamp);
        self.history.push(Arc::clone(&tag), self.summary.max_timestamp);

        let mut buf = BytesMut::with_capacity(tag.encoded_len());
        tag.write_to(&mut buf);
        self.sink_mut()?.write_all(&buf)?;
        self.summary.tags_written += 1;
        self.summary.bytes_written += buf.len() as u64;

        tracing::trace!(
            "Wrote {} tag ts={} size={}",
            tag.tag_type,
            tag.timestamp,
            tag.data.len()
        );
        let _ = events.send(StreamEvent::TagProcessed(tag));
        Ok(())
    }

    fn capture_metadata(&mut self, tag: FlvTag) -> Result<()> {
        if !tag.tag_type.is_script_data() {
            return Err(Error::MissingMetadata(tag.tag_type));
        }

        let mut metadata = FlvMetadata::parse(&tag.data)?;
        // Reserve fixed-width slots so the finalize patch keeps its length
        metadata.set_stream_times(0);
        let payload = metadata.to_bytes()?;
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge(payload.len()));
        }
        let rewritten = FlvTag {
            data: payload,
            ..tag
        };

        let mut buf = BytesMut::with_capacity(FLV_SIGNATURE.len() + rewritten.encoded_len());
        rewritten.write_to(&mut buf);

        let sink = self.sink_mut()?;
        sink.write_all(&FLV_SIGNATURE)?;
        let offset = sink.stream_position()?;
        sink.write_all(&buf)?;

        tracing::debug!(
            "Captured {} with {} entries ({} -> {} bytes) at offset {}",
            metadata.name(),
            metadata.len(),
            tag.data.len(),
            rewritten.data.len(),
            offset
        );

        self.summary.bytes_written += (FLV_SIGNATURE.len() + buf.len()) as u64;
        self.record = Some(MetadataRecord {
            offset,
            header: rewritten.header(),
        });
        self.metadata = Some(metadata);
        Ok(())
    }

    /// Rewrite the metadata record in place and take the sink.
    fn patch_metadata(&mut self) -> Result<W> {
        let max_timestamp = self.summary.max_timestamp;

        if let (Some(metadata), Some(record)) = (self.metadata.as_mut(), self.record) {
            metadata.set_stream_times(max_timestamp);
            let payload = metadata.to_bytes()?;
            let written = record.header.data_size as usize;
            if payload.len() != written {
                return Err(Error::MetadataSizeChanged {
                    written,
                    encoded: payload.len(),
                });
            }

            let sink = self.sink.as_mut().ok_or(Error::StreamClosed)?;
            sink.seek(SeekFrom::Start(record.offset))?;
            sink.write_all(&record.header.to_bytes())?;
            sink.write_all(&payload)?;
            sink.seek(SeekFrom::End(0))?;
            tracing::debug!(
                "Patched metadata: duration={:.3}s last_timestamp={}",
                max_timestamp as f64 / 1000.0,
                max_timestamp
            );
        } else {
            tracing::warn!("Finalizing a stream without metadata, nothing to patch");
        }

        self.sink.take().ok_or(Error::StreamClosed)
    }

    fn sink_mut(&mut self) -> Result<&mut W> {
        self.sink.as_mut().ok_or(Error::StreamClosed)
    }
}
