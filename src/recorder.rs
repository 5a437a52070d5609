//! Recording a live FLV stream from a file or stdin.
//!
//! The input is read in fixed-size chunks and fed to a [`StreamProcessor`].
//! A listener thread follows the processor's events, logs progress and
//! writes the trailing clip once the stream is finalized.

use crate::config::Config;
use anyhow::{Context, Result};
use flvrec_flv::{
    ClipExporter, ClipSummary, FlvClipWriter, StreamEvent, StreamProcessor, StreamSummary,
};
use serde::Serialize;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tokio::sync::broadcast::{self, error::RecvError};

/// Tags between two progress log lines
const PROGRESS_INTERVAL: u64 = 500;

#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// Input file, or `None` for stdin
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    /// Where to write the trailing clip when the stream ends
    pub clip: Option<PathBuf>,
    /// Overrides `processor.clip_window_secs`
    pub clip_window_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordReport {
    pub output: PathBuf,
    pub summary: StreamSummary,
    pub clip: Option<ClipSummary>,
}

/// Record `options.input` into `options.output` until end of input.
pub fn record(options: &RecordOptions, config: &Config) -> Result<RecordReport> {
    let mut processor_config = config.processor.clone();
    if let Some(secs) = options.clip_window_secs {
        if secs == 0 {
            anyhow::bail!("Clip window cannot be 0 seconds");
        }
        processor_config.clip_window_secs = secs;
    }

    if config.recorder.overwrite && options.output.exists() {
        tracing::info!("Replacing existing output {:?}", options.output);
        std::fs::remove_file(&options.output)
            .with_context(|| format!("Failed to remove {:?}", options.output))?;
    }

    let processor = StreamProcessor::create(&options.output, processor_config)
        .with_context(|| format!("Failed to create output file: {:?}", options.output))?;
    let listener = spawn_listener(processor.subscribe(), options.clip.clone());

    let input: Box<dyn Read> = match &options.input {
        Some(path) => Box::new(
            File::open(path).with_context(|| format!("Failed to open input: {:?}", path))?,
        ),
        None => Box::new(std::io::stdin().lock()),
    };

    let result = pump(input, &processor, config.recorder.read_chunk_size).and_then(|()| {
        let file = processor.finalize().context("Failed to finalize recording")?;
        file.sync_all()
            .with_context(|| format!("Failed to sync {:?}", options.output))?;
        Ok(processor.summary())
    });

    // Dropping the processor closes the event channel so the listener exits
    // even when the stream failed before finalize.
    drop(processor);
    let clip = join_listener(listener)?;
    let summary = result?;

    Ok(RecordReport {
        output: options.output.clone(),
        summary,
        clip,
    })
}

fn pump<R: Read>(
    mut input: R,
    processor: &StreamProcessor<File>,
    chunk_size: usize,
) -> Result<()> {
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("Failed to read input"),
        };
        processor
            .feed(&buf[..n])
            .with_context(|| format!("Invalid stream after {} bytes", processor.bytes_consumed()))?;
    }
    tracing::debug!("End of input after {} bytes", processor.bytes_consumed());
    Ok(())
}

type Listener = JoinHandle<Result<Option<ClipSummary>>>;

fn spawn_listener(mut events: broadcast::Receiver<StreamEvent>, clip: Option<PathBuf>) -> Listener {
    std::thread::spawn(move || {
        let mut seen = 0u64;
        loop {
            match events.blocking_recv() {
                Ok(StreamEvent::TagProcessed(tag)) => {
                    seen += 1;
                    if seen % PROGRESS_INTERVAL == 0 {
                        tracing::info!("Recorded {} tags, at {}ms", seen, tag.timestamp);
                    }
                }
                Ok(StreamEvent::Finalized { summary, clip: snapshot }) => {
                    tracing::debug!("Listener saw finalize: {:?}", summary);
                    return match (clip.as_deref(), snapshot) {
                        (Some(path), Some(snapshot)) => write_clip(path, &snapshot).map(Some),
                        (Some(path), None) => {
                            tracing::warn!("No metadata in stream, skipping clip {:?}", path);
                            Ok(None)
                        }
                        (None, _) => Ok(None),
                    };
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Event listener lagged, skipped {} events", n);
                    seen += n;
                }
                Err(RecvError::Closed) => return Ok(None),
            }
        }
    })
}

fn join_listener(listener: Listener) -> Result<Option<ClipSummary>> {
    match listener.join() {
        Ok(result) => result,
        Err(_) => anyhow::bail!("Event listener thread panicked"),
    }
}

fn write_clip(path: &Path, snapshot: &flvrec_flv::ClipSnapshot) -> Result<ClipSummary> {
    let mut writer = FlvClipWriter::create(path)
        .with_context(|| format!("Failed to create clip file: {:?}", path))?;
    let summary = writer
        .export(snapshot)
        .with_context(|| format!("Failed to write clip: {:?}", path))?;
    Ok(summary)
}
