mod cli;

use flvrec::{config, recorder};
use flvrec_flv::{FlvMetadata, FlvReader, TagType};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use serde::Serialize;
use std::io::BufReader;
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "flvrec=trace,flvrec_flv=debug".to_string()
        } else {
            "flvrec=info,flvrec_flv=info".to_string()
        }
    });

    // Logs go to stderr so stdout stays clean for --json
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Record {
            input,
            output,
            clip,
            clip_window,
            json,
        } => {
            let options = recorder::RecordOptions {
                input: (input != "-").then(|| PathBuf::from(input)),
                output,
                clip,
                clip_window_secs: clip_window,
            };
            record(&options, cli.config.as_deref(), json)
        }
        Commands::Inspect { file, json } => inspect_file(&file, json),
        Commands::Version => {
            println!("flvrec {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn record(
    options: &recorder::RecordOptions,
    config_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    match &options.input {
        Some(path) => tracing::info!("Recording {:?} to {:?}", path, options.output),
        None => tracing::info!("Recording stdin to {:?}", options.output),
    }

    let report = recorder::record(options, &config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Output: {}", report.output.display());
    println!("Tags: {}", report.summary.tags_written);
    println!("Duration: {:.3}s", report.summary.duration_secs());
    println!("Size: {} bytes", report.summary.bytes_written);
    if let (Some(path), Some(clip)) = (&options.clip, &report.clip) {
        println!(
            "Clip: {} ({} tags, {:.3}s)",
            path.display(),
            clip.tags,
            clip.duration_ms as f64 / 1000.0
        );
    }

    Ok(())
}

#[derive(Debug, Default, Serialize)]
struct FileReport {
    metadata: Option<FlvMetadata>,
    audio_tags: u64,
    video_tags: u64,
    script_tags: u64,
    other_tags: u64,
    max_timestamp: u32,
}

fn inspect_file(path: &Path, json: bool) -> Result<()> {
    let file =
        std::fs::File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    let mut reader = FlvReader::new(BufReader::new(file))
        .with_context(|| format!("Not an FLV file: {:?}", path))?;

    let mut report = FileReport::default();
    while let Some(tag) = reader
        .next_tag()
        .with_context(|| format!("Corrupt tag at offset {}", reader.offset()))?
    {
        match tag.tag_type {
            TagType::Audio => report.audio_tags += 1,
            TagType::Video => report.video_tags += 1,
            TagType::ScriptData => {
                report.script_tags += 1;
                if report.metadata.is_none() {
                    report.metadata = Some(FlvMetadata::parse(&tag.data)?);
                }
                continue;
            }
            TagType::Unknown(_) => report.other_tags += 1,
        }
        report.max_timestamp = report.max_timestamp.max(tag.timestamp);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("File: {}", path.display());
    println!(
        "Tags: {} video, {} audio, {} script, {} other",
        report.video_tags, report.audio_tags, report.script_tags, report.other_tags
    );
    println!("Last timestamp: {}ms", report.max_timestamp);
    match &report.metadata {
        Some(metadata) => {
            println!("Metadata ({}):", metadata.name());
            for (key, value) in metadata.iter() {
                println!("  {}: {:?}", key, value);
            }
        }
        None => println!("Metadata: none"),
    }

    Ok(())
}
