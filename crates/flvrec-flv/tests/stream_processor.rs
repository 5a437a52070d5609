//! Stream processor integration tests
//!
//! Feeds synthetic live streams through the processor with different
//! chunkings and checks the exact bytes that land in the sink.

use flvrec_flv::header::FLV_SIGNATURE;
use flvrec_flv::metadata::{KEY_DURATION, KEY_LAST_TIMESTAMP};
use flvrec_flv::tag::{TAG_HEADER_LEN, TAG_TRAILER_LEN};
use flvrec_flv::{
    Error, FlvMetadata, FlvReader, FlvTag, ProcessorConfig, Result, StreamProcessor, TagHeader,
    TagType,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use std::time::Duration;

// ===== Fixtures =====

fn metadata_tag() -> FlvTag {
    let mut meta = FlvMetadata::new();
    meta.set_number("width", 1920.0);
    meta.set_number("height", 1080.0);
    meta.set_number("framerate", 30.0);
    meta.set_string("encoder", "obs-output module");
    meta.set_number("duration", 0.0);
    FlvTag::new(TagType::ScriptData, 0, meta.to_bytes().unwrap()).unwrap()
}

fn media_tags() -> Vec<FlvTag> {
    let mut tags = Vec::new();
    for i in 0..20u32 {
        let video = vec![(i % 251) as u8; 37 + (i as usize * 13) % 200];
        tags.push(FlvTag::new(TagType::Video, i * 33, video).unwrap());
        let audio = vec![(i % 7) as u8; 9 + (i as usize * 5) % 40];
        tags.push(FlvTag::new(TagType::Audio, i * 33 + 5, audio).unwrap());
    }
    // Reserved type byte and an empty payload pass through untouched
    tags.push(FlvTag::new(TagType::Unknown(0x0F), 700, vec![0xEE; 3]).unwrap());
    tags.push(FlvTag::new(TagType::Video, 701, Vec::new()).unwrap());
    tags
}

fn live_stream(tags: &[FlvTag]) -> Vec<u8> {
    let mut bytes = FLV_SIGNATURE.to_vec();
    bytes.extend_from_slice(&metadata_tag().to_bytes());
    for tag in tags {
        bytes.extend_from_slice(&tag.to_bytes());
    }
    bytes
}

fn record(chunks: &[&[u8]]) -> Result<Vec<u8>> {
    let proc = StreamProcessor::new(Cursor::new(Vec::new()), ProcessorConfig::default());
    for chunk in chunks {
        proc.feed(chunk)?;
    }
    Ok(proc.finalize()?.into_inner())
}

fn read_all(bytes: &[u8]) -> Vec<FlvTag> {
    FlvReader::new(bytes)
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
}

// ===== Chunk boundary invariance =====

#[test]
fn test_split_at_every_offset() {
    let stream = live_stream(&media_tags()[..4]);
    let expected = record(&[&stream[..]]).unwrap();

    for split in 0..=stream.len() {
        let (a, b) = stream.split_at(split);
        let out = record(&[a, b]).unwrap();
        assert_eq!(out, expected, "split at {}", split);
    }
}

#[test]
fn test_one_byte_chunks() {
    let stream = live_stream(&media_tags());
    let expected = record(&[&stream[..]]).unwrap();

    let chunks: Vec<&[u8]> = stream.chunks(1).collect();
    assert_eq!(record(&chunks).unwrap(), expected);
}

#[test]
fn test_random_chunking() {
    let stream = live_stream(&media_tags());
    let expected = record(&[&stream[..]]).unwrap();
    let mut rng = StdRng::seed_from_u64(0x464c56);

    for _ in 0..50 {
        let mut chunks = Vec::new();
        let mut rest = &stream[..];
        while !rest.is_empty() {
            let len = rng.gen_range(0..=rest.len().min(64));
            let (chunk, tail) = rest.split_at(len);
            chunks.push(chunk);
            rest = tail;
        }
        assert_eq!(record(&chunks).unwrap(), expected);
    }
}

// ===== Output framing =====

#[test]
fn test_trailers_match_payload_size() {
    let tags = media_tags();
    let out = record(&[&live_stream(&tags)[..]]).unwrap();

    let mut pos = FLV_SIGNATURE.len();
    let mut seen = 0;
    while pos < out.len() {
        let header = TagHeader::parse(&out[pos..]).unwrap();
        let trailer_at = pos + TAG_HEADER_LEN + header.data_size as usize;
        let trailer = &out[trailer_at..trailer_at + TAG_TRAILER_LEN];
        assert_eq!(trailer, &(11 + header.data_size).to_be_bytes());
        pos = trailer_at + TAG_TRAILER_LEN;
        seen += 1;
    }
    assert_eq!(pos, out.len());
    assert_eq!(seen, tags.len() + 1);
}

#[test]
fn test_media_tags_unchanged() {
    let tags = media_tags();
    let out = record(&[&live_stream(&tags)[..]]).unwrap();
    let read = read_all(&out);
    assert_eq!(read[0].tag_type, TagType::ScriptData);
    assert_eq!(&read[1..], &tags[..]);
}

#[test]
fn test_any_signature_byte_change_rejected() {
    let stream = live_stream(&media_tags()[..2]);
    for i in 0..FLV_SIGNATURE.len() {
        let mut bad = stream.clone();
        bad[i] = bad[i].wrapping_add(1);

        let proc = StreamProcessor::new(Cursor::new(Vec::new()), ProcessorConfig::default());
        let err = proc.feed(&bad).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat { offset } if offset == i));
        assert!(proc.metadata().is_none());
        assert_eq!(proc.summary().bytes_written, 0);
    }
}

// ===== Finalize =====

#[test]
fn test_finalize_duration_is_max_timestamp() {
    // Out of order timestamps: the maximum wins, not the last
    let tags = vec![
        FlvTag::new(TagType::Video, 1000, vec![1u8; 10]).unwrap(),
        FlvTag::new(TagType::Video, 2500, vec![1u8; 10]).unwrap(),
        FlvTag::new(TagType::Audio, 2400, vec![1u8; 10]).unwrap(),
    ];
    let out = record(&[&live_stream(&tags)[..]]).unwrap();
    let meta = FlvMetadata::parse(&read_all(&out)[0].data).unwrap();
    assert_eq!(meta.get_number(KEY_DURATION), Some(2.5));
    assert_eq!(meta.get_number(KEY_LAST_TIMESTAMP), Some(2500.0));
}

#[test]
fn test_finalize_with_no_media_tags() {
    let out = record(&[&live_stream(&[])[..]]).unwrap();
    let meta = FlvMetadata::parse(&read_all(&out)[0].data).unwrap();
    assert_eq!(meta.duration(), Some(0.0));
    assert_eq!(meta.last_timestamp(), Some(0.0));
    assert_eq!(meta.get_number("width"), Some(1920.0));
}

#[test]
fn test_partial_tag_discarded_at_finalize() {
    let tags = media_tags();
    let complete = &tags[..6];
    let partial = FlvTag::new(TagType::Video, 5000, vec![9u8; 64]).unwrap();

    let mut stream = live_stream(complete);
    let partial_bytes = partial.to_bytes();
    // Header and half of the payload
    stream.extend_from_slice(&partial_bytes[..TAG_HEADER_LEN + 32]);

    let proc = StreamProcessor::new(Cursor::new(Vec::new()), ProcessorConfig::default());
    for chunk in stream.chunks(10) {
        proc.feed(chunk).unwrap();
    }
    assert_eq!(proc.history_len(), complete.len());

    let summary = proc.summary();
    let out = proc.finalize().unwrap().into_inner();
    assert_eq!(summary.tags_written, complete.len() as u64);
    assert_eq!(out.len() as u64, summary.bytes_written);

    let read = read_all(&out);
    assert_eq!(&read[1..], complete);

    let max_ts = complete.iter().map(|t| t.timestamp).max().unwrap();
    assert_eq!(summary.max_timestamp, max_ts);
    let meta = FlvMetadata::parse(&read[0].data).unwrap();
    assert_eq!(meta.last_timestamp(), Some(max_ts as f64));
    assert_eq!(meta.duration(), Some(max_ts as f64 / 1000.0));
}

#[test]
fn test_extended_timestamp() {
    let tags = vec![FlvTag::new(TagType::Video, 0x0100_0010, vec![1u8; 2]).unwrap()];
    let out = record(&[&live_stream(&tags)[..]]).unwrap();
    let read = read_all(&out);
    assert_eq!(read[1].timestamp, 0x0100_0010);
    let meta = FlvMetadata::parse(&read[0].data).unwrap();
    assert_eq!(meta.last_timestamp(), Some(0x0100_0010 as f64));
}

#[test]
fn test_feed_after_finalize_leaves_sink_alone() {
    let proc = StreamProcessor::new(Cursor::new(Vec::new()), ProcessorConfig::default());
    proc.feed(&live_stream(&media_tags()[..2])).unwrap();
    let before = proc.summary();
    let out = proc.finalize().unwrap().into_inner();

    for chunk in [&[][..], &[0u8; 1][..], &media_tags()[0].to_bytes()[..]] {
        assert!(matches!(proc.feed(chunk), Err(Error::StreamClosed)));
    }
    assert_eq!(proc.summary(), before);
    assert_eq!(out.len() as u64, before.bytes_written);
}

#[test]
fn test_end_to_end_example() {
    // Name-only script payload of exactly 5 bytes
    let script = vec![0x02, 0x00, 0x02, b'o', b'n'];
    let video = FlvTag::new(TagType::Video, 40, vec![0x17; 100]).unwrap();
    let audio = FlvTag::new(TagType::Audio, 45, vec![0xAF; 50]).unwrap();

    let mut stream = FLV_SIGNATURE.to_vec();
    stream.extend_from_slice(&FlvTag::new(TagType::ScriptData, 0, script).unwrap().to_bytes());
    stream.extend_from_slice(&video.to_bytes());
    stream.extend_from_slice(&audio.to_bytes());

    let out = record(&[&stream[..]]).unwrap();
    assert_eq!(&out[..13], &FLV_SIGNATURE);

    let meta_header = TagHeader::parse(&out[13..]).unwrap();
    assert_eq!(meta_header.tag_type, TagType::ScriptData);
    let meta_end = 13 + TAG_HEADER_LEN + meta_header.data_size as usize + TAG_TRAILER_LEN;

    let mut expected_tail = video.to_bytes().to_vec();
    expected_tail.extend_from_slice(&audio.to_bytes());
    assert_eq!(&out[meta_end..], &expected_tail[..]);

    let meta = FlvMetadata::parse(&read_all(&out)[0].data).unwrap();
    assert_eq!(meta.name(), "on");
    assert_eq!(meta.duration(), Some(0.045));
    assert_eq!(meta.last_timestamp(), Some(45.0));
}

// ===== Files and concurrency =====

#[test]
fn test_record_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live.flv");
    let tags = media_tags();

    let proc = StreamProcessor::create(&path, ProcessorConfig::default()).unwrap();
    for chunk in live_stream(&tags).chunks(1000) {
        proc.feed(chunk).unwrap();
    }
    drop(proc.finalize().unwrap());

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(read_all(&bytes).len(), tags.len() + 1);

    // Never overwrites an existing recording
    assert!(matches!(
        StreamProcessor::create(&path, ProcessorConfig::default()),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_snapshots_during_concurrent_feed() {
    let tags = media_tags();
    let stream = live_stream(&tags);
    let proc = StreamProcessor::new(Cursor::new(Vec::new()), ProcessorConfig::default());

    std::thread::scope(|s| {
        s.spawn(|| {
            for chunk in stream.chunks(7) {
                proc.feed(chunk).unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..200 {
                match proc.snapshot_for_clip(Duration::from_secs(30)) {
                    Ok(snap) => {
                        // Always a complete prefix of the stream
                        let n = snap.tags.len();
                        assert!(n <= tags.len());
                        for (got, want) in snap.tags.iter().zip(&tags) {
                            assert_eq!(**got, *want);
                        }
                    }
                    Err(Error::MetadataNotReady) => {}
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
        });
    });

    assert_eq!(proc.history_len(), tags.len());
}
