//! Incremental tag parser.
//!
//! Bytes arrive in chunks with no alignment to tags. The parser keeps
//! whatever part of the signature, header, payload or trailer it has seen so
//! far and hands back one complete tag at a time.
//!
//! A tag is complete once its payload is in. The inbound trailer that follows
//! is consumed and checked but never copied: writers recompute it.

use crate::header::{signature_mismatch, SIGNATURE_LEN};
use crate::tag::{FlvTag, TagHeader, TAG_HEADER_LEN, TAG_TRAILER_LEN};
use crate::{Error, Result};
use bytes::{Buf, BytesMut};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitSignature,
    AwaitHeader,
    AwaitPayload(TagHeader),
    AwaitTrailer { data_size: u32 },
}

#[derive(Debug)]
pub(crate) struct TagParser {
    phase: Phase,
    /// Signature, header or trailer bytes seen so far.
    header_buf: BytesMut,
    payload_buf: BytesMut,
    /// Stream offset of the next byte to be consumed.
    offset: u64,
}

impl TagParser {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::AwaitSignature,
            header_buf: BytesMut::with_capacity(SIGNATURE_LEN),
            payload_buf: BytesMut::new(),
            offset: 0,
        }
    }

    /// Consume bytes from the front of `input` until a tag completes or the
    /// input runs out.
    ///
    /// Never takes bytes past the end of the tag it returns, so the caller
    /// loops until `input` is empty.
    pub(crate) fn step(&mut self, input: &mut &[u8]) -> Result<Option<FlvTag>> {
        match self.phase {
            Phase::AwaitSignature => {
                self.fill_header(input, SIGNATURE_LEN);
                if let Some(offset) = signature_mismatch(&self.header_buf) {
                    return Err(Error::UnsupportedFormat { offset });
                }
                if self.header_buf.len() == SIGNATURE_LEN {
                    tracing::debug!("FLV signature accepted");
                    self.header_buf.clear();
                    self.phase = Phase::AwaitHeader;
                }
                Ok(None)
            }
            Phase::AwaitHeader => {
                self.fill_header(input, TAG_HEADER_LEN);
                if self.header_buf.len() < TAG_HEADER_LEN {
                    return Ok(None);
                }

                let header = TagHeader::parse(&self.header_buf)?;
                self.header_buf.clear();
                tracing::trace!(
                    "Tag header at {}: {} size={} ts={}",
                    self.offset - TAG_HEADER_LEN as u64,
                    header.tag_type,
                    header.data_size,
                    header.timestamp
                );

                if header.data_size == 0 {
                    self.phase = Phase::AwaitTrailer { data_size: 0 };
                    return Ok(Some(FlvTag::from_parts(header, Default::default())));
                }
                self.payload_buf.reserve(header.data_size as usize);
                self.phase = Phase::AwaitPayload(header);
                Ok(None)
            }
            Phase::AwaitPayload(header) => {
                let wanted = header.data_size as usize - self.payload_buf.len();
                let take = wanted.min(input.len());
                self.payload_buf.extend_from_slice(&input[..take]);
                self.advance(input, take);

                if self.payload_buf.len() < header.data_size as usize {
                    return Ok(None);
                }

                let data = self.payload_buf.split().freeze();
                self.phase = Phase::AwaitTrailer {
                    data_size: header.data_size,
                };
                Ok(Some(FlvTag::from_parts(header, data)))
            }
            Phase::AwaitTrailer { data_size } => {
                self.fill_header(input, TAG_TRAILER_LEN);
                if self.header_buf.len() < TAG_TRAILER_LEN {
                    return Ok(None);
                }

                let found = self.header_buf.get_u32();
                let expected = TAG_HEADER_LEN as u32 + data_size;
                if found != expected {
                    tracing::warn!(
                        "Previous tag size at {} is {}, expected {}",
                        self.offset - TAG_TRAILER_LEN as u64,
                        found,
                        expected
                    );
                }
                self.header_buf.clear();
                self.phase = Phase::AwaitHeader;
                Ok(None)
            }
        }
    }

    /// Number of bytes held for a tag that has not completed.
    pub(crate) fn pending_bytes(&self) -> usize {
        match self.phase {
            Phase::AwaitHeader => self.header_buf.len(),
            Phase::AwaitPayload(_) => TAG_HEADER_LEN + self.payload_buf.len(),
            Phase::AwaitSignature | Phase::AwaitTrailer { .. } => 0,
        }
    }

    /// Total bytes consumed from the input stream.
    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    /// Drop any partial tag and release buffer memory.
    pub(crate) fn release(&mut self) {
        if let Phase::AwaitPayload(_) = self.phase {
            self.phase = Phase::AwaitHeader;
        }
        self.header_buf = BytesMut::new();
        self.payload_buf = BytesMut::new();
    }

    fn fill_header(&mut self, input: &mut &[u8], target: usize) {
        let take = (target - self.header_buf.len()).min(input.len());
        self.header_buf.extend_from_slice(&input[..take]);
        self.advance(input, take);
    }

    fn advance(&mut self, input: &mut &[u8], n: usize) {
        input.advance(n);
        self.offset += n as u64;
    }
}
