//! Sequential reader for recorded FLV files.

use crate::header::{signature_mismatch, SIGNATURE_LEN};
use crate::tag::{trailer, FlvTag, TagHeader, TAG_HEADER_LEN, TAG_TRAILER_LEN};
use crate::{Error, Result};
use bytes::BytesMut;
use std::io::{ErrorKind, Read};

/// Reads tags one at a time from a complete FLV byte source.
///
/// Unlike the stream processor this expects a well-formed file and checks
/// every trailer.
pub struct FlvReader<R> {
    reader: R,
    offset: u64,
}

impl<R: Read> FlvReader<R> {
    /// Read and validate the signature block.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut signature = [0u8; SIGNATURE_LEN];
        reader.read_exact(&mut signature)?;
        if let Some(offset) = signature_mismatch(&signature) {
            return Err(Error::UnsupportedFormat { offset });
        }
        Ok(Self {
            reader,
            offset: SIGNATURE_LEN as u64,
        })
    }

    /// Byte offset of the next tag.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the next tag, or `None` at a clean end of file.
    pub fn next_tag(&mut self) -> Result<Option<FlvTag>> {
        let mut header = [0u8; TAG_HEADER_LEN];
        match self.reader.read_exact(&mut header[..1]) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        self.reader.read_exact(&mut header[1..])?;
        let header = TagHeader::parse(&header)?;

        let mut data = BytesMut::zeroed(header.data_size as usize);
        self.reader.read_exact(&mut data)?;

        let mut found = [0u8; TAG_TRAILER_LEN];
        self.reader.read_exact(&mut found)?;
        let expected = trailer(header.data_size);
        if found != expected {
            return Err(Error::InvalidTrailer {
                offset: self.offset,
                expected: u32::from_be_bytes(expected),
                found: u32::from_be_bytes(found),
            });
        }

        let tag = FlvTag::from_parts(header, data.freeze());
        self.offset += tag.encoded_len() as u64;
        Ok(Some(tag))
    }
}

impl<R: Read> Iterator for FlvReader<R> {
    type Item = Result<FlvTag>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tag().transpose()
    }
}
