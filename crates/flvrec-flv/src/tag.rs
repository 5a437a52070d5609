//! FLV tag definitions and serialization.
//!
//! ```text
//! +------+----------+-----------+-------+----------+---------+-----------+
//! | Type | DataSize | Timestamp | TSExt | StreamID | Payload | PrevSize  |
//! | 1B   | 3B BE    | 3B BE     | 1B    | 3B       | N B     | 4B BE     |
//! +------+----------+-----------+-------+----------+---------+-----------+
//! ```
//!
//! The trailing `PrevSize` belongs to the tag it follows and always equals
//! `11 + N`.

use crate::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// Size of a tag header in bytes.
pub const TAG_HEADER_LEN: usize = 11;

/// Size of the trailer that follows every tag payload.
pub const TAG_TRAILER_LEN: usize = 4;

/// Largest payload the 24-bit size field can describe.
pub const MAX_PAYLOAD_SIZE: usize = 0x00FF_FFFF;

/// Tag type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    Audio,
    Video,
    ScriptData,
    /// Reserved or unknown type byte, passed through untouched.
    Unknown(u8),
}

impl TagType {
    pub const AUDIO: u8 = 8;
    pub const VIDEO: u8 = 9;
    pub const SCRIPT_DATA: u8 = 18;

    pub fn from_byte(byte: u8) -> Self {
        match byte {
            Self::AUDIO => Self::Audio,
            Self::VIDEO => Self::Video,
            Self::SCRIPT_DATA => Self::ScriptData,
            other => Self::Unknown(other),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Audio => Self::AUDIO,
            Self::Video => Self::VIDEO,
            Self::ScriptData => Self::SCRIPT_DATA,
            Self::Unknown(b) => *b,
        }
    }

    pub fn is_script_data(&self) -> bool {
        matches!(self, Self::ScriptData)
    }
}

impl std::fmt::Display for TagType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
            Self::ScriptData => write!(f, "script data"),
            Self::Unknown(b) => write!(f, "unknown ({})", b),
        }
    }
}

/// Parsed 11-byte tag header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagHeader {
    pub tag_type: TagType,
    /// Payload size in bytes (24 bits).
    pub data_size: u32,
    /// Full 32-bit timestamp in milliseconds.
    pub timestamp: u32,
    /// Stream ID, always zero in practice but kept verbatim.
    pub stream_id: [u8; 3],
}

impl TagHeader {
    /// Parse a header from the first 11 bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TAG_HEADER_LEN {
            return Err(Error::BufferUnderflow {
                need: TAG_HEADER_LEN,
                have: bytes.len(),
            });
        }

        let data_size = u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]);
        // Lower 24 bits first, extension byte holds bits 24-31
        let timestamp = u32::from_be_bytes([bytes[7], bytes[4], bytes[5], bytes[6]]);

        Ok(Self {
            tag_type: TagType::from_byte(bytes[0]),
            data_size,
            timestamp,
            stream_id: [bytes[8], bytes[9], bytes[10]],
        })
    }

    /// Serialize to the 11-byte wire form.
    pub fn to_bytes(&self) -> [u8; TAG_HEADER_LEN] {
        let size = self.data_size.to_be_bytes();
        let ts = self.timestamp.to_be_bytes();
        [
            self.tag_type.as_byte(),
            size[1],
            size[2],
            size[3],
            ts[1],
            ts[2],
            ts[3],
            ts[0],
            self.stream_id[0],
            self.stream_id[1],
            self.stream_id[2],
        ]
    }
}

/// The trailer written after a payload of `data_size` bytes.
pub fn trailer(data_size: u32) -> [u8; TAG_TRAILER_LEN] {
    (TAG_HEADER_LEN as u32 + data_size).to_be_bytes()
}

/// A complete tag: header fields plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvTag {
    pub tag_type: TagType,
    pub timestamp: u32,
    pub stream_id: [u8; 3],
    pub data: Bytes,
}

impl FlvTag {
    /// Create a tag with a zero stream ID.
    pub fn new(tag_type: TagType, timestamp: u32, data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge(data.len()));
        }
        Ok(Self {
            tag_type,
            timestamp,
            stream_id: [0; 3],
            data,
        })
    }

    /// Assemble a tag from a parsed header and its payload.
    pub(crate) fn from_parts(header: TagHeader, data: Bytes) -> Self {
        debug_assert_eq!(header.data_size as usize, data.len());
        Self {
            tag_type: header.tag_type,
            timestamp: header.timestamp,
            stream_id: header.stream_id,
            data,
        }
    }

    /// Header describing this tag's actual payload.
    pub fn header(&self) -> TagHeader {
        TagHeader {
            tag_type: self.tag_type,
            data_size: self.data.len() as u32,
            timestamp: self.timestamp,
            stream_id: self.stream_id,
        }
    }

    /// Total bytes this tag occupies on disk, trailer included.
    pub fn encoded_len(&self) -> usize {
        TAG_HEADER_LEN + self.data.len() + TAG_TRAILER_LEN
    }

    /// Append header, payload and trailer to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        let header = self.header();
        buf.reserve(self.encoded_len());
        buf.put_slice(&header.to_bytes());
        buf.put_slice(&self.data);
        buf.put_slice(&trailer(header.data_size));
    }

    /// Serialize header, payload and trailer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.write_to(&mut buf);
        buf.freeze()
    }
}
