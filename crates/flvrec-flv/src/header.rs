//! FLV file signature block.
//!
//! Every stream accepted by the processor starts with the same 13 bytes:
//! the 9-byte FLV header for an audio+video stream followed by the zero
//! "previous tag size" of the non-existent tag before the first one.

/// Length of the signature block in bytes.
pub const SIGNATURE_LEN: usize = 13;

/// The only signature block this crate accepts and writes.
pub const FLV_SIGNATURE: [u8; SIGNATURE_LEN] = [
    b'F', b'L', b'V', // magic
    0x01, // version 1
    0x05, // type flags: audio + video
    0x00, 0x00, 0x00, 0x09, // header length
    0x00, 0x00, 0x00, 0x00, // previous tag size 0
];

/// Exact comparison against [`FLV_SIGNATURE`].
pub fn validate_signature(bytes: &[u8]) -> bool {
    bytes == FLV_SIGNATURE
}

/// Index of the first byte that disagrees with the signature, if any.
///
/// Works on partial input, so a bad stream can be rejected before all
/// 13 bytes have arrived.
pub fn signature_mismatch(prefix: &[u8]) -> Option<usize> {
    prefix
        .iter()
        .zip(FLV_SIGNATURE.iter())
        .position(|(got, want)| got != want)
}
