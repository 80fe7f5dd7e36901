//! RIFF/WebP chunk walker. Chunk payloads are listed, not decoded.
//! See https://developers.google.com/speed/webp/docs/riff_container

use serde::Serialize;

use crate::metadata::hex_preview;

/// "RIFF" + u32 size + "WEBP".
pub const RIFF_HEADER_LEN: usize = 12;
/// FourCC (4) + little-endian size (4).
pub const CHUNK_HEADER_LEN: usize = 8;

pub const CHUNK_EXIF: &str = "EXIF";

/// One RIFF chunk, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebPChunk {
    #[serde(rename = "type")]
    pub chunk_type: String,
    /// Absolute offset of the chunk's FourCC.
    pub offset: usize,
    /// Payload length as declared (before padding).
    pub length: u32,
    /// Hex of the first 16 payload bytes.
    pub preview: String,
}

impl WebPChunk {
    /// Absolute offset of the first payload byte.
    pub fn payload_offset(&self) -> usize {
        self.offset + CHUNK_HEADER_LEN
    }
}

/// Check "RIFF" at 0..4 and "WEBP" at 8..12.
#[inline]
pub fn is_webp(data: &[u8]) -> bool {
    data.len() >= RIFF_HEADER_LEN && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

/// Walk chunks after the 12-byte RIFF header. Odd-length payloads are followed by one pad
/// byte. Stops, returning what was parsed so far, when a header or payload would overrun the
/// buffer.
pub fn parse_webp_chunks(data: &[u8]) -> Vec<WebPChunk> {
    let mut chunks = Vec::new();
    let mut offset = RIFF_HEADER_LEN;

    while offset + CHUNK_HEADER_LEN <= data.len() {
        let chunk_type = String::from_utf8_lossy(&data[offset..offset + 4]).into_owned();
        let length = u32::from_le_bytes([
            data[offset + 4],
            data[offset + 5],
            data[offset + 6],
            data[offset + 7],
        ]);
        let payload_start = offset + CHUNK_HEADER_LEN;
        let payload_end = match payload_start.checked_add(length as usize) {
            Some(end) if end <= data.len() => end,
            _ => {
                tracing::debug!(
                    offset,
                    length,
                    chunk_type = %chunk_type,
                    file_len = data.len(),
                    "webp chunk runs past end of buffer; stopping"
                );
                break;
            }
        };

        chunks.push(WebPChunk {
            chunk_type,
            offset,
            length,
            preview: hex_preview(&data[payload_start..payload_end]),
        });
        offset = payload_end + (length as usize & 1);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webp_magic() {
        assert!(is_webp(b"RIFF\x04\0\0\0WEBP"));
        assert!(!is_webp(b"RIFF\x04\0\0\0WAVE"));
        assert!(!is_webp(b"RIFF"));
    }

    #[test]
    fn odd_chunk_is_padded() {
        let mut v = b"RIFF\0\0\0\0WEBP".to_vec();
        v.extend_from_slice(b"ABCD");
        v.extend_from_slice(&3u32.to_le_bytes());
        v.extend_from_slice(&[1, 2, 3, 0]);
        v.extend_from_slice(b"EFGH");
        v.extend_from_slice(&2u32.to_le_bytes());
        v.extend_from_slice(&[4, 5]);
        let chunks = parse_webp_chunks(&v);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].preview, "01 02 03");
        assert_eq!(chunks[1].chunk_type, "EFGH");
        assert_eq!(chunks[1].offset, 24);
    }
}
