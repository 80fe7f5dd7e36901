//! Minimal PNG chunk walker: lengths, types, CRCs, IHDR geometry and tEXt records.
//! Does not inflate image data and does not verify CRCs.
//! See https://www.w3.org/TR/png/#5Chunk-layout

use serde::Serialize;

/// PNG file signature (8 bytes).
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Length (4) + type (4).
const CHUNK_HEADER_LEN: usize = 8;
const CRC_LEN: usize = 4;
/// width(4) height(4) bit_depth(1) color_type(1) compression(1) filter(1) interlace(1).
const IHDR_LEN: usize = 13;

pub const CHUNK_IHDR: &str = "IHDR";
pub const CHUNK_TEXT: &str = "tEXt";

/// Decoded contents of chunks the walker understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PngChunkDetail {
    Header {
        width: u32,
        height: u32,
        #[serde(rename = "bitDepth")]
        bit_depth: u8,
        #[serde(rename = "colorType")]
        color_type: u8,
    },
    /// tEXt split on its first NUL.
    Text { keyword: String, text: String },
    /// tEXt without a NUL separator.
    RawText {
        #[serde(rename = "rawText")]
        raw_text: String,
    },
}

/// One PNG chunk, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PngChunk {
    #[serde(rename = "type")]
    pub chunk_type: String,
    /// Offset of the chunk's length field.
    pub offset: usize,
    /// Chunk data length (excludes header and CRC).
    pub length: u32,
    /// Recorded, never verified.
    pub crc: u32,
    #[serde(flatten)]
    pub detail: Option<PngChunkDetail>,
}

impl PngChunk {
    /// Offset one past this chunk's CRC.
    pub fn end(&self) -> usize {
        self.offset + CHUNK_HEADER_LEN + self.length as usize + CRC_LEN
    }

    /// tEXt keyword, when the chunk carried one.
    pub fn keyword(&self) -> Option<&str> {
        match &self.detail {
            Some(PngChunkDetail::Text { keyword, .. }) => Some(keyword),
            _ => None,
        }
    }

    /// tEXt value following the keyword.
    pub fn text(&self) -> Option<&str> {
        match &self.detail {
            Some(PngChunkDetail::Text { text, .. }) => Some(text),
            _ => None,
        }
    }
}

/// Check the 8-byte PNG signature.
#[inline]
pub fn is_png(data: &[u8]) -> bool {
    data.len() >= PNG_SIGNATURE.len() && data[..PNG_SIGNATURE.len()] == PNG_SIGNATURE
}

#[inline]
fn read_u32_be(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn parse_ihdr(chunk_data: &[u8]) -> Option<PngChunkDetail> {
    if chunk_data.len() < IHDR_LEN {
        return None;
    }
    Some(PngChunkDetail::Header {
        width: read_u32_be(chunk_data, 0)?,
        height: read_u32_be(chunk_data, 4)?,
        bit_depth: chunk_data[8],
        color_type: chunk_data[9],
    })
}

fn parse_text(chunk_data: &[u8]) -> PngChunkDetail {
    match chunk_data.iter().position(|&b| b == 0) {
        Some(sep) => PngChunkDetail::Text {
            keyword: String::from_utf8_lossy(&chunk_data[..sep]).into_owned(),
            text: String::from_utf8_lossy(&chunk_data[sep + 1..]).into_owned(),
        },
        None => PngChunkDetail::RawText {
            raw_text: String::from_utf8_lossy(chunk_data).into_owned(),
        },
    }
}

/// Walk all chunks after the signature.
///
/// Stops early, returning what was parsed so far, when fewer than 8 header bytes remain or a
/// chunk's declared length would run past the end of the buffer.
pub fn parse_png_chunks(data: &[u8]) -> Vec<PngChunk> {
    let mut chunks = Vec::new();
    let mut offset = PNG_SIGNATURE.len();

    while offset + CHUNK_HEADER_LEN <= data.len() {
        let Some(length) = read_u32_be(data, offset) else {
            break;
        };
        let chunk_type = String::from_utf8_lossy(&data[offset + 4..offset + 8]).into_owned();
        let data_start = offset + CHUNK_HEADER_LEN;
        let data_end = match data_start.checked_add(length as usize) {
            Some(end) if end + CRC_LEN <= data.len() => end,
            _ => {
                tracing::debug!(
                    offset,
                    length,
                    chunk_type = %chunk_type,
                    file_len = data.len(),
                    "png chunk runs past end of buffer; stopping"
                );
                break;
            }
        };
        let Some(crc) = read_u32_be(data, data_end) else {
            break;
        };

        let chunk_data = &data[data_start..data_end];
        let detail = match chunk_type.as_str() {
            CHUNK_IHDR => parse_ihdr(chunk_data),
            CHUNK_TEXT => Some(parse_text(chunk_data)),
            _ => None,
        };

        chunks.push(PngChunk {
            chunk_type,
            offset,
            length,
            crc,
            detail,
        });
        offset = data_end + CRC_LEN;
    }

    chunks
}
