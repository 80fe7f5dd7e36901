//! JPEG marker segment walker. Reads APPn/COM/DQT/SOFn headers up to Start-of-Scan without
//! touching entropy-coded data.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::metadata::{hex_preview, ImageFormat};

/// Start of Image.
pub const SOI: u8 = 0xD8;
/// End of Image.
pub const EOI: u8 = 0xD9;
/// Start of Scan.
pub const SOS: u8 = 0xDA;
/// APP0 (JFIF).
pub const APP0: u8 = 0xE0;
/// APP1 (Exif / XMP).
pub const APP1: u8 = 0xE1;
/// Comment.
pub const COM: u8 = 0xFE;
/// Temporary private use marker; carries no length.
const TEM: u8 = 0x01;
/// Restart markers RST0..=RST7.
const RST0: u8 = 0xD0;
const RST7: u8 = 0xD7;

const JFIF_ID: &[u8] = b"JFIF\0";
const EXIF_ID: &[u8] = b"Exif";
const XMP_NAMESPACE: &[u8] = b"http://ns.adobe.com/xap/1.0/";
/// Bytes of an APP1 payload searched for the XMP namespace.
const XMP_PROBE_LEN: usize = 29;
/// PNG keyword limit; longer prefixes before a NUL are not treated as keywords.
const MAX_KEYWORD_LEN: usize = 79;

/// Classified segment kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SegmentKind {
    #[serde(rename = "JFIF")]
    Jfif,
    #[serde(rename = "EXIF")]
    Exif,
    #[serde(rename = "XMP")]
    Xmp,
    #[serde(rename = "APP1")]
    App1,
    Comment,
    Other,
}

/// One marker segment, in file order. SOI is not recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JpegSegment {
    /// Marker as "FF xx" (uppercase hex).
    pub marker: String,
    /// Offset of the 0xFF byte that introduces the marker (after fill bytes).
    pub offset: usize,
    /// Length field as encoded (includes its own two bytes); 0 for standalone markers.
    pub length: u16,
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    /// Hex of the first 16 payload bytes.
    pub preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// For `keyword\0text` comments, the keyword before the NUL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

impl JpegSegment {
    /// Comment text after the keyword separator, or the whole comment when there is no keyword.
    pub fn comment_text(&self) -> Option<&str> {
        let comment = self.comment.as_deref()?;
        match &self.keyword {
            Some(keyword) => comment.get(keyword.len() + 1..),
            None => Some(comment),
        }
    }
}

/// JPEG starts with SOI (FF D8).
#[inline]
pub fn is_jpeg(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] == SOI
}

/// Markers that are not followed by a length field: TEM, RST0..=RST7, and a repeated SOI.
#[inline]
fn is_standalone(marker: u8) -> bool {
    matches!(marker, TEM | SOI | RST0..=RST7)
}

fn classify(marker: u8, payload: &[u8]) -> SegmentKind {
    match marker {
        APP0 if payload.starts_with(JFIF_ID) => SegmentKind::Jfif,
        APP1 if payload.starts_with(EXIF_ID) => SegmentKind::Exif,
        APP1 => {
            let probe = &payload[..payload.len().min(XMP_PROBE_LEN)];
            if probe.windows(XMP_NAMESPACE.len()).any(|w| w == XMP_NAMESPACE) {
                SegmentKind::Xmp
            } else {
                SegmentKind::App1
            }
        }
        COM => SegmentKind::Comment,
        _ => SegmentKind::Other,
    }
}

/// Keyword of a `keyword\0text` comment (printable ASCII, 1..=79 bytes).
fn comment_keyword(payload: &[u8]) -> Option<String> {
    let sep = payload.iter().position(|&b| b == 0)?;
    let keyword = &payload[..sep];
    if keyword.is_empty()
        || keyword.len() > MAX_KEYWORD_LEN
        || !keyword.iter().all(|b| b.is_ascii_graphic() || *b == b' ')
    {
        return None;
    }
    Some(String::from_utf8_lossy(keyword).into_owned())
}

/// Walk segments from offset 2 until SOS, EOI or end of buffer.
///
/// Any byte other than 0xFF where a marker is expected is an error; the walker does not
/// resynchronize. A segment length that is too small or runs past the buffer is also an error.
pub fn parse_jpeg_segments(data: &[u8]) -> Result<Vec<JpegSegment>> {
    let malformed = |offset: usize, reason: String| Error::malformed(ImageFormat::Jpeg, offset, reason);
    let mut segments = Vec::new();
    let mut offset = 2;

    while offset < data.len() {
        if data[offset] != 0xFF {
            return Err(malformed(
                offset,
                format!("expected marker 0xFF, found 0x{:02X}", data[offset]),
            ));
        }
        // Skip 0xFF fill bytes preceding the real marker.
        while data.get(offset + 1) == Some(&0xFF) {
            offset += 1;
        }
        let Some(&marker) = data.get(offset + 1) else {
            return Err(malformed(offset, "truncated marker".to_string()));
        };
        let marker_offset = offset;
        offset += 2;

        if marker == EOI || marker == SOS {
            tracing::debug!(marker_offset, marker, "jpeg walk reached scan/end marker");
            break;
        }

        if is_standalone(marker) {
            segments.push(JpegSegment {
                marker: format!("FF {:02X}", marker),
                offset: marker_offset,
                length: 0,
                kind: SegmentKind::Other,
                preview: String::new(),
                comment: None,
                keyword: None,
            });
            continue;
        }

        let Some(len_bytes) = data.get(offset..offset + 2) else {
            return Err(malformed(
                marker_offset,
                format!("truncated length for marker FF {:02X}", marker),
            ));
        };
        let length = u16::from_be_bytes([len_bytes[0], len_bytes[1]]);
        if length < 2 {
            return Err(malformed(
                marker_offset,
                format!("segment length {} smaller than its length field", length),
            ));
        }
        let payload_start = offset + 2;
        let payload_end = offset + length as usize;
        if payload_end > data.len() {
            return Err(malformed(
                marker_offset,
                format!(
                    "segment FF {:02X} length {} runs past end of buffer ({} bytes)",
                    marker,
                    length,
                    data.len()
                ),
            ));
        }
        let payload = &data[payload_start..payload_end];

        let kind = classify(marker, payload);
        let (comment, keyword) = if kind == SegmentKind::Comment {
            (
                Some(String::from_utf8_lossy(payload).into_owned()),
                comment_keyword(payload),
            )
        } else {
            (None, None)
        };

        segments.push(JpegSegment {
            marker: format!("FF {:02X}", marker),
            offset: marker_offset,
            length,
            kind,
            preview: hex_preview(payload),
            comment,
            keyword,
        });
        offset = payload_end;
    }

    Ok(segments)
}
