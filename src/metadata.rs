//! Container format and walked-metadata types shared by the format parsers.

use std::fmt;

use serde::Serialize;

use crate::jpeg::JpegSegment;
use crate::png::PngChunk;
use crate::webp::WebPChunk;

/// Number of payload bytes rendered in chunk/segment previews.
pub const PREVIEW_LEN: usize = 16;

/// Image container recognized by the sniffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
}

impl ImageFormat {
    /// Preferred file extension (e.g. "png", "jpg").
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::WebP => "webp",
        }
    }

    /// Short label for display (e.g. "PNG").
    pub fn label(self) -> &'static str {
        match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::WebP => "WebP",
        }
    }

    /// Subtype used in `image/<subtype>` data URIs.
    pub fn mime_subtype(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::WebP => "webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered chunk/segment listing of one image, keyed by format.
///
/// Serializes as `{"format": "png", "chunks": [...]}`, `{"format": "jpeg", "segments": [...]}`
/// or `{"format": "webp", "chunks": [...]}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum ParsedMetadata {
    Png { chunks: Vec<PngChunk> },
    Jpeg { segments: Vec<JpegSegment> },
    WebP { chunks: Vec<WebPChunk> },
}

impl ParsedMetadata {
    pub fn format(&self) -> ImageFormat {
        match self {
            ParsedMetadata::Png { .. } => ImageFormat::Png,
            ParsedMetadata::Jpeg { .. } => ImageFormat::Jpeg,
            ParsedMetadata::WebP { .. } => ImageFormat::WebP,
        }
    }

    /// Number of chunks or segments walked.
    pub fn len(&self) -> usize {
        match self {
            ParsedMetadata::Png { chunks } => chunks.len(),
            ParsedMetadata::Jpeg { segments } => segments.len(),
            ParsedMetadata::WebP { chunks } => chunks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lowercase hex of the first [`PREVIEW_LEN`] bytes, space separated ("ff d8 00").
pub(crate) fn hex_preview(payload: &[u8]) -> String {
    payload
        .iter()
        .take(PREVIEW_LEN)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
