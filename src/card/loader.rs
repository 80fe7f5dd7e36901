//! Payload location and decoding: chunk/segment lookup per format, base64 + JSON decode, and
//! the data-URI fallback avatar.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde_json::Value;

use crate::card::raw::CharRawData;
use crate::error::{DecodeError, Error, Result};
use crate::jpeg::{JpegSegment, SegmentKind};
use crate::metadata::{ImageFormat, ParsedMetadata};
use crate::webp::{read_user_comment, WebPChunk, CHUNK_EXIF, EXIF_ID_PREFIX};

/// Keyword that tags the card payload (PNG tEXt, JPEG COM).
pub const CARD_KEYWORD: &str = "chara";

/// Standard alphabet; accepts payloads with or without `=` padding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Locate the card text inside an already-walked container.
///
/// - PNG: the `tEXt` chunk with keyword `chara`.
/// - JPEG: the Comment segment with keyword `chara`, else the first Comment whose whole body
///   is base64 text.
/// - WebP: UserComment of the `EXIF` chunk's first IFD.
pub fn extract_card_text(data: &[u8], meta: &ParsedMetadata) -> Result<String> {
    let text = match meta {
        ParsedMetadata::Png { chunks } => chunks
            .iter()
            .find(|c| c.keyword() == Some(CARD_KEYWORD))
            .and_then(|c| c.text())
            .map(str::to_string),
        ParsedMetadata::Jpeg { segments } => jpeg_card_text(segments),
        ParsedMetadata::WebP { chunks } => chunks
            .iter()
            .find(|c| c.chunk_type == CHUNK_EXIF)
            .and_then(|c| webp_card_text(data, c)),
    };
    match text {
        Some(t) if !t.trim().is_empty() => Ok(t),
        _ => Err(Error::CardNotFound(meta.format())),
    }
}

fn jpeg_card_text(segments: &[JpegSegment]) -> Option<String> {
    let comments = || segments.iter().filter(|s| s.kind == SegmentKind::Comment);
    if let Some(tagged) = comments().find(|s| s.keyword.as_deref() == Some(CARD_KEYWORD)) {
        return tagged.comment_text().map(str::to_string);
    }
    comments()
        .filter_map(|s| s.comment.as_deref())
        .find(|c| looks_like_base64(c))
        .map(str::to_string)
}

fn webp_card_text(data: &[u8], chunk: &WebPChunk) -> Option<String> {
    let mut tiff_offset = chunk.payload_offset();
    if data.get(tiff_offset..)?.starts_with(EXIF_ID_PREFIX) {
        tiff_offset += EXIF_ID_PREFIX.len();
    }
    read_user_comment(data, tiff_offset)
}

fn looks_like_base64(text: &str) -> bool {
    let body = trim_payload(text);
    !body.is_empty()
        && body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'=' | b'\r' | b'\n'))
}

fn trim_payload(text: &str) -> &str {
    text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
}

/// Base64-decode then JSON-decode recovered card text into a raw record.
pub fn decode_card_text(text: &str) -> std::result::Result<CharRawData, DecodeError> {
    let compact: String = trim_payload(text)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = PAYLOAD_ENGINE.decode(compact.as_bytes())?;
    let json = String::from_utf8(bytes)?;
    match serde_json::from_str::<Value>(&json)? {
        Value::Object(fields) => Ok(CharRawData::new(fields)),
        _ => Err(DecodeError::NotAnObject),
    }
}

/// Base64-encode a raw record the way cards are embedded (standard alphabet, padded).
pub fn encode_card_text(raw: &CharRawData) -> std::result::Result<String, DecodeError> {
    let json = serde_json::to_string(raw)?;
    Ok(STANDARD.encode(json.as_bytes()))
}

/// `data:image/<format>;base64,<whole file>`.
pub fn data_uri(format: ImageFormat, data: &[u8]) -> String {
    format!(
        "data:image/{};base64,{}",
        format.mime_subtype(),
        STANDARD.encode(data)
    )
}
