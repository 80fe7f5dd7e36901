//! Character card loading and normalization.
//!
//! A [`CharacterCard`] wraps the raw decoded record and exposes spec-aware accessors
//! (`name`, `description`, ...) plus projections into the v1, v2 and v3 card schemas.

mod loader;
mod merge;
mod raw;
mod spec;

use std::sync::{Arc, OnceLock};

use serde_json::{Map, Value};

use crate::book::Lorebook;
use crate::error::Result;
use crate::metadata::ImageFormat;

pub use loader::{data_uri, decode_card_text, encode_card_text, extract_card_text, CARD_KEYWORD};
pub use merge::merge_objects;
pub use raw::{CharRawData, SpecShape, SPEC_V1, SPEC_V2, SPEC_V3};
pub use spec::{
    is_valid_image_url, CanonicalField, FieldSource, Resolved, SpecVersion, UNKNOWN, V1_FIELDS,
    V2_DATA_FIELDS, V3_DATA_FIELDS,
};

/// Source image kept for the lazily computed fallback avatar.
#[derive(Debug, Clone)]
struct SourceImage {
    format: ImageFormat,
    bytes: Arc<[u8]>,
}

/// A decoded character card.
///
/// Immutable after construction; the fallback avatar data-URI is computed on first use and
/// cached.
#[derive(Debug, Clone)]
pub struct CharacterCard {
    raw: CharRawData,
    source: Option<SourceImage>,
    fallback_avatar: OnceLock<String>,
}

impl CharacterCard {
    /// Sniff, walk, extract and decode a card from image bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let meta = crate::parse_image_metadata(data)?;
        let text = extract_card_text(data, &meta)?;
        let raw = decode_card_text(&text)?;
        tracing::debug!(
            format = %meta.format(),
            spec = raw.spec().unwrap_or("-"),
            "decoded character card"
        );
        Ok(Self::with_source(
            CharRawData::with_v1_defaults(raw.into_fields()),
            meta.format(),
            data,
        ))
    }

    /// Like [`from_bytes`](Self::from_bytes), but an image without a card yields an empty v1
    /// card that still carries the fallback avatar. Other errors are returned unchanged.
    pub fn from_bytes_or_default(data: &[u8]) -> Result<Self> {
        match Self::from_bytes(data) {
            Err(e) if e.is_card_missing() => {
                let format = crate::sniff(data)?;
                Ok(Self::with_source(
                    CharRawData::with_v1_defaults(Map::new()),
                    format,
                    data,
                ))
            }
            other => other,
        }
    }

    /// Wrap an already-decoded record. `fallback_avatar` may be empty.
    pub fn from_json(raw: CharRawData, fallback_avatar: impl Into<String>) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(fallback_avatar.into());
        Self {
            raw,
            source: None,
            fallback_avatar: cell,
        }
    }

    fn with_source(raw: CharRawData, format: ImageFormat, data: &[u8]) -> Self {
        Self {
            raw,
            source: Some(SourceImage {
                format,
                bytes: Arc::from(data),
            }),
            fallback_avatar: OnceLock::new(),
        }
    }

    pub fn raw(&self) -> &CharRawData {
        &self.raw
    }

    /// `data:image/<format>;base64,...` of the source image, or empty for JSON-built cards.
    pub fn fallback_avatar(&self) -> &str {
        self.fallback_avatar.get_or_init(|| match &self.source {
            Some(src) => data_uri(src.format, &src.bytes),
            None => String::new(),
        })
    }

    /// Format of the image the card was read from.
    pub fn source_format(&self) -> Option<ImageFormat> {
        self.source.as_ref().map(|s| s.format)
    }

    /// New card built from this card's projection into `version`, over v1 defaults.
    /// The source image (and so the fallback avatar) is carried over.
    pub fn clone_as(&self, version: SpecVersion) -> Self {
        let fields = match self.to_spec(version) {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        Self {
            raw: CharRawData::with_v1_defaults(fields),
            source: self.source.clone(),
            fallback_avatar: self.fallback_avatar.clone(),
        }
    }

    /// Lorebook built from this card's `data.character_book`.
    pub fn get_book(&self) -> Lorebook {
        Lorebook::from_card(&self.raw)
    }
}
