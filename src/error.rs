//! Error types for container walking, card extraction and normalization.

use std::string::FromUtf8Error;

use crate::metadata::ImageFormat;

/// Failure while turning recovered card text into a raw record.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("card payload is not a JSON object")]
    NotAnObject,
}

/// Error types for character card extraction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Buffer matches no PNG, JPEG or WebP signature.
    #[error("unsupported image format (no PNG, JPEG or WebP signature)")]
    UnsupportedFormat,

    /// Chunk/segment structure violates the expected layout.
    #[error("malformed {format} container at offset {offset}: {reason}")]
    MalformedContainer {
        format: ImageFormat,
        offset: usize,
        reason: String,
    },

    /// Recognized container, but no chara-tagged chunk, segment or EXIF tag.
    #[error("no character card found in {0} image")]
    CardNotFound(ImageFormat),

    /// The recovered payload could not be base64/UTF-8/JSON decoded.
    #[error("corrupted character card data: {0}")]
    Decode(#[from] DecodeError),

    #[error("unsupported card spec version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid lorebook: {0}")]
    InvalidBook(String),
}

impl Error {
    /// The image carries no card at all.
    pub fn is_card_missing(&self) -> bool {
        matches!(self, Error::CardNotFound(_))
    }

    /// The image carries a card payload that could not be decoded.
    pub fn is_corrupt_card(&self) -> bool {
        matches!(self, Error::Decode(_))
    }

    pub(crate) fn malformed(format: ImageFormat, offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedContainer {
            format,
            offset,
            reason: reason.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
