//! # charcard
//!
//! Library to extract "character cards" (JSON records describing a chat persona) embedded in
//! ordinary images, and to normalize them across the three card schema versions.
//!
//! Parsing is slice-based and never decodes pixels: the container is sniffed, its chunks or
//! segments are walked, and the one record carrying the card is decoded.
//!
//! ## Supported containers
//!
//! - **PNG**: `tEXt` chunk with keyword `chara`, value base64 JSON.
//! - **JPEG**: COM segment, either `chara\0<base64>` or a bare base64 body.
//! - **WebP**: `EXIF` chunk; UserComment (tag 0x9286) in the first IFD holds the base64 JSON.
//!
//! ## Card schemas
//!
//! - `chara_card_v1`: fields at the top level (`name`, `description`, `first_mes`, ...).
//! - `chara_card_v2` / `chara_card_v3`: fields nested under `data`, v3 adding assets,
//!   nickname, multilingual notes and dates.
//!
//! [`CharacterCard`] reads any of them through the same accessors and can project into each
//! version, or into a merge of all three ([`CharacterCard::to_max_compatible_spec`]).
//!
//! ## Example
//!
//! ```no_run
//! let bytes = std::fs::read("card.png").unwrap();
//! match charcard::read_card(&bytes) {
//!     Ok(card) => {
//!         println!("{} ({})", card.name(), card.spec());
//!         let book = card.get_book();
//!         for entry in book.scan("a dragon appears") {
//!             println!("lore: {}", entry.content);
//!         }
//!     }
//!     Err(e) if e.is_card_missing() => println!("no card in this image"),
//!     Err(e) => println!("corrupted or unreadable: {e}"),
//! }
//! ```

pub mod book;
pub mod card;
mod error;
pub mod jpeg;
mod metadata;
pub mod png;
pub mod webp;

pub use book::{Lorebook, LorebookEntry};
pub use card::{CharRawData, CharacterCard, SpecVersion};
pub use error::{DecodeError, Error, Result};
pub use metadata::{ImageFormat, ParsedMetadata, PREVIEW_LEN};

/// Detect the container from magic bytes (no extension needed).
#[inline]
pub fn detect_format(data: &[u8]) -> Option<ImageFormat> {
    if png::is_png(data) {
        return Some(ImageFormat::Png);
    }
    if jpeg::is_jpeg(data) {
        return Some(ImageFormat::Jpeg);
    }
    if webp::is_webp(data) {
        return Some(ImageFormat::WebP);
    }
    None
}

/// Like [`detect_format`], failing with [`Error::UnsupportedFormat`].
#[inline]
pub fn sniff(data: &[u8]) -> Result<ImageFormat> {
    detect_format(data).ok_or(Error::UnsupportedFormat)
}

/// Sniff the buffer and walk its chunks/segments.
pub fn parse_image_metadata(data: &[u8]) -> Result<ParsedMetadata> {
    let meta = match sniff(data)? {
        ImageFormat::Png => ParsedMetadata::Png {
            chunks: png::parse_png_chunks(data),
        },
        ImageFormat::Jpeg => ParsedMetadata::Jpeg {
            segments: jpeg::parse_jpeg_segments(data)?,
        },
        ImageFormat::WebP => ParsedMetadata::WebP {
            chunks: webp::parse_webp_chunks(data),
        },
    };
    tracing::debug!(format = %meta.format(), records = meta.len(), "walked container");
    Ok(meta)
}

/// Extract and decode the card embedded in `data`.
pub fn read_card(data: &[u8]) -> Result<CharacterCard> {
    CharacterCard::from_bytes(data)
}

/// Result of loading one item in a batch (path or id + card or error).
#[derive(Debug)]
pub struct BatchItem<T> {
    pub path_or_id: T,
    pub result: Result<CharacterCard>,
}

/// Load many buffers in sequence. Every call is independent, so callers wanting parallelism
/// can map [`read_card`] over their own thread pool instead.
pub fn load_batch<I, B>(items: I) -> Vec<BatchItem<B>>
where
    I: IntoIterator<Item = (B, Vec<u8>)>,
{
    items
        .into_iter()
        .map(|(path_or_id, bytes)| BatchItem {
            path_or_id,
            result: read_card(&bytes),
        })
        .collect()
}
