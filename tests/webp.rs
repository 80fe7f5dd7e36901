//! WebP RIFF walker and EXIF UserComment card extraction tests.

use charcard::card::encode_card_text;
use charcard::webp::{parse_webp_chunks, read_user_comment, CHUNK_EXIF};
use charcard::{parse_image_metadata, read_card, CharRawData, Error, ImageFormat};
use pretty_assertions::assert_eq;
use serde_json::json;

#[derive(Clone, Copy)]
enum Order {
    Little,
    Big,
}

impl Order {
    fn u16(self, v: u16) -> [u8; 2] {
        match self {
            Order::Little => v.to_le_bytes(),
            Order::Big => v.to_be_bytes(),
        }
    }

    fn u32(self, v: u32) -> [u8; 4] {
        match self {
            Order::Little => v.to_le_bytes(),
            Order::Big => v.to_be_bytes(),
        }
    }
}

/// TIFF blob with one IFD holding a single UserComment entry.
fn tiff_with_comment(order: Order, value: &[u8]) -> Vec<u8> {
    let mut t = Vec::new();
    t.extend_from_slice(match order {
        Order::Little => b"II",
        Order::Big => b"MM",
    });
    t.extend_from_slice(&order.u16(0x2A));
    t.extend_from_slice(&order.u32(8));
    t.extend_from_slice(&order.u16(1));
    t.extend_from_slice(&order.u16(0x9286));
    t.extend_from_slice(&order.u16(7));
    t.extend_from_slice(&order.u32(value.len() as u32));
    // Header (8) + count (2) + entry (12) + next IFD (4).
    let value_offset = 26u32;
    if value.len() <= 4 {
        let mut inline = [0u8; 4];
        inline[..value.len()].copy_from_slice(value);
        t.extend_from_slice(&inline);
    } else {
        t.extend_from_slice(&order.u32(value_offset));
    }
    t.extend_from_slice(&0u32.to_le_bytes());
    if value.len() > 4 {
        t.extend_from_slice(value);
    }
    t
}

fn riff_chunk(fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut c = fourcc.to_vec();
    c.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    c.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        c.push(0);
    }
    c
}

fn webp(chunks: &[Vec<u8>]) -> Vec<u8> {
    let body: Vec<u8> = chunks.concat();
    let mut v = b"RIFF".to_vec();
    v.extend_from_slice(&((body.len() + 4) as u32).to_le_bytes());
    v.extend_from_slice(b"WEBP");
    v.extend_from_slice(&body);
    v
}

fn ascii_comment(text: &str) -> Vec<u8> {
    let mut v = b"ASCII\0\0\0".to_vec();
    v.extend_from_slice(text.as_bytes());
    v
}

fn encoded_card() -> String {
    let raw: CharRawData = serde_json::from_value(json!({
        "spec": "chara_card_v3",
        "spec_version": "3.0",
        "data": {"name": "Kestrel", "nickname": "Kes", "tags": ["sky"]}
    }))
    .unwrap();
    encode_card_text(&raw).unwrap()
}

#[test]
fn chunks_have_absolute_offsets_and_padding() {
    let data = webp(&[
        riff_chunk(b"VP8X", &[0u8; 10]),
        riff_chunk(b"ICCP", &[1, 2, 3]),
        riff_chunk(b"VP8 ", &[9u8; 20]),
    ]);
    let chunks = parse_webp_chunks(&data);
    let types: Vec<&str> = chunks.iter().map(|c| c.chunk_type.as_str()).collect();
    assert_eq!(types, vec!["VP8X", "ICCP", "VP8 "]);
    assert_eq!(chunks[0].offset, 12);
    assert_eq!(chunks[1].offset, 30);
    // 3-byte payload is followed by one pad byte.
    assert_eq!(chunks[2].offset, 42);
    assert_eq!(chunks[1].length, 3);
    assert_eq!(chunks[1].preview, "01 02 03");
}

#[test]
fn truncated_chunk_stops_walk() {
    let mut data = webp(&[riff_chunk(b"VP8X", &[0u8; 10])]);
    data.extend_from_slice(b"EXIF");
    data.extend_from_slice(&500u32.to_le_bytes());
    data.extend_from_slice(&[0u8; 8]);
    let chunks = parse_webp_chunks(&data);
    assert_eq!(chunks.len(), 1);
    assert!(matches!(read_card(&data), Err(Error::CardNotFound(ImageFormat::WebP))));
}

#[test]
fn card_in_little_endian_user_comment() {
    let exif = tiff_with_comment(Order::Little, &ascii_comment(&encoded_card()));
    let data = webp(&[riff_chunk(b"VP8X", &[0u8; 10]), riff_chunk(b"EXIF", &exif)]);
    let meta = parse_image_metadata(&data).unwrap();
    assert_eq!(meta.format(), ImageFormat::WebP);

    let card = read_card(&data).unwrap();
    assert_eq!(card.name(), "Kestrel");
    assert_eq!(card.spec(), "chara_card_v3");
    assert_eq!(card.tags(), vec!["sky"]);
}

#[test]
fn card_in_big_endian_user_comment() {
    let exif = tiff_with_comment(Order::Big, &ascii_comment(&encoded_card()));
    let data = webp(&[riff_chunk(b"EXIF", &exif)]);
    assert_eq!(read_card(&data).unwrap().name(), "Kestrel");
}

#[test]
fn exif_identifier_prefix_is_skipped() {
    let mut exif = b"Exif\0\0".to_vec();
    exif.extend_from_slice(&tiff_with_comment(Order::Little, encoded_card().as_bytes()));
    let data = webp(&[riff_chunk(b"EXIF", &exif)]);
    assert_eq!(read_card(&data).unwrap().name(), "Kestrel");
}

#[test]
fn comment_without_charset_header() {
    let tiff = tiff_with_comment(Order::Little, b"plain text\0\0");
    assert_eq!(read_user_comment(&tiff, 0).as_deref(), Some("plain text"));
}

#[test]
fn short_comment_is_stored_inline() {
    let tiff = tiff_with_comment(Order::Big, b"abc");
    assert_eq!(read_user_comment(&tiff, 0).as_deref(), Some("abc"));
}

#[test]
fn unicode_comment_uses_tiff_byte_order() {
    let mut value = b"UNICODE\0".to_vec();
    for unit in "hé".encode_utf16() {
        value.extend_from_slice(&unit.to_be_bytes());
    }
    let tiff = tiff_with_comment(Order::Big, &value);
    assert_eq!(read_user_comment(&tiff, 0).as_deref(), Some("hé"));
}

#[test]
fn value_out_of_bounds_is_ignored() {
    let mut tiff = tiff_with_comment(Order::Little, &ascii_comment("long enough text"));
    tiff.truncate(30);
    assert_eq!(read_user_comment(&tiff, 0), None);
}

#[test]
fn webp_without_exif_has_no_card() {
    let data = webp(&[riff_chunk(b"VP8 ", &[0u8; 4])]);
    let err = read_card(&data).unwrap_err();
    assert!(err.is_card_missing());
}

#[test]
fn exif_without_user_comment_has_no_card() {
    let mut tiff = b"II".to_vec();
    tiff.extend_from_slice(&0x2Au16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&1u16.to_le_bytes());
    // Orientation, SHORT, 1, inline value 1.
    tiff.extend_from_slice(&0x0112u16.to_le_bytes());
    tiff.extend_from_slice(&3u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    let data = webp(&[riff_chunk(b"EXIF", &tiff)]);
    let chunks = parse_webp_chunks(&data);
    assert_eq!(chunks[0].chunk_type, CHUNK_EXIF);
    assert!(matches!(read_card(&data), Err(Error::CardNotFound(ImageFormat::WebP))));
}
