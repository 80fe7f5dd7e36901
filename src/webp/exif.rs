//! Minimal TIFF/EXIF reader for the UserComment tag. Operates on slices; only the first IFD is
//! scanned (no IFD chaining, no Exif sub-IFD).

/// UserComment.
pub const TAG_USER_COMMENT: u16 = 0x9286;

/// Size of TIFF header in bytes (byte order, magic, IFD0 offset).
pub const TIFF_HEADER_LEN: usize = 8;
/// Size of one IFD entry in bytes.
pub const IFD_ENTRY_LEN: usize = 12;

/// Some writers prefix the WebP EXIF payload with the JPEG APP1 identifier.
pub const EXIF_ID_PREFIX: &[u8] = b"Exif\0\0";

/// UserComment character code headers (8 bytes each).
const CHARSET_ASCII: &[u8; 8] = b"ASCII\0\0\0";
const CHARSET_UTF8: &[u8; 8] = b"UTF8\0\0\0\0";
const CHARSET_UNICODE: &[u8; 8] = b"UNICODE\0";
const CHARSET_LEN: usize = 8;

/// Value fits in the entry itself when it is at most this many bytes.
const INLINE_VALUE_LEN: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    /// Byte order from the "II" / "MM" marker.
    pub fn from_marker(marker: &[u8]) -> Option<Self> {
        match marker.get(..2)? {
            b"II" => Some(Endian::Little),
            b"MM" => Some(Endian::Big),
            _ => None,
        }
    }

    #[inline]
    pub fn read_u16(self, data: &[u8], offset: usize) -> Option<u16> {
        let bytes = data.get(offset..offset.checked_add(2)?)?;
        Some(match self {
            Endian::Little => u16::from_le_bytes([bytes[0], bytes[1]]),
            Endian::Big => u16::from_be_bytes([bytes[0], bytes[1]]),
        })
    }

    #[inline]
    pub fn read_u32(self, data: &[u8], offset: usize) -> Option<u32> {
        let bytes = data.get(offset..offset.checked_add(4)?)?;
        Some(match self {
            Endian::Little => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            Endian::Big => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        })
    }
}

/// Single IFD entry (tag, type, count, value/offset) plus where it sits in the TIFF blob.
#[derive(Debug, Clone, Copy)]
pub struct IfdEntry {
    pub tag: u16,
    pub field_type: u16,
    pub count: u32,
    pub value_offset: u32,
    /// Offset of the entry itself, relative to the TIFF header.
    pub entry_offset: usize,
}

/// Read one IFD entry at `offset` (must have 12 bytes available).
pub fn read_ifd_entry(bo: Endian, tiff: &[u8], offset: usize) -> Option<IfdEntry> {
    if tiff.len().saturating_sub(offset) < IFD_ENTRY_LEN {
        return None;
    }
    Some(IfdEntry {
        tag: bo.read_u16(tiff, offset)?,
        field_type: bo.read_u16(tiff, offset + 2)?,
        count: bo.read_u32(tiff, offset + 4)?,
        value_offset: bo.read_u32(tiff, offset + 8)?,
        entry_offset: offset,
    })
}

/// Read the byte order and IFD0 offset. The 0x002A magic is not enforced.
pub fn read_tiff_header(tiff: &[u8]) -> Option<(Endian, u32)> {
    if tiff.len() < TIFF_HEADER_LEN {
        return None;
    }
    let bo = Endian::from_marker(tiff)?;
    let ifd0 = bo.read_u32(tiff, 4)?;
    Some((bo, ifd0))
}

/// Iterate the entries of the IFD at `ifd_offset`. Entries past the end of the blob are
/// dropped rather than failing the whole directory.
pub fn walk_ifd(
    bo: Endian,
    tiff: &[u8],
    ifd_offset: u32,
) -> Option<impl Iterator<Item = IfdEntry> + '_> {
    let offset = ifd_offset as usize;
    let num_entries = bo.read_u16(tiff, offset)? as usize;
    let entries_start = offset + 2;
    Some((0..num_entries).map_while(move |i| read_ifd_entry(bo, tiff, entries_start + i * IFD_ENTRY_LEN)))
}

/// Bytes of an entry's value: inline for `count <= 4`, else at `value_offset`.
/// Counts are in bytes (UserComment is type UNDEFINED).
fn entry_value_bytes(tiff: &[u8], entry: IfdEntry) -> Option<&[u8]> {
    let start = if entry.count <= INLINE_VALUE_LEN {
        entry.entry_offset + 8
    } else {
        entry.value_offset as usize
    };
    tiff.get(start..start.checked_add(entry.count as usize)?)
}

/// Decode a UserComment value: strip an ASCII/UTF8/UNICODE character code header when
/// present, otherwise decode the whole span as UTF-8. Trailing NUL padding is removed.
pub fn decode_user_comment(bo: Endian, raw: &[u8]) -> String {
    let text = if raw.len() >= CHARSET_LEN {
        let (header, body) = raw.split_at(CHARSET_LEN);
        if header == CHARSET_ASCII || header == CHARSET_UTF8 {
            String::from_utf8_lossy(body).into_owned()
        } else if header == CHARSET_UNICODE {
            let units: Vec<u16> = body
                .chunks_exact(2)
                .filter_map(|pair| bo.read_u16(pair, 0))
                .collect();
            String::from_utf16_lossy(&units)
        } else {
            String::from_utf8_lossy(raw).into_owned()
        }
    } else {
        String::from_utf8_lossy(raw).into_owned()
    };
    text.trim_end_matches('\0').to_string()
}

/// Find UserComment (0x9286) in the first IFD of the TIFF blob starting at `tiff_offset`
/// within `data`. Returns `None` if the header is invalid or the tag is absent.
pub fn read_user_comment(data: &[u8], tiff_offset: usize) -> Option<String> {
    let tiff = data.get(tiff_offset..)?;
    let Some((bo, ifd0)) = read_tiff_header(tiff) else {
        tracing::debug!(tiff_offset, "no TIFF byte order marker at EXIF start");
        return None;
    };
    let entry = walk_ifd(bo, tiff, ifd0)?.find(|e| e.tag == TAG_USER_COMMENT)?;
    let Some(raw) = entry_value_bytes(tiff, entry) else {
        tracing::debug!(
            count = entry.count,
            value_offset = entry.value_offset,
            "UserComment value out of bounds"
        );
        return None;
    };
    Some(decode_user_comment(bo, raw))
}
