//! WebP container support: RIFF chunk walk and the EXIF UserComment reader.
//!
//! Cards are stored base64-encoded in the UserComment tag of the `EXIF` chunk.

mod exif;
mod parser;

pub use exif::{
    decode_user_comment, read_ifd_entry, read_tiff_header, read_user_comment, walk_ifd, Endian,
    IfdEntry, EXIF_ID_PREFIX, IFD_ENTRY_LEN, TAG_USER_COMMENT, TIFF_HEADER_LEN,
};
pub use parser::{is_webp, parse_webp_chunks, WebPChunk, CHUNK_EXIF, CHUNK_HEADER_LEN, RIFF_HEADER_LEN};
