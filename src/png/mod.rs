//! PNG container support: signature check and chunk walk.
//!
//! Cards are stored base64-encoded in a `tEXt` chunk with keyword `chara`.

mod parser;

pub use parser::{
    is_png, parse_png_chunks, PngChunk, PngChunkDetail, CHUNK_IHDR, CHUNK_TEXT, PNG_SIGNATURE,
};
