//! JPEG container support: SOI check and marker segment walk.
//!
//! Cards are carried in a COM segment, either as `chara\0<base64>` or as a bare base64 body.

mod parser;

pub use parser::{is_jpeg, parse_jpeg_segments, JpegSegment, SegmentKind, APP0, APP1, COM, EOI, SOI, SOS};
