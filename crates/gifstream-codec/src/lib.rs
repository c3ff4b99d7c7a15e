//! Pure codec layer of gifstream: fixed GIF block layouts, palettes,
//! variable-width LZW and index-to-ARGB composition.
//!
//! Nothing here performs I/O or suspends. The session parser reads raw bytes
//! off a stream and hands them to these types:
//! - [`blocks`] parses and encodes the fixed-size headers and descriptors
//! - [`lzw`] turns a concatenated sub-block payload into an index stream
//! - [`Canvas`] writes an index stream into a persistent ARGB buffer
//!
//! [`encode`] goes the other way and is used to build streams for tests and
//! demos.

pub mod blocks;
pub mod compositor;
pub mod encode;
pub mod error;
pub mod lzw;
pub mod palette;

pub use blocks::{
    ApplicationExtension, BlockTag, ExtensionLabel, GraphicControl, Header, ImageDescriptor,
    ScreenDescriptor, NETSCAPE_IDENTIFIER,
};
pub use compositor::{Canvas, ComposeStats, OPAQUE_BLACK};
pub use encode::{write_sub_blocks, GifWriter};
pub use error::{CodecError, Result};
pub use palette::Palette;
