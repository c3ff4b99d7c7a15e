//! Stream builder used to produce GIF bytes for tests, demos and the CLI's
//! self-check fixtures.

use bytes::{BufMut, Bytes, BytesMut};

use crate::blocks::{
    ApplicationExtension, ExtensionLabel, GraphicControl, Header, ImageDescriptor,
    ScreenDescriptor, APPLICATION_SIZE, EXTENSION_TAG, GRAPHIC_CONTROL_SIZE, IMAGE_TAG,
    TRAILER_TAG,
};
use crate::error::Result;
use crate::lzw;
use crate::palette::Palette;

/// Largest payload of a single sub-block.
pub const MAX_SUB_BLOCK: usize = 255;

/// Write `data` as length-prefixed sub-blocks followed by the zero terminator.
pub fn write_sub_blocks(data: &[u8], dst: &mut BytesMut) {
    for chunk in data.chunks(MAX_SUB_BLOCK) {
        dst.put_u8(chunk.len() as u8);
        dst.put_slice(chunk);
    }
    dst.put_u8(0);
}

/// Incrementally assembles a GIF stream.
///
/// ```
/// use gifstream_codec::{GifWriter, ImageDescriptor, Palette};
///
/// let palette = Palette::from_rgb([[255, 0, 0], [0, 255, 0]]).unwrap();
/// let bytes = GifWriter::new(2, 2)
///     .image(ImageDescriptor::new(0, 0, 2, 2), Some(&palette), &[0, 1, 0, 1], 2)
///     .unwrap()
///     .finish();
/// assert_eq!(&bytes[..6], b"GIF89a");
/// assert_eq!(bytes.last(), Some(&0x3B));
/// ```
#[derive(Debug, Clone)]
pub struct GifWriter {
    buf: BytesMut,
}

impl GifWriter {
    /// Header and screen descriptor with no global palette.
    pub fn new(width: u16, height: u16) -> Self {
        Self::with_screen(ScreenDescriptor::new(width, height), None)
    }

    /// Header and screen descriptor followed by a global palette.
    pub fn with_global_palette(width: u16, height: u16, palette: &Palette) -> Self {
        let screen = ScreenDescriptor::new(width, height).with_global_palette(palette.size_exponent());
        Self::with_screen(screen, Some(palette))
    }

    fn with_screen(screen: ScreenDescriptor, palette: Option<&Palette>) -> Self {
        let mut buf = BytesMut::new();
        Header::gif89a().encode(&mut buf);
        screen.encode(&mut buf);
        if let Some(palette) = palette {
            palette.encode(&mut buf);
        }
        Self { buf }
    }

    pub fn graphic_control(mut self, control: GraphicControl) -> Self {
        self.buf.put_u8(EXTENSION_TAG);
        self.buf.put_u8(ExtensionLabel::GraphicControl.into());
        self.buf.put_u8(GRAPHIC_CONTROL_SIZE);
        control.encode(&mut self.buf);
        self.buf.put_u8(0);
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.buf.put_u8(EXTENSION_TAG);
        self.buf.put_u8(ExtensionLabel::Comment.into());
        write_sub_blocks(text.as_bytes(), &mut self.buf);
        self
    }

    /// NETSCAPE application extension carrying `count` (0 loops forever).
    pub fn loop_count(mut self, count: u16) -> Self {
        self.buf.put_u8(EXTENSION_TAG);
        self.buf.put_u8(ExtensionLabel::Application.into());
        self.buf.put_u8(APPLICATION_SIZE);
        ApplicationExtension::netscape().encode(&mut self.buf);
        let [lo, hi] = count.to_le_bytes();
        write_sub_blocks(&[1, lo, hi], &mut self.buf);
        self
    }

    /// Image block. A local palette, when given, sets the descriptor's
    /// local-palette bits.
    pub fn image(
        mut self,
        descriptor: ImageDescriptor,
        local_palette: Option<&Palette>,
        indices: &[u8],
        min_code_size: u8,
    ) -> Result<Self> {
        let packed = lzw::encode(indices, min_code_size)?;
        let descriptor = match local_palette {
            Some(palette) => descriptor.with_local_palette(palette.size_exponent()),
            None => descriptor,
        };

        self.buf.put_u8(IMAGE_TAG);
        descriptor.encode(&mut self.buf);
        if let Some(palette) = local_palette {
            palette.encode(&mut self.buf);
        }
        self.buf.put_u8(min_code_size);
        write_sub_blocks(&packed, &mut self.buf);
        Ok(self)
    }

    /// Append bytes verbatim, for building deliberately broken streams.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.put_slice(bytes);
        self
    }

    /// Bytes written so far, without a trailer.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    /// Append the trailer and return the stream.
    pub fn finish(mut self) -> Bytes {
        self.buf.put_u8(TRAILER_TAG);
        self.buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_blocks_split_at_255() {
        let data = vec![7u8; 300];
        let mut buf = BytesMut::new();
        write_sub_blocks(&data, &mut buf);
        assert_eq!(buf.len(), 1 + 255 + 1 + 45 + 1);
        assert_eq!(buf[0], 255);
        assert_eq!(buf[256], 45);
        assert_eq!(buf[buf.len() - 1], 0);
    }

    #[test]
    fn empty_sub_block_stream_is_terminator_only() {
        let mut buf = BytesMut::new();
        write_sub_blocks(&[], &mut buf);
        assert_eq!(buf.as_ref(), &[0]);
    }

    #[test]
    fn two_by_two_stream_layout() {
        let palette = Palette::from_rgb([[255, 0, 0], [0, 255, 0]]).unwrap();
        let bytes = GifWriter::new(2, 2)
            .image(ImageDescriptor::new(0, 0, 2, 2), Some(&palette), &[0, 1, 0, 1], 2)
            .unwrap()
            .finish();

        let mut expected = b"GIF89a".to_vec();
        expected.extend_from_slice(&[2, 0, 2, 0, 0, 0, 0]);
        expected.extend_from_slice(&[0x2C, 0, 0, 0, 0, 2, 0, 2, 0, 0x80]);
        expected.extend_from_slice(&[255, 0, 0, 0, 255, 0]);
        expected.push(2);
        expected.extend_from_slice(&[2, 0x44, 0x5C, 0]);
        expected.push(0x3B);
        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn extension_envelopes() {
        let bytes = GifWriter::new(1, 1)
            .graphic_control(GraphicControl::default().with_delay(5).with_transparent(1))
            .loop_count(0)
            .into_bytes();
        let tail = &bytes[13..];
        assert_eq!(&tail[..8], &[0x21, 0xF9, 4, 0x01, 5, 0, 1, 0]);
        assert_eq!(&tail[8..11], &[0x21, 0xFF, 11]);
        assert_eq!(&tail[11..22], b"NETSCAPE2.0");
        assert_eq!(&tail[22..], &[3, 1, 0, 0, 0]);
    }
}
