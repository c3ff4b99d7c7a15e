use std::time::Duration;

use bytes::{BufMut, BytesMut};

/// Top-level tag introducing an image block.
pub const IMAGE_TAG: u8 = 0x2C;
/// Top-level tag introducing an extension block.
pub const EXTENSION_TAG: u8 = 0x21;
/// Top-level tag ending the stream.
pub const TRAILER_TAG: u8 = 0x3B;

/// Identifier of the application extension that carries a loop count.
pub const NETSCAPE_IDENTIFIER: [u8; 8] = *b"NETSCAPE";

/// Size byte that must precede a graphic control payload.
pub const GRAPHIC_CONTROL_SIZE: u8 = 4;
/// Size byte that must precede an application extension header.
pub const APPLICATION_SIZE: u8 = 11;

/// Byte length of a palette announced by a 3-bit size exponent.
pub const fn palette_byte_len(exponent: u8) -> usize {
    3 * (1usize << ((exponent & 0x07) + 1))
}

/// A top-level block tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Image,
    Extension,
    Trailer,
}

impl BlockTag {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            IMAGE_TAG => Some(Self::Image),
            EXTENSION_TAG => Some(Self::Extension),
            TRAILER_TAG => Some(Self::Trailer),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Image => IMAGE_TAG,
            Self::Extension => EXTENSION_TAG,
            Self::Trailer => TRAILER_TAG,
        }
    }
}

/// The label byte following an extension tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionLabel {
    GraphicControl,
    Comment,
    PlainText,
    Application,
    Other(u8),
}

impl From<u8> for ExtensionLabel {
    fn from(byte: u8) -> Self {
        match byte {
            0xF9 => Self::GraphicControl,
            0xFE => Self::Comment,
            0x01 => Self::PlainText,
            0xFF => Self::Application,
            other => Self::Other(other),
        }
    }
}

impl From<ExtensionLabel> for u8 {
    fn from(label: ExtensionLabel) -> Self {
        match label {
            ExtensionLabel::GraphicControl => 0xF9,
            ExtensionLabel::Comment => 0xFE,
            ExtensionLabel::PlainText => 0x01,
            ExtensionLabel::Application => 0xFF,
            ExtensionLabel::Other(other) => other,
        }
    }
}

/// Stream header: 3-byte signature and 3-byte version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub signature: [u8; 3],
    pub version: [u8; 3],
}

impl Header {
    pub const LEN: usize = 6;

    pub fn gif89a() -> Self {
        Self {
            signature: *b"GIF",
            version: *b"89a",
        }
    }

    pub fn parse(raw: &[u8; Self::LEN]) -> Self {
        Self {
            signature: [raw[0], raw[1], raw[2]],
            version: [raw[3], raw[4], raw[5]],
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.signature);
        dst.put_slice(&self.version);
    }

    /// True when the signature reads `GIF`.
    pub fn has_gif_signature(&self) -> bool {
        &self.signature == b"GIF"
    }

    /// Version as text, lossy for non-ASCII bytes.
    pub fn version_str(&self) -> String {
        String::from_utf8_lossy(&self.version).into_owned()
    }
}

/// Logical screen descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenDescriptor {
    pub width: u16,
    pub height: u16,
    /// Bit 7: global palette present. Bits 0-2: palette size exponent.
    pub packed: u8,
    pub background_index: u8,
    pub pixel_aspect: u8,
}

impl ScreenDescriptor {
    pub const LEN: usize = 7;

    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Mark a global palette of `2^(exponent+1)` entries as present.
    pub fn with_global_palette(mut self, exponent: u8) -> Self {
        self.packed = (self.packed & 0x70) | 0x80 | (exponent & 0x07);
        self
    }

    pub fn parse(raw: &[u8; Self::LEN]) -> Self {
        Self {
            width: u16::from_le_bytes([raw[0], raw[1]]),
            height: u16::from_le_bytes([raw[2], raw[3]]),
            packed: raw[4],
            background_index: raw[5],
            pixel_aspect: raw[6],
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u16_le(self.width);
        dst.put_u16_le(self.height);
        dst.put_u8(self.packed);
        dst.put_u8(self.background_index);
        dst.put_u8(self.pixel_aspect);
    }

    /// Byte length of the global palette that follows, if any.
    pub fn global_palette_len(&self) -> Option<usize> {
        (self.packed & 0x80 != 0).then(|| palette_byte_len(self.packed))
    }
}

/// Graphic control payload, valid for the next image block only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphicControl {
    /// Bits 2-4: disposal method. Bit 0: transparency enabled.
    pub packed: u8,
    pub delay_hundredths: u16,
    pub transparent_index: u8,
}

impl GraphicControl {
    pub const LEN: usize = 4;

    pub fn with_delay(mut self, hundredths: u16) -> Self {
        self.delay_hundredths = hundredths;
        self
    }

    pub fn with_transparent(mut self, index: u8) -> Self {
        self.packed |= 0x01;
        self.transparent_index = index;
        self
    }

    pub fn parse(raw: &[u8; Self::LEN]) -> Self {
        Self {
            packed: raw[0],
            delay_hundredths: u16::from_le_bytes([raw[1], raw[2]]),
            transparent_index: raw[3],
        }
    }

    /// Encode the payload without its size/terminator envelope.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.packed);
        dst.put_u16_le(self.delay_hundredths);
        dst.put_u8(self.transparent_index);
    }

    /// Transparent index, when the transparency flag is set.
    pub fn transparency(&self) -> Option<u8> {
        (self.packed & 0x01 != 0).then_some(self.transparent_index)
    }

    pub fn disposal_method(&self) -> u8 {
        (self.packed >> 2) & 0x07
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.delay_hundredths) * 10)
    }
}

/// Image descriptor placing one frame on the logical screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageDescriptor {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    /// Bit 7: local palette present. Bit 6: interlaced. Bits 0-2: exponent.
    pub packed: u8,
}

impl ImageDescriptor {
    pub const LEN: usize = 9;

    pub fn new(left: u16, top: u16, width: u16, height: u16) -> Self {
        Self {
            left,
            top,
            width,
            height,
            packed: 0,
        }
    }

    pub fn with_local_palette(mut self, exponent: u8) -> Self {
        self.packed = (self.packed & 0x78) | 0x80 | (exponent & 0x07);
        self
    }

    pub fn parse(raw: &[u8; Self::LEN]) -> Self {
        Self {
            left: u16::from_le_bytes([raw[0], raw[1]]),
            top: u16::from_le_bytes([raw[2], raw[3]]),
            width: u16::from_le_bytes([raw[4], raw[5]]),
            height: u16::from_le_bytes([raw[6], raw[7]]),
            packed: raw[8],
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u16_le(self.left);
        dst.put_u16_le(self.top);
        dst.put_u16_le(self.width);
        dst.put_u16_le(self.height);
        dst.put_u8(self.packed);
    }

    /// Byte length of the local palette that follows, if any.
    pub fn local_palette_len(&self) -> Option<usize> {
        (self.packed & 0x80 != 0).then(|| palette_byte_len(self.packed))
    }

    pub fn is_interlaced(&self) -> bool {
        self.packed & 0x40 != 0
    }

    /// Number of pixels the frame covers.
    pub fn area(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

/// Application extension header (identifier plus authentication code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationExtension {
    pub identifier: [u8; 8],
    pub auth_code: [u8; 3],
}

impl ApplicationExtension {
    pub const LEN: usize = 11;

    pub fn netscape() -> Self {
        Self {
            identifier: NETSCAPE_IDENTIFIER,
            auth_code: *b"2.0",
        }
    }

    pub fn parse(raw: &[u8; Self::LEN]) -> Self {
        let mut identifier = [0u8; 8];
        identifier.copy_from_slice(&raw[..8]);
        let mut auth_code = [0u8; 3];
        auth_code.copy_from_slice(&raw[8..]);
        Self {
            identifier,
            auth_code,
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.identifier);
        dst.put_slice(&self.auth_code);
    }

    /// Loop count carried in `data` (0 means forever).
    ///
    /// Only the NETSCAPE extension with a leading sub-block id of 1 carries
    /// one.
    pub fn loop_count(&self, data: &[u8]) -> Option<u16> {
        if self.identifier != NETSCAPE_IDENTIFIER {
            return None;
        }
        match data {
            [1, lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_length_from_exponent() {
        assert_eq!(palette_byte_len(0), 6);
        assert_eq!(palette_byte_len(7), 768);
        // Only the low three bits count.
        assert_eq!(palette_byte_len(0x81), 12);
    }

    #[test]
    fn screen_descriptor_fields() {
        let screen = ScreenDescriptor::parse(&[0x0A, 0x00, 0x0A, 0x00, 0x91, 0x02, 0x00]);
        assert_eq!(screen.width, 10);
        assert_eq!(screen.height, 10);
        assert_eq!(screen.global_palette_len(), Some(12));
        assert_eq!(screen.background_index, 2);

        let bare = ScreenDescriptor::new(2, 2);
        assert_eq!(bare.global_palette_len(), None);
    }

    #[test]
    fn graphic_control_flags() {
        let control = GraphicControl::parse(&[0x09, 0x0A, 0x00, 0x03]);
        assert_eq!(control.transparency(), Some(3));
        assert_eq!(control.disposal_method(), 2);
        assert_eq!(control.delay(), Duration::from_millis(100));

        let opaque = GraphicControl::parse(&[0x00, 0x00, 0x00, 0x03]);
        assert_eq!(opaque.transparency(), None);
    }

    #[test]
    fn image_descriptor_layout() {
        let raw = [1, 0, 2, 0, 3, 0, 4, 0, 0xC2];
        let desc = ImageDescriptor::parse(&raw);
        assert_eq!((desc.left, desc.top, desc.width, desc.height), (1, 2, 3, 4));
        assert_eq!(desc.local_palette_len(), Some(24));
        assert!(desc.is_interlaced());
        assert_eq!(desc.area(), 12);

        let mut buf = BytesMut::new();
        desc.encode(&mut buf);
        assert_eq!(buf.as_ref(), &raw);
    }

    #[test]
    fn netscape_loop_count() {
        let app = ApplicationExtension::netscape();
        assert_eq!(app.loop_count(&[1, 0x05, 0x01]), Some(0x0105));
        assert_eq!(app.loop_count(&[1, 0, 0]), Some(0));
        assert_eq!(app.loop_count(&[2, 5, 0]), None);
        assert_eq!(app.loop_count(&[1]), None);

        let other = ApplicationExtension {
            identifier: *b"XMP Data",
            auth_code: *b"XMP",
        };
        assert_eq!(other.loop_count(&[1, 5, 0]), None);
    }

    #[test]
    fn tags_and_labels() {
        assert_eq!(BlockTag::from_byte(0x2C), Some(BlockTag::Image));
        assert_eq!(BlockTag::from_byte(0x3B), Some(BlockTag::Trailer));
        assert_eq!(BlockTag::from_byte(0x00), None);
        assert_eq!(ExtensionLabel::from(0xF9), ExtensionLabel::GraphicControl);
        assert_eq!(ExtensionLabel::from(0x42), ExtensionLabel::Other(0x42));
        assert_eq!(u8::from(ExtensionLabel::Comment), 0xFE);
    }
}
