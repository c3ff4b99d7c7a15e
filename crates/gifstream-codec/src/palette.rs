use bytes::{BufMut, BytesMut};

use crate::error::{CodecError, Result};

/// Largest palette an 8-bit index can address.
pub const MAX_ENTRIES: usize = 256;

/// An ordered table of RGB colours.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    colors: Vec<[u8; 3]>,
}

impl Palette {
    /// Build a palette from raw RGB triplets.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() % 3 != 0 {
            return Err(CodecError::MalformedPalette { len: raw.len() });
        }
        Self::from_rgb(raw.chunks_exact(3).map(|rgb| [rgb[0], rgb[1], rgb[2]]))
    }

    pub fn from_rgb(colors: impl IntoIterator<Item = [u8; 3]>) -> Result<Self> {
        let colors: Vec<[u8; 3]> = colors.into_iter().collect();
        if colors.len() > MAX_ENTRIES {
            return Err(CodecError::PaletteTooLarge {
                entries: colors.len(),
            });
        }
        Ok(Self { colors })
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn rgb(&self, index: u8) -> Option<[u8; 3]> {
        self.colors.get(usize::from(index)).copied()
    }

    /// Opaque ARGB for `index`, or `None` when it is outside the table.
    pub fn argb(&self, index: u8) -> Option<u32> {
        self.rgb(index)
            .map(|[r, g, b]| 0xFF00_0000 | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b))
    }

    /// Smallest 3-bit size exponent whose table holds every entry.
    pub fn size_exponent(&self) -> u8 {
        let mut exponent = 0u8;
        while (1usize << (exponent + 1)) < self.colors.len() && exponent < 7 {
            exponent += 1;
        }
        exponent
    }

    /// Write the table padded with black to `2^(size_exponent+1)` entries.
    pub fn encode(&self, dst: &mut BytesMut) {
        let entries = 1usize << (self.size_exponent() + 1);
        for index in 0..entries {
            let rgb = self.colors.get(index).copied().unwrap_or_default();
            dst.put_slice(&rgb);
        }
    }
}
