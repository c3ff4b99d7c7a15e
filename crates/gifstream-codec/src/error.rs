/// Errors produced while decoding or encoding GIF data.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The LZW stream contained a code that is neither defined nor the next
    /// code to be defined.
    #[error("invalid LZW code {code} (next code {next_code})")]
    InvalidCode { code: u16, next_code: u16 },

    /// The minimum code size byte is outside the supported range.
    #[error("invalid LZW minimum code size {0} (expected 2..=8)")]
    InvalidCodeSize(u8),

    /// An index handed to the encoder does not fit the minimum code size.
    #[error("index {index} out of range for minimum code size {min_code_size}")]
    IndexOutOfRange { index: u8, min_code_size: u8 },

    /// Palette bytes are not a whole number of RGB triplets.
    #[error("malformed palette ({len} bytes is not a multiple of 3)")]
    MalformedPalette { len: usize },

    /// A palette holds more entries than an 8-bit index can address.
    #[error("palette too large ({entries} entries, max 256)")]
    PaletteTooLarge { entries: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;
