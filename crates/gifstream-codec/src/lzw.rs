//! Variable-width LZW as used by GIF image data.
//!
//! Codes are packed least-significant-bit first across byte boundaries. The
//! code width starts at `min_code_size + 1` and grows by one bit whenever the
//! dictionary fills the current width, up to [`MAX_CODE_WIDTH`].

use std::collections::HashMap;

use tracing::trace;

use crate::error::{CodecError, Result};

/// Widest code the format allows.
pub const MAX_CODE_WIDTH: u8 = 12;

/// Dictionary capacity at the widest code.
pub const MAX_CODES: u16 = 1 << MAX_CODE_WIDTH;

/// Smallest accepted minimum code size.
pub const MIN_CODE_SIZE: u8 = 2;
/// Largest accepted minimum code size.
pub const MAX_MIN_CODE_SIZE: u8 = 8;

const NO_PREFIX: u16 = u16::MAX;

/// Reads LSB-first codes of varying width from a byte slice.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Next `width`-bit code, or `None` if fewer than `width` bits remain.
    pub fn read(&mut self, width: u8) -> Option<u16> {
        let width = usize::from(width);
        if self.bit_pos + width > self.data.len() * 8 {
            return None;
        }

        let mut value = 0u32;
        let mut filled = 0usize;
        while filled < width {
            let byte = u32::from(self.data[self.bit_pos / 8]);
            let offset = self.bit_pos % 8;
            let take = (8 - offset).min(width - filled);
            let bits = (byte >> offset) & ((1 << take) - 1);
            value |= bits << filled;
            filled += take;
            self.bit_pos += take;
        }
        Some(value as u16)
    }

    /// Bits not yet consumed.
    pub fn remaining_bits(&self) -> usize {
        self.data.len() * 8 - self.bit_pos
    }
}

/// Packs LSB-first codes of varying width into bytes.
#[derive(Debug, Default)]
pub struct BitWriter {
    out: Vec<u8>,
    acc: u32,
    bits: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, code: u16, width: u8) {
        self.acc |= u32::from(code) << self.bits;
        self.bits += width;
        while self.bits >= 8 {
            self.out.push(self.acc as u8);
            self.acc >>= 8;
            self.bits -= 8;
        }
    }

    /// Flush the partial byte (zero-padded) and return the packed bytes.
    pub fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.out.push(self.acc as u8);
        }
        self.out
    }
}

fn check_code_size(min_code_size: u8) -> Result<()> {
    if (MIN_CODE_SIZE..=MAX_MIN_CODE_SIZE).contains(&min_code_size) {
        Ok(())
    } else {
        Err(CodecError::InvalidCodeSize(min_code_size))
    }
}

/// Decoder dictionary stored as prefix chains.
struct Table {
    prefix: Vec<u16>,
    suffix: Vec<u8>,
    first: Vec<u8>,
    len: Vec<u16>,
}

impl Table {
    fn new(clear: u16) -> Self {
        let size = usize::from(MAX_CODES);
        let mut table = Self {
            prefix: vec![NO_PREFIX; size],
            suffix: vec![0; size],
            first: vec![0; size],
            len: vec![0; size],
        };
        for code in 0..clear {
            let i = usize::from(code);
            table.suffix[i] = code as u8;
            table.first[i] = code as u8;
            table.len[i] = 1;
        }
        table
    }

    fn define(&mut self, code: u16, prefix: u16, suffix: u8) {
        let (i, p) = (usize::from(code), usize::from(prefix));
        self.prefix[i] = prefix;
        self.suffix[i] = suffix;
        self.first[i] = self.first[p];
        self.len[i] = self.len[p] + 1;
    }

    fn emit(&self, code: u16, out: &mut Vec<u8>) {
        let len = usize::from(self.len[usize::from(code)]);
        let start = out.len();
        out.resize(start + len, 0);

        let mut cursor = code;
        for slot in out[start..].iter_mut().rev() {
            let i = usize::from(cursor);
            *slot = self.suffix[i];
            cursor = self.prefix[i];
        }
    }
}

/// Decode one image's concatenated sub-block payload into colour indices.
///
/// Decoding stops at the end code, or quietly when the data runs out before
/// one; everything decoded up to that point is returned. An undefined code
/// fails the whole block.
pub fn decode(data: &[u8], min_code_size: u8) -> Result<Vec<u8>> {
    check_code_size(min_code_size)?;

    let clear = 1u16 << min_code_size;
    let end = clear + 1;
    let mut table = Table::new(clear);
    let mut width = min_code_size + 1;
    let mut next = clear + 2;
    let mut prev: Option<u16> = None;

    let mut reader = BitReader::new(data);
    let mut out = Vec::with_capacity(data.len() * 2);

    loop {
        let Some(code) = reader.read(width) else {
            trace!(decoded = out.len(), "lzw data ended without end code");
            break;
        };

        if code == clear {
            width = min_code_size + 1;
            next = clear + 2;
            prev = None;
            continue;
        }
        if code == end {
            break;
        }

        let Some(p) = prev else {
            if code >= clear {
                return Err(CodecError::InvalidCode {
                    code,
                    next_code: next,
                });
            }
            table.emit(code, &mut out);
            prev = Some(code);
            continue;
        };

        if code < next {
            table.emit(code, &mut out);
            if next < MAX_CODES {
                let first = table.first[usize::from(code)];
                table.define(next, p, first);
                next += 1;
            }
        } else if code == next && next < MAX_CODES {
            let first = table.first[usize::from(p)];
            table.define(next, p, first);
            table.emit(code, &mut out);
            next += 1;
        } else {
            return Err(CodecError::InvalidCode {
                code,
                next_code: next,
            });
        }

        if next == 1 << width && width < MAX_CODE_WIDTH {
            width += 1;
        }
        prev = Some(code);
    }

    Ok(out)
}

/// Tracks the code width a decoder will be using for each emitted code.
struct WidthTracker {
    min_code_size: u8,
    width: u8,
    next: u16,
    after_clear: bool,
}

impl WidthTracker {
    fn new(min_code_size: u8) -> Self {
        let mut tracker = Self {
            min_code_size,
            width: 0,
            next: 0,
            after_clear: true,
        };
        tracker.reset();
        tracker
    }

    fn reset(&mut self) {
        self.width = self.min_code_size + 1;
        self.next = (1 << self.min_code_size) + 2;
        self.after_clear = true;
    }

    fn emit(&mut self, writer: &mut BitWriter, code: u16) {
        writer.write(code, self.width);
        if !self.after_clear && self.next < MAX_CODES {
            self.next += 1;
            if self.next == 1 << self.width && self.width < MAX_CODE_WIDTH {
                self.width += 1;
            }
        }
        self.after_clear = false;
    }
}

/// Compress colour indices into an LZW payload readable by [`decode`].
///
/// The output starts with a clear code, ends with an end code, and inserts a
/// clear code whenever the dictionary fills.
pub fn encode(indices: &[u8], min_code_size: u8) -> Result<Vec<u8>> {
    check_code_size(min_code_size)?;

    let clear = 1u16 << min_code_size;
    let end = clear + 1;
    if let Some(&index) = indices.iter().find(|&&index| u16::from(index) >= clear) {
        return Err(CodecError::IndexOutOfRange {
            index,
            min_code_size,
        });
    }

    let mut writer = BitWriter::new();
    let mut widths = WidthTracker::new(min_code_size);
    let mut dict: HashMap<(u16, u8), u16> = HashMap::new();
    let mut next = clear + 2;

    writer.write(clear, widths.width);

    if let Some((&head, rest)) = indices.split_first() {
        let mut current = u16::from(head);
        for &index in rest {
            if let Some(&code) = dict.get(&(current, index)) {
                current = code;
                continue;
            }

            widths.emit(&mut writer, current);
            if next < MAX_CODES {
                dict.insert((current, index), next);
                next += 1;
            } else {
                writer.write(clear, widths.width);
                dict.clear();
                next = clear + 2;
                widths.reset();
            }
            current = u16::from(index);
        }
        widths.emit(&mut writer, current);
    }

    writer.write(end, widths.width);
    Ok(writer.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: [u8; 22] = [
        0x8C, 0x2D, 0x99, 0x87, 0x2A, 0x1C, 0xDC, 0x33, 0xA0, 0x02, 0x75, 0xEC, 0x95, 0xFA, 0xA8,
        0xDE, 0x60, 0x8C, 0x04, 0x91, 0x4C, 0x01,
    ];

    fn rows(pattern: &[&str]) -> Vec<u8> {
        pattern
            .iter()
            .flat_map(|row| row.bytes().map(|b| b - b'0'))
            .collect()
    }

    #[test]
    fn bit_reader_crosses_byte_boundaries() {
        let mut writer = BitWriter::new();
        let codes: Vec<(u16, u8)> = (2..=12u8)
            .map(|width| (0x0A5Bu16 >> (12 - width), width))
            .collect();
        for &(code, width) in &codes {
            writer.write(code, width);
        }
        let packed = writer.finish();

        let mut reader = BitReader::new(&packed);
        for &(code, width) in &codes {
            assert_eq!(reader.read(width), Some(code), "width {width}");
        }
        assert!(reader.remaining_bits() < 8);
    }

    #[test]
    fn bit_reader_round_trips_random_code_sequences() {
        let mut state = 0x9E37_79B9u32;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };

        for round in 0..200 {
            let len = 1 + (next() % 64) as usize;
            let codes: Vec<(u16, u8)> = (0..len)
                .map(|_| {
                    let width = 2 + (next() % 11) as u8;
                    let code = (next() & ((1 << width) - 1)) as u16;
                    (code, width)
                })
                .collect();

            let mut writer = BitWriter::new();
            for &(code, width) in &codes {
                writer.write(code, width);
            }
            let packed = writer.finish();
            let total_bits: usize = codes.iter().map(|&(_, width)| usize::from(width)).sum();
            assert_eq!(packed.len(), total_bits.div_ceil(8), "round {round}");

            let mut reader = BitReader::new(&packed);
            for (i, &(code, width)) in codes.iter().enumerate() {
                assert_eq!(reader.read(width), Some(code), "round {round}, code {i}");
            }
            assert!(reader.remaining_bits() < 8, "round {round}");
        }
    }

    #[test]
    fn bit_reader_reports_exhaustion() {
        let mut reader = BitReader::new(&[0xFF]);
        assert_eq!(reader.read(5), Some(0x1F));
        assert_eq!(reader.read(5), None);
        assert_eq!(reader.read(3), Some(0x07));
    }

    #[test]
    fn classic_sample_prefix() {
        let out = decode(&SAMPLE[..5], 2).unwrap();
        assert_eq!(out, rows(&["11111", "22222", "11111", "22222"]));
    }

    #[test]
    fn classic_sample_full_image() {
        let out = decode(&SAMPLE, 2).unwrap();
        let expected = rows(&[
            "1111122222",
            "1111122222",
            "1111122222",
            "1110000222",
            "1110000222",
            "2220000111",
            "2220000111",
            "2222211111",
            "2222211111",
            "2222211111",
        ]);
        assert_eq!(out, expected);
    }

    #[test]
    fn clear_code_resets_dictionary() {
        // clear, 0, 1 defines 6 as [0, 1]; after the second clear 6 is undefined
        let mut writer = BitWriter::new();
        for code in [4, 0, 1, 4, 6] {
            writer.write(code, 3);
        }
        let err = decode(&writer.finish(), 2).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidCode {
                code: 6,
                next_code: 6
            }
        ));
    }

    #[test]
    fn self_referential_code() {
        // clear, 1, 6 (=1,1), end
        let mut writer = BitWriter::new();
        for code in [4, 1, 6, 5] {
            writer.write(code, 3);
        }
        assert_eq!(decode(&writer.finish(), 2).unwrap(), vec![1, 1, 1]);
    }

    #[test]
    fn undefined_code_is_rejected() {
        let mut writer = BitWriter::new();
        for code in [4, 1, 7] {
            writer.write(code, 3);
        }
        let err = decode(&writer.finish(), 2).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidCode {
                code: 7,
                next_code: 6
            }
        ));
    }

    #[test]
    fn first_code_must_be_literal() {
        let mut writer = BitWriter::new();
        writer.write(4, 3);
        writer.write(6, 3);
        assert!(decode(&writer.finish(), 2).is_err());
    }

    #[test]
    fn rejects_bad_code_size() {
        assert!(matches!(
            decode(&[0], 1),
            Err(CodecError::InvalidCodeSize(1))
        ));
        assert!(matches!(
            decode(&[0], 9),
            Err(CodecError::InvalidCodeSize(9))
        ));
    }

    #[test]
    fn encoder_output_decodes() {
        let indices: Vec<u8> = (0..5000u32).map(|i| ((i * 7 + i / 13) % 4) as u8).collect();
        let packed = encode(&indices, 2).unwrap();
        assert_eq!(decode(&packed, 2).unwrap(), indices);
    }

    #[test]
    fn encoder_survives_dictionary_full() {
        // Pseudo-random bytes fill 4096 entries quickly.
        let mut state = 0x2545_F491u32;
        let indices: Vec<u8> = (0..40_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect();
        let packed = encode(&indices, 8).unwrap();
        assert_eq!(decode(&packed, 8).unwrap(), indices);
    }

    #[test]
    fn encoder_rejects_wide_index() {
        let err = encode(&[0, 4], 2).unwrap_err();
        assert!(matches!(
            err,
            CodecError::IndexOutOfRange {
                index: 4,
                min_code_size: 2
            }
        ));
    }

    #[test]
    fn empty_input_round_trips_to_empty() {
        let packed = encode(&[], 2).unwrap();
        assert!(decode(&packed, 2).unwrap().is_empty());
    }
}
