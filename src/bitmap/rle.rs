//! RLE sprite codec
//!
//! An RLE sprite payload is a 10-byte big-endian header (`bits: i16`,
//! `width: u16`, `height: u16`, `data_size: u32`) followed by run records.
//! The count width depends on the depth: one signed byte at 8 bits, a
//! little-endian `i16` at 15/16 bits and a little-endian `i32` above. A
//! positive count is followed by that many literal pixels, a negative count
//! skips that many transparent ("zero") pixels, and every row ends with a
//! depth-specific end-of-line record.

use log::warn;

use crate::common::{bytes_per_pixel, read_u16_be, read_u32_be, TRANSPARENT_COLOR_15, TRANSPARENT_COLOR_16};
use crate::{DatError, Result};

/// Size of the RLE sprite header
pub const RLE_HEADER_SIZE: usize = 10;

/// End-of-line record at 15/16 bits (0xF81F read as `i16`)
pub const RLE_EOL_MARKER_16: i16 = TRANSPARENT_COLOR_16 as i16;

/// End-of-line record at 24/32 bits
pub const RLE_EOL_MARKER_32: i32 = 0x00FF_00FF;

/// Longest literal run at 8 bits
const MAX_LITERAL_8: usize = 127;
/// Longest zero run at 8 bits
const MAX_ZERO_8: usize = 128;
const MAX_LITERAL_16: usize = i16::MAX as usize;
const MAX_ZERO_16: usize = 32768;
const MAX_RUN_32: usize = i32::MAX as usize;

/// The pixel written for transparent runs, in stored byte order
pub fn zero_pixel(bits: i32) -> &'static [u8] {
    match bits {
        8 => &[0],
        15 => &[0x3F, 0xF8],
        16 => &[0x1F, 0xF8],
        -32 => &[0xFF, 0x00, 0xFF, 0x00],
        _ => &[0xFF, 0x00, 0xFF],
    }
}

/// True if `pixel` is the transparent colour of its depth
#[inline]
pub fn is_zero_pixel(bits: i32, pixel: &[u8]) -> bool {
    match bits {
        15 => u16::from_le_bytes([pixel[0], pixel[1]]) == TRANSPARENT_COLOR_15,
        _ => pixel == zero_pixel(bits),
    }
}

/// A decoded RLE sprite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RleSprite {
    /// Colour depth
    pub bits: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
    /// Packed pixels
    pub data: Vec<u8>,
    /// False if the input ended before every pixel was filled
    pub complete: bool,
}

enum Record {
    EndOfLine,
    Zero(usize),
    Literal(usize),
}

fn read_record(buf: &[u8], pos: &mut usize, bits: i32) -> Option<Record> {
    let count: i64 = match bits {
        8 => {
            let c = *buf.get(*pos)? as i8;
            *pos += 1;
            if c == 0 {
                return Some(Record::EndOfLine);
            }
            c as i64
        }
        15 | 16 => {
            let b = buf.get(*pos..*pos + 2)?;
            *pos += 2;
            let c = i16::from_le_bytes([b[0], b[1]]);
            if c == RLE_EOL_MARKER_16 {
                return Some(Record::EndOfLine);
            }
            c as i64
        }
        _ => {
            let b = buf.get(*pos..*pos + 4)?;
            *pos += 4;
            let c = i32::from_le_bytes([b[0], b[1], b[2], b[3]]);
            if c == RLE_EOL_MARKER_32 {
                return Some(Record::EndOfLine);
            }
            c as i64
        }
    };

    Some(if count < 0 {
        Record::Zero(count.unsigned_abs() as usize)
    } else {
        Record::Literal(count as usize)
    })
}

/// Decode an RLE sprite payload
///
/// Runs that would write past the last pixel are a format error. Input that
/// ends early is not: the sprite is returned with `complete == false`.
pub fn decode(buf: &[u8]) -> Result<RleSprite> {
    if buf.len() < RLE_HEADER_SIZE {
        return Err(DatError::UnexpectedEof);
    }
    let bits = read_u16_be(buf, 0)? as i16 as i32;
    let width = read_u16_be(buf, 2)? as i32;
    let height = read_u16_be(buf, 4)? as i32;
    let _data_size = read_u32_be(buf, 6)?;

    let bpp = bytes_per_pixel(bits)?;
    if width <= 0 || height <= 0 {
        return Err(DatError::Format(format!(
            "RLE sprite has invalid size {width}x{height}"
        )));
    }

    let total = width as usize * height as usize;

    // grown as records arrive and padded once the input runs out
    let mut data = Vec::with_capacity((total * bpp).min(buf.len() - RLE_HEADER_SIZE));
    let zero = zero_pixel(bits);
    let mut pos = RLE_HEADER_SIZE;
    let mut pixel = 0usize;
    let mut complete = true;

    while pixel < total {
        let Some(record) = read_record(buf, &mut pos, bits) else {
            complete = false;
            break;
        };
        match record {
            Record::EndOfLine => {}
            Record::Zero(n) => {
                if pixel + n > total {
                    return Err(DatError::Format(format!(
                        "zero run of {n} pixels overflows the sprite at pixel {pixel}"
                    )));
                }
                for _ in 0..n {
                    data.extend_from_slice(zero);
                }
                pixel += n;
            }
            Record::Literal(n) => {
                if pixel + n > total {
                    return Err(DatError::Format(format!(
                        "literal run of {n} pixels overflows the sprite at pixel {pixel}"
                    )));
                }
                let bytes = n * bpp;
                let Some(src) = buf.get(pos..pos + bytes) else {
                    // keep the whole pixels that are still there
                    let available = (buf.len() - pos) / bpp * bpp;
                    data.extend_from_slice(&buf[pos..pos + available]);
                    complete = false;
                    break;
                };
                data.extend_from_slice(src);
                pos += bytes;
                pixel += n;
            }
        }
    }
    data.resize(total * bpp, 0);

    if !complete {
        warn!(
            "RLE sprite {}x{} ({} bit) is truncated; returning partial data",
            width, height, bits
        );
    }

    Ok(RleSprite {
        bits,
        width,
        height,
        data,
        complete,
    })
}

fn push_count(out: &mut Vec<u8>, bits: i32, count: i64) {
    match bits {
        8 => out.push(count as i8 as u8),
        15 | 16 => out.extend_from_slice(&(count as i16).to_le_bytes()),
        _ => out.extend_from_slice(&(count as i32).to_le_bytes()),
    }
}

fn push_eol(out: &mut Vec<u8>, bits: i32) {
    match bits {
        8 => out.push(0),
        15 | 16 => out.extend_from_slice(&RLE_EOL_MARKER_16.to_le_bytes()),
        _ => out.extend_from_slice(&RLE_EOL_MARKER_32.to_le_bytes()),
    }
}

fn flush_zero(out: &mut Vec<u8>, bits: i32, mut run: usize) {
    let limit = match bits {
        8 => MAX_ZERO_8,
        15 | 16 => MAX_ZERO_16,
        _ => MAX_RUN_32,
    };
    while run > 0 {
        let mut n = run.min(limit);
        if matches!(bits, 15 | 16) && -(n as i64) == RLE_EOL_MARKER_16 as i64 {
            // a run of exactly 2017 would read back as end-of-line
            n -= 1;
        }
        push_count(out, bits, -(n as i64));
        run -= n;
    }
}

fn flush_literal(out: &mut Vec<u8>, bits: i32, pixels: &[u8], bpp: usize) -> usize {
    let limit = match bits {
        8 => MAX_LITERAL_8,
        15 | 16 => MAX_LITERAL_16,
        _ => MAX_RUN_32,
    };
    for chunk in pixels.chunks(limit * bpp) {
        push_count(out, bits, (chunk.len() / bpp) as i64);
        out.extend_from_slice(chunk);
    }
    pixels.len()
}

/// Encode packed pixels as an RLE sprite payload
///
/// The header's size field receives the number of literal pixel bytes.
pub fn encode(bits: i32, width: i32, height: i32, data: &[u8]) -> Result<Vec<u8>> {
    let bpp = bytes_per_pixel(bits)?;
    let (w, h) = (width.max(0) as usize, height.max(0) as usize);
    if data.len() != w * h * bpp {
        return Err(DatError::SizeMismatch {
            expected: w * h * bpp,
            actual: data.len(),
        });
    }

    let mut out = Vec::with_capacity(RLE_HEADER_SIZE + data.len());
    out.extend_from_slice(&(bits as i16).to_be_bytes());
    out.extend_from_slice(&(width as u16).to_be_bytes());
    out.extend_from_slice(&(height as u16).to_be_bytes());
    out.extend_from_slice(&[0u8; 4]);

    let mut literal_bytes = 0usize;
    for row in data.chunks_exact(w * bpp) {
        let mut x = 0;
        while x < w {
            let zero = is_zero_pixel(bits, &row[x * bpp..(x + 1) * bpp]);
            let mut end = x + 1;
            while end < w && is_zero_pixel(bits, &row[end * bpp..(end + 1) * bpp]) == zero {
                end += 1;
            }
            if zero {
                flush_zero(&mut out, bits, end - x);
            } else {
                literal_bytes += flush_literal(&mut out, bits, &row[x * bpp..end * bpp], bpp);
            }
            x = end;
        }
        push_eol(&mut out, bits);
    }

    out[6..10].copy_from_slice(&(literal_bytes as u32).to_be_bytes());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_corner_block() {
        // 4x4, 8-bit, 2x2 opaque block in the bottom-right corner
        let mut data = vec![0u8; 16];
        for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3)] {
            data[y * 4 + x] = 7;
        }
        let encoded = encode(8, 4, 4, &data).unwrap();
        assert_eq!(
            encoded,
            vec![
                0, 8, 0, 4, 0, 4, 0, 0, 0, 4, // header, 4 literal bytes
                0xFC, 0, // row 0: zero run of 4
                0xFC, 0, // row 1
                0xFE, 2, 7, 7, 0, // row 2: 2 zero, 2 literal
                0xFE, 2, 7, 7, 0, // row 3
            ]
        );
        let decoded = decode(&encoded).unwrap();
        assert!(decoded.complete);
        assert_eq!(decoded.data, data);
    }

    #[test]
    fn test_8_bit_run_limits() {
        let mut data = vec![0u8; 300];
        data[200..300].fill(3);
        let encoded = encode(8, 300, 1, &data).unwrap();
        // zero runs of 128, 72; literal 100
        assert_eq!(encoded[10], (-128i8) as u8);
        assert_eq!(encoded[11], (-72i8) as u8);
        assert_eq!(encoded[12], 100);
        assert_eq!(decode(&encoded).unwrap().data, data);

        let solid = vec![9u8; 254];
        let encoded = encode(8, 254, 1, &solid).unwrap();
        assert_eq!(encoded[10], 127);
        assert_eq!(encoded[10 + 128], 127);
        assert_eq!(decode(&encoded).unwrap().data, solid);
    }

    #[test]
    fn test_16_bit_eol_collision_avoided() {
        let width = 2017;
        let data: Vec<u8> = (0..width).flat_map(|_| [0x1F, 0xF8]).collect();
        let encoded = encode(16, width as i32, 1, &data).unwrap();
        let first = i16::from_le_bytes([encoded[10], encoded[11]]);
        assert_eq!(first, -2016);
        assert_eq!(decode(&encoded).unwrap().data, data);
    }

    #[test]
    fn test_15_bit_zero_pixel() {
        // 0xF83F is transparent, 0xF81F is an ordinary colour at 15 bits
        let data = [0x3F, 0xF8, 0x1F, 0xF8];
        let encoded = encode(15, 2, 1, &data).unwrap();
        assert_eq!(&encoded[10..12], &(-1i16).to_le_bytes());
        assert_eq!(&encoded[12..14], &1i16.to_le_bytes());
        assert_eq!(decode(&encoded).unwrap().data, data);
    }

    #[test]
    fn test_32_bit_records() {
        let data = [0xFF, 0x00, 0xFF, 1, 2, 3];
        let encoded = encode(32, 2, 1, &data).unwrap();
        assert_eq!(&encoded[10..14], &(-1i32).to_le_bytes());
        assert_eq!(&encoded[14..18], &1i32.to_le_bytes());
        assert_eq!(&encoded[18..21], &[1, 2, 3]);
        assert_eq!(&encoded[21..25], &RLE_EOL_MARKER_32.to_le_bytes());
        assert_eq!(u32::from_be_bytes([encoded[6], encoded[7], encoded[8], encoded[9]]), 3);
    }

    #[test]
    fn test_truncated_input_is_partial() {
        let data = vec![5u8; 8];
        let mut encoded = encode(8, 4, 2, &data).unwrap();
        encoded.truncate(encoded.len() - 4);
        let decoded = decode(&encoded).unwrap();
        assert!(!decoded.complete);
        assert_eq!(&decoded.data[..4], &[5, 5, 5, 5]);
    }

    #[test]
    fn test_input_ending_rows_early_is_partial() {
        // 100x100 header, then a single 5-pixel literal
        let buf = [0, 8, 0, 100, 0, 100, 0, 0, 0, 5, 5, 1, 2, 3, 4, 5];
        let decoded = decode(&buf).unwrap();
        assert!(!decoded.complete);
        assert_eq!(decoded.data.len(), 100 * 100);
        assert_eq!(&decoded.data[..5], &[1, 2, 3, 4, 5]);
        assert!(decoded.data[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_rows_without_end_of_line_records() {
        // 1x10 at 32 bits: one zero run covers every row
        let mut buf = vec![0, 32, 0, 1, 0, 10, 0, 0, 0, 0];
        buf.extend_from_slice(&(-10i32).to_le_bytes());
        let decoded = decode(&buf).unwrap();
        assert!(decoded.complete);
        assert_eq!(decoded.data, [0xFF, 0x00, 0xFF].repeat(10));

        // 3x2 at 8 bits: a literal spanning the row break
        let buf = [0, 8, 0, 3, 0, 2, 0, 0, 0, 4, 4, 1, 2, 3, 4, 0xFE];
        let decoded = decode(&buf).unwrap();
        assert!(decoded.complete);
        assert_eq!(decoded.data, [1, 2, 3, 4, 0, 0]);
    }

    #[test]
    fn test_overflowing_run_is_error() {
        let mut buf = vec![0, 8, 0, 2, 0, 1, 0, 0, 0, 0];
        buf.push((-5i8) as u8);
        assert!(matches!(decode(&buf), Err(DatError::Format(_))));
    }

    #[test]
    fn test_invalid_header() {
        assert!(decode(&[0, 8, 0, 1]).is_err());
        let bad_depth = [0, 12, 0, 1, 0, 1, 0, 0, 0, 0, 0];
        assert!(matches!(decode(&bad_depth), Err(DatError::InvalidBitDepth(12))));
        let zero_width = [0, 8, 0, 0, 0, 1, 0, 0, 0, 0, 0];
        assert!(decode(&zero_width).is_err());
    }
}
