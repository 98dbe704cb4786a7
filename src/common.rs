//! Common types and constants for the Allegro DAT format
//!
//! This module defines the error type, the magic numbers of the packfile
//! envelope, the reserved sentinel colours and the pixel depth helpers
//! shared by the bitmap, font and archive codecs.

use thiserror::Error;

/// Error type for DAT packfile operations
#[derive(Debug, Error)]
pub enum DatError {
    /// Malformed input that cannot be decoded
    #[error("Invalid format: {0}")]
    Format(String),

    /// Magic number did not match any known value
    #[error("Invalid magic number: 0x{0:08x}")]
    InvalidMagic(u32),

    /// Decoded byte count differs from the expected byte count
    #[error("Size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Expected number of bytes
        expected: usize,
        /// Actual number of bytes
        actual: usize,
    },

    /// Unexpected end of input
    #[error("Unexpected end of input")]
    UnexpectedEof,

    /// Unsupported bitmap colour depth
    #[error("Invalid bit depth: {0}")]
    InvalidBitDepth(i32),

    /// Unsupported font format discriminator
    #[error("Invalid font format: {0}")]
    InvalidFontFormat(i16),

    /// Invalid data that is well-formed but semantically wrong
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for DAT operations
pub type Result<T> = std::result::Result<T, DatError>;

/// Outer magic of a compressed packfile ("slh!")
pub const F_PACK_MAGIC: u32 = 0x736c_6821;

/// Outer magic of an uncompressed packfile ("slh.")
pub const F_NOPACK_MAGIC: u32 = 0x736c_682e;

/// Inner magic of the datafile payload ("ALL.")
pub const DAT_MAGIC: u32 = 0x414c_4c2e;

/// Extra mask applied to the outer magic by new-format encryption
pub const NEW_FORMAT_MASK: u32 = 42;

/// Transparent colour in true-colour images (magenta)
pub const TRANSPARENT_COLOR: [u8; 3] = [255, 0, 255];

/// Separator colour between font glyph cells (yellow)
pub const SEPARATOR_COLOR: [u8; 3] = [255, 255, 0];

/// Boundary colour used by the character region finder (cyan)
pub const BOUNDARY_COLOR: [u8; 3] = [0, 255, 255];

/// Palette index reserved for transparency
pub const TRANSPARENT_INDEX: u8 = 0;

/// Palette index reserved for glyph separators
pub const SEPARATOR_INDEX: u8 = 255;

/// Transparent pixel in 16-bit (RGB565) images
pub const TRANSPARENT_COLOR_16: u16 = 0xf81f;

/// Transparent pixel in 15-bit images, bit 5 included
pub const TRANSPARENT_COLOR_15: u16 = 0xf83f;

/// Substitute for an opaque pixel that would collide with the 15/16-bit sentinel
pub const REFERENCE_COLOR_1516: u16 = 0xf85f;

/// Fixed legacy bit of every 15-bit pixel
pub const HICOLOR_15_BIT: u16 = 0x20;

/// Returns the number of bytes per pixel for a bitmap colour depth
///
/// # Arguments
/// * `bits` - One of 8, 15, 16, 24, 32 or -32
///
/// # Returns
/// The pixel stride, or an error for unknown depths
pub fn bytes_per_pixel(bits: i32) -> Result<usize> {
    match bits {
        8 => Ok(1),
        15 | 16 => Ok(2),
        24 | 32 => Ok(3),
        -32 => Ok(4),
        _ => Err(DatError::InvalidBitDepth(bits)),
    }
}

/// Returns true if `bits` is a colour depth the bitmap codec understands
pub fn is_valid_depth(bits: i32) -> bool {
    bytes_per_pixel(bits).is_ok()
}

pub(crate) fn read_u32_be(buf: &[u8], pos: usize) -> Result<u32> {
    let bytes = buf.get(pos..pos + 4).ok_or(DatError::UnexpectedEof)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn read_u16_be(buf: &[u8], pos: usize) -> Result<u16> {
    let bytes = buf.get(pos..pos + 2).ok_or(DatError::UnexpectedEof)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn read_u16_le(buf: &[u8], pos: usize) -> Result<u16> {
    let bytes = buf.get(pos..pos + 2).ok_or(DatError::UnexpectedEof)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn read_u32_le(buf: &[u8], pos: usize) -> Result<u32> {
    let bytes = buf.get(pos..pos + 4).ok_or(DatError::UnexpectedEof)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_pixel() {
        assert_eq!(bytes_per_pixel(8).unwrap(), 1);
        assert_eq!(bytes_per_pixel(15).unwrap(), 2);
        assert_eq!(bytes_per_pixel(16).unwrap(), 2);
        assert_eq!(bytes_per_pixel(24).unwrap(), 3);
        assert_eq!(bytes_per_pixel(32).unwrap(), 3);
        assert_eq!(bytes_per_pixel(-32).unwrap(), 4);
        assert!(bytes_per_pixel(12).is_err());
        assert!(!is_valid_depth(0));
    }

    #[test]
    fn test_magic_constants() {
        assert_eq!(&F_PACK_MAGIC.to_be_bytes(), b"slh!");
        assert_eq!(&F_NOPACK_MAGIC.to_be_bytes(), b"slh.");
        assert_eq!(&DAT_MAGIC.to_be_bytes(), b"ALL.");
    }

    #[test]
    fn test_readers() {
        let buf = [0x12, 0x34, 0x56, 0x78];
        assert_eq!(read_u32_be(&buf, 0).unwrap(), 0x1234_5678);
        assert_eq!(read_u32_le(&buf, 0).unwrap(), 0x7856_3412);
        assert_eq!(read_u16_be(&buf, 2).unwrap(), 0x5678);
        assert_eq!(read_u16_le(&buf, 2).unwrap(), 0x7856);
        assert!(matches!(read_u32_be(&buf, 1), Err(DatError::UnexpectedEof)));
    }
}
