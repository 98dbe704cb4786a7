//! Allegro LZSS compression
//!
//! This module implements the sliding-window LZSS scheme Allegro uses for
//! packed datafiles. The stream is a sequence of groups: one flag byte
//! (least significant bit first, set = literal) followed by up to eight
//! items. A literal is one byte; a match is two bytes holding a 12-bit
//! window position and a 4-bit length. The window starts zero-filled with
//! the write cursor at [`INITIAL_POSITION`].

mod decoder;
mod hash;
mod reader;
mod writer;

pub use decoder::LzssDecoder;
pub use hash::MatchFinder;
pub use reader::LzssReader;
pub use writer::LzssWriter;

use crate::Result;
use std::io::{Read, Write};

/// Size of the sliding window (4096 bytes)
pub const WINDOW_SIZE: usize = 0x1000;

/// Mask for wrapping window positions
pub const WINDOW_MASK: usize = WINDOW_SIZE - 1;

/// Shortest match worth encoding
pub const MIN_MATCH: usize = 3;

/// Longest encodable match (4-bit length + 3)
pub const MAX_MATCH: usize = 18;

/// Window position of the first output byte
pub const INITIAL_POSITION: usize = WINDOW_SIZE - MAX_MATCH; // 4078

/// Convenience function to compress data in memory
pub fn compress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut writer = LzssWriter::new(Vec::with_capacity(data.len() / 2 + 16));
    writer.write_all(data)?;
    writer.finish()
}

/// Convenience function to decompress data in memory
///
/// Truncated input is not an error: decoding stops at the last complete item.
pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = LzssReader::new(data);
    let mut output = Vec::with_capacity(data.len() * 2);
    reader.read_to_end(&mut output)?;
    Ok(output)
}
