//! allegro-dat - Rust implementation of the Allegro DAT packfile format
//!
//! This crate reads and writes the datafiles produced by Allegro's grabber
//! tool: a recursive tree of typed objects (bitmaps, RLE and compiled
//! sprites, palettes, fonts, nested datafiles and opaque binary blobs)
//! wrapped in optional LZSS compression and optional password
//! obfuscation. Files round-trip byte for byte.
//!
//! # Features
//!
//! - LZSS compression with Allegro's 4 KiB window, in memory or streaming
//! - Password obfuscation of the packfile envelope
//! - Ordered property tables (`NAME`, `ORIG`, `DATE`, ...)
//! - Bitmap depths 8, 15, 16, 24, 32 and 32 with alpha
//! - RLE sprite encoding, palette objects, PCX import and export
//! - Legacy, proportional and multi-range fonts
//! - Grabber settings from the `info` object and `allegro.cfg`
//!
//! Audio and video objects are kept as opaque bytes.
//!
//! # Example - Reading a datafile
//!
//! ```no_run
//! use allegro_dat::{Datafile, Payload};
//!
//! let datafile = Datafile::open("game.dat", "")?;
//! for object in &datafile.objects {
//!     println!("{} {}: {}", object.type_id, object.name(), object.caption());
//!     if let Payload::Bitmap(bitmap) = &object.payload {
//!         println!("  {}x{} at {} bits", bitmap.width, bitmap.height, bitmap.bits);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Example - Writing a datafile
//!
//! ```no_run
//! use allegro_dat::{ArchiveObject, CompressionMode, Datafile, Tag};
//!
//! let mut datafile = Datafile::default();
//! let mut sprite = ArchiveObject::new_object(Tag::RLE_SPRITE)?;
//! sprite.set_name("PLAYER");
//! datafile.objects.push(sprite);
//! datafile.info.pack = CompressionMode::Global;
//! datafile.save("game.dat", "secret")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Example - LZSS
//!
//! ```no_run
//! use allegro_dat::{compress_bytes, decompress_bytes, LzssWriter};
//! use std::io::Write;
//!
//! let packed = compress_bytes(b"abcabcabcabc")?;
//! assert_eq!(decompress_bytes(&packed)?, b"abcabcabcabc");
//!
//! let mut writer = LzssWriter::new(Vec::new());
//! writer.write_all(b"streamed")?;
//! let output = writer.finish()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

// Public modules
pub mod archive;
pub mod bitmap;
pub mod cipher;
pub mod common;
pub mod datafile;
pub mod error;
pub mod font;
pub mod info;
pub mod lzss;
pub mod tag;

// Re-export commonly used types
pub use archive::{ArchiveObject, Payload, SaveOptions, UpdateStatus};
pub use bitmap::{BitmapData, ConvertOptions, Palette, RgbImage, DEFAULT_PALETTE};
pub use cipher::{encrypt_buffer, encrypt_id};
pub use common::{DatError, Result, DAT_MAGIC, F_NOPACK_MAGIC, F_PACK_MAGIC};
pub use datafile::Datafile;
pub use font::{FontData, Glyph, Range};
pub use info::{CompressionMode, GrabberInfo};
pub use lzss::{LzssReader, LzssWriter};
pub use tag::Tag;

// Convenience functions

/// Compress data with Allegro's LZSS
///
/// # Arguments
/// * `data` - The data to compress
///
/// # Returns
/// A vector containing the compressed data
pub fn compress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    lzss::compress_bytes(data)
}

/// Decompress Allegro LZSS data
///
/// # Arguments
/// * `data` - The compressed data
///
/// # Returns
/// A vector containing the decompressed data
pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>> {
    lzss::decompress_bytes(data)
}

/// Decode a packfile held in memory
///
/// # Arguments
/// * `data` - The whole file
/// * `password` - Password, empty for none
///
/// # Returns
/// The top-level objects, `info` object included, and whether the file was compressed
pub fn read_packfile(data: &[u8], password: &str) -> Result<(Vec<ArchiveObject>, bool)> {
    archive::decode_packfile(data, password)
}

/// Encode objects as a packfile
///
/// # Arguments
/// * `objects` - The top-level objects
/// * `compress` - LZSS-compress the file
/// * `password` - Password, empty for none
///
/// # Returns
/// A vector containing the complete file
pub fn write_packfile(objects: &[ArchiveObject], compress: bool, password: &str) -> Result<Vec<u8>> {
    archive::encode_packfile(objects, compress, password)
}
