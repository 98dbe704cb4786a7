//! Four-character tags
//!
//! Object types and property keys in a datafile are 32-bit values read and
//! written big-endian, conventionally made of four ASCII characters
//! (`'BMP '`, `'NAME'`). [`Tag`] wraps the packed value and converts it to
//! and from text without losing non-printable bytes.

use std::fmt;
use std::str::FromStr;

use crate::{DatError, Result};

/// A packed four-character code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(pub u32);

impl Tag {
    /// Property record marker
    pub const PROPERTY: Tag = Tag::new(*b"prop");
    /// Nested datafile
    pub const FILE: Tag = Tag::new(*b"FILE");
    /// Binary data
    pub const DATA: Tag = Tag::new(*b"DATA");
    /// Bitmap
    pub const BITMAP: Tag = Tag::new(*b"BMP ");
    /// RLE sprite
    pub const RLE_SPRITE: Tag = Tag::new(*b"RLE ");
    /// Compiled sprite
    pub const C_SPRITE: Tag = Tag::new(*b"CMP ");
    /// Mode-X compiled sprite
    pub const XC_SPRITE: Tag = Tag::new(*b"XCMP");
    /// Palette
    pub const PALETTE: Tag = Tag::new(*b"PAL ");
    /// Font
    pub const FONT: Tag = Tag::new(*b"FONT");
    /// Grabber settings object
    pub const INFO: Tag = Tag::new(*b"info");
    /// Digital sample
    pub const SAMPLE: Tag = Tag::new(*b"SAMP");
    /// MIDI file
    pub const MIDI: Tag = Tag::new(*b"MIDI");
    /// Ogg Vorbis stream
    pub const OGG: Tag = Tag::new(*b"OGG ");
    /// GUS patch
    pub const PATCH: Tag = Tag::new(*b"PAT ");
    /// FLI/FLC animation
    pub const FLIC: Tag = Tag::new(*b"FLIC");

    /// Object name property
    pub const NAME: Tag = Tag::new(*b"NAME");
    /// Origin file property
    pub const ORIG: Tag = Tag::new(*b"ORIG");
    /// Modification date property
    pub const DATE: Tag = Tag::new(*b"DATE");

    /// Grid width setting
    pub const XGRD: Tag = Tag::new(*b"XGRD");
    /// Grid height setting
    pub const YGRD: Tag = Tag::new(*b"YGRD");
    /// Backup flag
    pub const BACK: Tag = Tag::new(*b"BACK");
    /// Dither flag
    pub const DITH: Tag = Tag::new(*b"DITH");
    /// Relative paths flag
    pub const RELF: Tag = Tag::new(*b"RELF");
    /// Sort flag
    pub const SORT: Tag = Tag::new(*b"SORT");
    /// Transparency preservation flag
    pub const TRAN: Tag = Tag::new(*b"TRAN");
    /// Compression mode
    pub const PACK: Tag = Tag::new(*b"PACK");

    /// Packs four bytes big-endian
    pub const fn new(bytes: [u8; 4]) -> Self {
        Tag(u32::from_be_bytes(bytes))
    }

    /// Returns the four bytes in wire order
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Packs up to four characters of a string, padding with spaces
    ///
    /// Longer strings are truncated to their first four bytes.
    pub fn from_str_lossy(s: &str) -> Self {
        let mut bytes = [b' '; 4];
        for (dst, src) in bytes.iter_mut().zip(s.bytes()) {
            *dst = src;
        }
        Tag::new(bytes)
    }

    /// True for the tags handled by the bitmap codec
    pub fn is_bitmap(self) -> bool {
        matches!(
            self,
            Tag::BITMAP | Tag::RLE_SPRITE | Tag::C_SPRITE | Tag::XC_SPRITE | Tag::PALETTE
        )
    }

    /// True for sound objects kept as opaque bytes
    pub fn is_audio(self) -> bool {
        matches!(self, Tag::SAMPLE | Tag::MIDI | Tag::OGG | Tag::PATCH)
    }

    /// True for video objects kept as opaque bytes
    pub fn is_video(self) -> bool {
        self == Tag::FLIC
    }
}

impl fmt::Display for Tag {
    /// Printable bytes are shown as-is, others as `\xNN`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            if (byte.is_ascii_graphic() || byte == b' ') && byte != b'\\' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{byte:02x}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Tag {
    type Err = DatError;

    /// Parses the [`Display`](fmt::Display) form back into a tag
    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = Vec::with_capacity(4);
        let mut rest = s.as_bytes();
        while let Some((&first, tail)) = rest.split_first() {
            if first == b'\\' && tail.first() == Some(&b'x') && tail.len() >= 3 {
                let hex = std::str::from_utf8(&tail[1..3])
                    .map_err(|_| DatError::InvalidData(format!("bad escape in tag {s:?}")))?;
                let value = u8::from_str_radix(hex, 16)
                    .map_err(|_| DatError::InvalidData(format!("bad escape in tag {s:?}")))?;
                bytes.push(value);
                rest = &tail[3..];
            } else {
                bytes.push(first);
                rest = tail;
            }
        }
        let bytes: [u8; 4] = bytes
            .try_into()
            .map_err(|_| DatError::InvalidData(format!("tag {s:?} is not four bytes long")))?;
        Ok(Tag::new(bytes))
    }
}

impl From<u32> for Tag {
    fn from(value: u32) -> Self {
        Tag(value)
    }
}

impl From<Tag> for u32 {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(Tag::BITMAP.0, 0x424D_5020);
        assert_eq!(Tag::PROPERTY.0, 0x7072_6F70);
        assert_eq!(Tag::INFO.to_string(), "info");
        assert_eq!(Tag::PALETTE.to_string(), "PAL ");
    }

    #[test]
    fn test_string_round_trip() {
        let backslash = Tag::new(*b"\\x41");
        for tag in [Tag::FONT, Tag::RLE_SPRITE, Tag(0x0001_7F20), Tag(0xFFFF_FFFF), backslash] {
            let text = tag.to_string();
            assert_eq!(text.parse::<Tag>().unwrap(), tag, "failed for {text}");
        }
        assert_eq!(Tag(0x4100_0142).to_string(), "A\\x00\\x01B");
    }

    #[test]
    fn test_from_str_lossy() {
        assert_eq!(Tag::from_str_lossy("BMP"), Tag::BITMAP);
        assert_eq!(Tag::from_str_lossy("NAMEX"), Tag::NAME);
        assert!("TOOLONG".parse::<Tag>().is_err());
        assert!("AB".parse::<Tag>().is_err());
    }

    #[test]
    fn test_classification() {
        assert!(Tag::XC_SPRITE.is_bitmap());
        assert!(!Tag::FONT.is_bitmap());
        assert!(Tag::OGG.is_audio());
        assert!(Tag::FLIC.is_video());
    }
}
