//! Font objects
//!
//! Three on-disk layouts are understood, selected by the leading
//! little-endian `i16`:
//!
//! - `8` / `16`: legacy 8x8 and 8x16 fonts, 95 bit-packed glyphs
//! - `-1`: 95 proportional 8-bit glyphs
//! - `0`: the modern multi-range format
//!
//! Serialization always produces the modern format.

mod import;
mod render;

pub use import::{
    extract_glyphs, parse_range_from_filename, parse_script, range_from_bios, range_from_fnt,
    range_from_grx, range_from_image, script_text, ScriptRange, GRX_MAGIC,
};
pub use render::{grid_sheet, PREVIEW_COLUMNS, PREVIEW_MARGIN};

use crate::common::{read_u16_le, read_u32_le};
use crate::{DatError, Result};

/// Number of glyphs in the legacy and dynamic formats
pub const LEGACY_GLYPH_COUNT: usize = 95;

/// First code point of the legacy glyph set (space)
pub const FIRST_PRINTABLE: u32 = 0x20;

/// Last code point of the legacy glyph set (tilde)
pub const LAST_PRINTABLE: u32 = 0x7E;

/// Format discriminator of the modern range format
pub const FONT_FORMAT_MODERN: i16 = 0;

/// Format discriminator of the 95-glyph proportional format
pub const FONT_FORMAT_DYNAMIC: i16 = -1;

/// One glyph bitmap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Glyph {
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// Pixel data in the owning range's depth
    pub data: Vec<u8>,
}

/// A contiguous block of code points sharing one colour depth
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Range {
    /// Depth flag, see [`bit_depth_from_mono`]
    pub mono: i8,
    /// First code point
    pub start: u32,
    /// Last code point, inclusive
    pub end: u32,
    /// One glyph per code point
    pub glyphs: Vec<Glyph>,
}

impl Range {
    /// Bits per pixel of this range's glyph data
    pub fn bit_depth(&self) -> u32 {
        bit_depth_from_mono(self.mono)
    }

    /// Number of code points covered
    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start) as usize + 1
        }
    }

    /// True if the range covers no code points
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the glyph count and every glyph's data size are consistent
    pub fn is_well_formed(&self) -> bool {
        let depth = self.bit_depth();
        self.end >= self.start
            && self.glyphs.len() == self.len()
            && self.glyphs.iter().all(|g| {
                glyph_data_size(depth, g.width, g.height) == Some(g.data.len())
            })
    }

    /// Glyph for `code_point`, if this range covers it
    pub fn glyph(&self, code_point: u32) -> Option<&Glyph> {
        if code_point < self.start || code_point > self.end {
            return None;
        }
        self.glyphs.get((code_point - self.start) as usize)
    }
}

/// Decoded `FONT` payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FontData {
    /// Format discriminator the font was read from
    pub font_size: i16,
    /// Total number of code points across all ranges
    pub glyph_count: usize,
    /// Code point ranges in stored order
    pub ranges: Vec<Range>,
}

/// Bits per pixel for a range depth flag
///
/// `1`/`-1` are bit-packed mono, `0`/`8` palette indices, `15`/`16`
/// hicolor, `24`/`32` RGB and `-32` RGBA. Unknown flags give 0.
pub fn bit_depth_from_mono(mono: i8) -> u32 {
    match mono {
        1 | -1 => 1,
        0 | 8 => 8,
        15 | 16 => 16,
        24 | 32 => 24,
        -32 => 32,
        _ => 0,
    }
}

/// Human readable name of a glyph bit depth
pub fn color_depth_name(bit_depth: u32) -> &'static str {
    match bit_depth {
        1 => "mono",
        8 => "color (indexed)",
        16 => "color (high color)",
        24 => "color (true color)",
        32 => "color (true color with alpha)",
        _ => "unknown",
    }
}

/// Format a code point range as `U+XXXX` or `U+XXXX-U+YYYY`
pub fn format_unicode_range(start: u32, end: u32) -> String {
    if start == end {
        format!("U+{start:04X}")
    } else {
        format!("U+{start:04X}-U+{end:04X}")
    }
}

/// Byte size of a glyph's data at the given bit depth
pub fn glyph_data_size(bit_depth: u32, width: u16, height: u16) -> Option<usize> {
    let (width, height) = (width as usize, height as usize);
    match bit_depth {
        1 => Some(width.div_ceil(8) * height),
        8 | 16 | 24 | 32 => Some(width * height * (bit_depth as usize / 8)),
        _ => None,
    }
}

impl FontData {
    /// Create a font from ranges in the modern format
    pub fn from_ranges(ranges: Vec<Range>) -> Self {
        let mut font = Self {
            font_size: FONT_FORMAT_MODERN,
            glyph_count: 0,
            ranges,
        };
        font.update_glyph_count();
        font
    }

    /// Decode a `FONT` payload in any of the three layouts
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(DatError::UnexpectedEof);
        }
        let font_size = read_u16_le(buf, 0)? as i16;
        log::debug!("font format {font_size}");

        let ranges = match font_size {
            8 | 16 => vec![parse_legacy(buf, font_size)?],
            FONT_FORMAT_DYNAMIC => vec![parse_dynamic(buf)?],
            FONT_FORMAT_MODERN => parse_modern(buf)?,
            other => return Err(DatError::InvalidFontFormat(other)),
        };

        let mut font = Self {
            font_size,
            glyph_count: 0,
            ranges,
        };
        font.update_glyph_count();
        Ok(font)
    }

    /// True if the font has glyphs and every range is consistent
    pub fn is_valid(&self) -> bool {
        self.glyph_count > 0
            && !self.ranges.is_empty()
            && self.ranges.len() <= u16::MAX as usize
            && self.ranges.iter().all(Range::is_well_formed)
    }

    /// Encode in the modern range format
    pub fn serialize(&self) -> Result<Vec<u8>> {
        if !self.is_valid() {
            return Err(DatError::InvalidData(
                "font has no glyphs or inconsistent ranges".to_string(),
            ));
        }

        let mut out = Vec::new();
        out.extend_from_slice(&FONT_FORMAT_MODERN.to_le_bytes());
        out.extend_from_slice(&(self.ranges.len() as u16).to_le_bytes());
        for range in &self.ranges {
            out.push(range.mono as u8);
            out.extend_from_slice(&range.start.to_le_bytes());
            out.extend_from_slice(&range.end.to_le_bytes());
            for glyph in &range.glyphs {
                out.extend_from_slice(&glyph.width.to_le_bytes());
                out.extend_from_slice(&glyph.height.to_le_bytes());
                out.extend_from_slice(&glyph.data);
            }
        }
        Ok(out)
    }

    /// Recount code points from the ranges
    pub fn update_glyph_count(&mut self) {
        self.glyph_count = self.ranges.iter().map(Range::len).sum();
    }

    /// Deepest glyph bit depth of any range
    pub fn max_bit_depth(&self) -> u32 {
        self.ranges.iter().map(Range::bit_depth).max().unwrap_or(0)
    }

    fn format_name(&self) -> String {
        match self.font_size {
            FONT_FORMAT_MODERN | FONT_FORMAT_DYNAMIC => "dynamic".to_string(),
            8 => "8x8".to_string(),
            16 => "16x16".to_string(),
            other => format!("unknown format, size {other}"),
        }
    }

    /// One-line description for listings
    pub fn caption(&self) -> String {
        format!(
            "{} font, {} ranges, {} glyphs, format {}",
            color_depth_name(self.max_bit_depth()),
            self.ranges.len(),
            self.glyph_count,
            self.format_name()
        )
    }

    /// Ranges that share code points with `candidate`, formatted
    pub fn range_overlaps(&self, candidate: &Range) -> Vec<String> {
        self.ranges
            .iter()
            .filter(|r| candidate.start <= r.end && candidate.end >= r.start)
            .map(|r| format_unicode_range(r.start, r.end))
            .collect()
    }

    /// Range and glyph for a code point
    pub fn find_glyph(&self, code_point: u32) -> Option<(&Range, &Glyph)> {
        self.ranges
            .iter()
            .find_map(|r| r.glyph(code_point).map(|g| (r, g)))
    }
}

fn parse_legacy(buf: &[u8], font_size: i16) -> Result<Range> {
    let height = font_size as usize;
    let expected = LEGACY_GLYPH_COUNT * height;
    let actual = buf.len() - 2;
    if actual != expected {
        return Err(DatError::SizeMismatch { expected, actual });
    }

    let glyphs = buf[2..]
        .chunks_exact(height)
        .map(|rows| Glyph {
            width: 8,
            height: height as u16,
            data: rows.to_vec(),
        })
        .collect();
    Ok(Range {
        mono: 1,
        start: FIRST_PRINTABLE,
        end: LAST_PRINTABLE,
        glyphs,
    })
}

fn parse_dynamic(buf: &[u8]) -> Result<Range> {
    let mut pos = 2;
    let mut glyphs = Vec::with_capacity(LEGACY_GLYPH_COUNT);
    for _ in 0..LEGACY_GLYPH_COUNT {
        let width = read_u16_le(buf, pos)?;
        let height = read_u16_le(buf, pos + 2)?;
        pos += 4;
        let size = width as usize * height as usize;
        let data = buf.get(pos..pos + size).ok_or(DatError::UnexpectedEof)?;
        pos += size;
        glyphs.push(Glyph {
            width,
            height,
            data: data.to_vec(),
        });
    }
    Ok(Range {
        mono: 0,
        start: FIRST_PRINTABLE,
        end: LAST_PRINTABLE,
        glyphs,
    })
}

fn parse_modern(buf: &[u8]) -> Result<Vec<Range>> {
    let range_count = read_u16_le(buf, 2)?;
    let mut pos = 4;
    let mut ranges = Vec::with_capacity(range_count as usize);

    for index in 0..range_count {
        let mono = *buf.get(pos).ok_or(DatError::UnexpectedEof)? as i8;
        let start = read_u32_le(buf, pos + 1)?;
        let end = read_u32_le(buf, pos + 5)?;
        pos += 9;

        if end < start {
            return Err(DatError::Format(format!(
                "font range {index} ends before it starts ({start} > {end})"
            )));
        }
        let depth = bit_depth_from_mono(mono);
        if depth == 0 {
            return Err(DatError::Format(format!(
                "font range {index} has unknown depth flag {mono}"
            )));
        }
        let count = (end - start) as usize + 1;
        // every glyph needs at least its 4-byte header
        if count > (buf.len() - pos) / 4 {
            return Err(DatError::UnexpectedEof);
        }

        let mut glyphs = Vec::with_capacity(count);
        for _ in 0..count {
            let width = read_u16_le(buf, pos)?;
            let height = read_u16_le(buf, pos + 2)?;
            pos += 4;
            let size = glyph_data_size(depth, width, height).unwrap_or(0);
            let data = buf.get(pos..pos + size).ok_or(DatError::UnexpectedEof)?;
            pos += size;
            glyphs.push(Glyph {
                width,
                height,
                data: data.to_vec(),
            });
        }
        log::debug!(
            "font range {index}: {} glyphs, depth flag {mono}",
            glyphs.len()
        );
        ranges.push(Range {
            mono,
            start,
            end,
            glyphs,
        });
    }

    if pos < buf.len() {
        log::debug!("{} trailing bytes after font ranges", buf.len() - pos);
    }
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy_8x8() -> Vec<u8> {
        let mut buf = 8i16.to_le_bytes().to_vec();
        for i in 0..LEGACY_GLYPH_COUNT {
            buf.extend_from_slice(&[i as u8; 8]);
        }
        buf
    }

    fn mono_range(start: u32, count: u32) -> Range {
        Range {
            mono: 1,
            start,
            end: start + count - 1,
            glyphs: (0..count)
                .map(|i| Glyph {
                    width: 5,
                    height: 2,
                    data: vec![i as u8, 0xF8],
                })
                .collect(),
        }
    }

    #[test]
    fn test_bit_depth_from_mono() {
        assert_eq!(bit_depth_from_mono(-1), 1);
        assert_eq!(bit_depth_from_mono(0), 8);
        assert_eq!(bit_depth_from_mono(15), 16);
        assert_eq!(bit_depth_from_mono(32), 24);
        assert_eq!(bit_depth_from_mono(-32), 32);
        assert_eq!(bit_depth_from_mono(7), 0);
    }

    #[test]
    fn test_parse_legacy() -> Result<()> {
        let font = FontData::parse(&legacy_8x8())?;
        assert_eq!(font.font_size, 8);
        assert_eq!(font.glyph_count, 95);
        let range = &font.ranges[0];
        assert_eq!((range.mono, range.start, range.end), (1, 32, 126));
        assert_eq!(range.glyphs[3].data, vec![3; 8]);
        assert_eq!(font.caption(), "mono font, 1 ranges, 95 glyphs, format 8x8");
        Ok(())
    }

    #[test]
    fn test_legacy_size_must_match() {
        let mut buf = legacy_8x8();
        buf.push(0);
        assert!(matches!(
            FontData::parse(&buf),
            Err(DatError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn test_legacy_upgrades_to_modern() -> Result<()> {
        let legacy = FontData::parse(&legacy_8x8())?;
        let modern = FontData::parse(&legacy.serialize()?)?;
        assert_eq!(modern.font_size, FONT_FORMAT_MODERN);
        assert_eq!(modern.ranges, legacy.ranges);
        assert_eq!(modern.glyph_count, 95);
        Ok(())
    }

    #[test]
    fn test_parse_dynamic() -> Result<()> {
        let mut buf = (-1i16).to_le_bytes().to_vec();
        for i in 0..LEGACY_GLYPH_COUNT {
            let width = (i % 3 + 1) as u16;
            buf.extend_from_slice(&width.to_le_bytes());
            buf.extend_from_slice(&2u16.to_le_bytes());
            buf.extend(std::iter::repeat(i as u8).take(width as usize * 2));
        }
        let font = FontData::parse(&buf)?;
        let range = &font.ranges[0];
        assert_eq!(range.mono, 0);
        assert_eq!(range.glyphs[2].width, 3);
        assert_eq!(range.glyphs[2].data, vec![2; 6]);
        assert!(range.is_well_formed());

        buf.truncate(buf.len() - 1);
        assert!(FontData::parse(&buf).is_err());
        Ok(())
    }

    #[test]
    fn test_modern_round_trip() -> Result<()> {
        let color = Range {
            mono: -32,
            start: 0x400,
            end: 0x400,
            glyphs: vec![Glyph {
                width: 1,
                height: 2,
                data: vec![1, 2, 3, 4, 5, 6, 7, 8],
            }],
        };
        let font = FontData::from_ranges(vec![mono_range(0x20, 3), color]);
        let bytes = font.serialize()?;
        assert_eq!(&bytes[..4], &[0, 0, 2, 0]);
        assert_eq!(&bytes[4..13], &[1, 0x20, 0, 0, 0, 0x22, 0, 0, 0]);
        assert_eq!(FontData::parse(&bytes)?, font);
        Ok(())
    }

    #[test]
    fn test_unknown_format() {
        assert!(matches!(
            FontData::parse(&[5, 0, 0, 0]),
            Err(DatError::InvalidFontFormat(5))
        ));
        assert!(FontData::parse(&[0]).is_err());
    }

    #[test]
    fn test_modern_truncated() {
        let mut buf = vec![0, 0, 1, 0, 1];
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0xFFFF_FFFEu32.to_le_bytes());
        assert!(matches!(FontData::parse(&buf), Err(DatError::UnexpectedEof)));
    }

    #[test]
    fn test_serialize_rejects_invalid() {
        assert!(FontData::default().serialize().is_err());
        let mut range = mono_range(0x20, 2);
        range.glyphs.pop();
        assert!(FontData::from_ranges(vec![range]).serialize().is_err());
    }

    #[test]
    fn test_overlaps_and_lookup() {
        let font = FontData::from_ranges(vec![mono_range(0x20, 16), mono_range(0x100, 1)]);
        assert_eq!(
            font.range_overlaps(&mono_range(0x28, 4)),
            vec!["U+0020-U+002F".to_string()]
        );
        assert!(font.range_overlaps(&mono_range(0x40, 4)).is_empty());
        assert_eq!(font.find_glyph(0x22).unwrap().1.data[0], 2);
        assert!(font.find_glyph(0x30).is_none());
        assert_eq!(format_unicode_range(0x100, 0x100), "U+0100");
    }

    #[test]
    fn test_caption_depth() {
        let mut font = FontData::from_ranges(vec![mono_range(0x20, 1)]);
        font.ranges.push(Range {
            mono: 16,
            ..Range::default()
        });
        assert!(font.caption().starts_with("color (high color) font, 2 ranges"));
    }
}
