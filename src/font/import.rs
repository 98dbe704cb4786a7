//! Building font ranges from images, BIOS/GRX font files and scripts

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{bit_depth_from_mono, format_unicode_range, glyph_data_size, FontData, Glyph, Range};
use crate::bitmap::palette::calculate_palette_match;
use crate::bitmap::{pcx, Palette, Rgb, RgbImage, DEFAULT_PALETTE};
use crate::common::{
    read_u16_le, read_u32_le, SEPARATOR_COLOR, SEPARATOR_INDEX, TRANSPARENT_COLOR,
    TRANSPARENT_INDEX,
};
use crate::{DatError, Result};

/// Little-endian magic of GRX font files
pub const GRX_MAGIC: u32 = 0x1959_0214;

/// Size of the GRX header up to the optional width table
const GRX_HEADER_SIZE: usize = 56;

/// Largest glyph edge a GRX file may declare
const GRX_MAX_DIMENSION: u16 = 64;

/// Largest character count accepted from a GRX file
const GRX_MAX_CHARS: usize = 1000;

/// Character heights recognised in BIOS font dumps
const BIOS_HEIGHTS: [usize; 3] = [8, 14, 16];

/// Palette-match score below which indexed import warns
const PALETTE_MATCH_THRESHOLD: f64 = 0.95;

/// Default palette without the transparent and separator entries
fn glyph_palette() -> Palette {
    let mut palette = DEFAULT_PALETTE;
    let fallback = palette.color(1);
    palette.0[TRANSPARENT_INDEX as usize] = fallback;
    palette.0[SEPARATOR_INDEX as usize] = fallback;
    palette
}

fn nearest_glyph_index(palette: &Palette, rgb: Rgb) -> u8 {
    let index = palette.nearest(rgb, 1);
    if index == SEPARATOR_INDEX {
        1
    } else {
        index
    }
}

/// Lines (columns or rows) made entirely of `separator`
fn separator_lines(len: usize, cross: usize, is_separator: impl Fn(usize, usize) -> bool) -> Vec<usize> {
    (0..len)
        .filter(|&i| (0..cross).all(|j| is_separator(i, j)))
        .collect()
}

fn cell_bounds(separators: &[usize]) -> Vec<(usize, usize)> {
    separators
        .windows(2)
        .filter(|w| w[0] + 1 < w[1])
        .map(|w| (w[0] + 1, w[1] - w[0] - 1))
        .collect()
}

/// Cut a separator-gridded image into glyphs
///
/// Separator lines are whole columns and rows of the separator colour:
/// palette entry 255 for paletted images, yellow otherwise. Cells between
/// consecutive separators become glyphs in raster order, encoded for the
/// depth flag `mono` (1, 0, 24 or -32). Cells filled with the separator
/// colour are unused and skipped. Transparent pixels (palette entry 0 or
/// magenta) stay clear.
pub fn extract_glyphs(image: &RgbImage, mono: i8) -> Vec<Glyph> {
    let (separator, transparent) = match &image.palette {
        Some(palette) => (palette.color(SEPARATOR_INDEX), palette.color(TRANSPARENT_INDEX)),
        None => (SEPARATOR_COLOR, TRANSPARENT_COLOR),
    };

    let columns = separator_lines(image.width, image.height, |x, y| image.pixel(x, y) == separator);
    let rows = separator_lines(image.height, image.width, |y, x| image.pixel(x, y) == separator);
    let col_cells = cell_bounds(&columns);
    let row_cells = cell_bounds(&rows);
    log::debug!(
        "glyph sheet {}x{}: {} columns, {} rows",
        image.width,
        image.height,
        col_cells.len(),
        row_cells.len()
    );
    if col_cells.is_empty() || row_cells.is_empty() {
        log::warn!("no character grid found in image");
        return Vec::new();
    }

    let palette = glyph_palette();
    let mut glyphs = Vec::with_capacity(col_cells.len() * row_cells.len());
    for &(top, height) in &row_cells {
        for &(left, width) in &col_cells {
            let unused = (0..height)
                .all(|y| (0..width).all(|x| image.pixel(left + x, top + y) == separator));
            if unused {
                continue;
            }
            let clear = |x: usize, y: usize| {
                let c = image.pixel(left + x, top + y);
                c == transparent || c == separator
            };
            let mut data = Vec::new();
            match mono {
                1 => {
                    let stride = width.div_ceil(8);
                    data.resize(stride * height, 0);
                    for y in 0..height {
                        for x in 0..width {
                            if !clear(x, y) {
                                data[y * stride + x / 8] |= 0x80 >> (x % 8);
                            }
                        }
                    }
                }
                0 => {
                    for y in 0..height {
                        for x in 0..width {
                            data.push(if clear(x, y) {
                                TRANSPARENT_INDEX
                            } else {
                                nearest_glyph_index(&palette, image.pixel(left + x, top + y))
                            });
                        }
                    }
                }
                24 => {
                    for y in 0..height {
                        for x in 0..width {
                            let c = if clear(x, y) {
                                TRANSPARENT_COLOR
                            } else {
                                image.pixel(left + x, top + y)
                            };
                            data.extend_from_slice(&c);
                        }
                    }
                }
                _ => {
                    for y in 0..height {
                        for x in 0..width {
                            if clear(x, y) {
                                data.extend_from_slice(&[TRANSPARENT_COLOR[0], TRANSPARENT_COLOR[1], TRANSPARENT_COLOR[2], 0]);
                            } else {
                                let c = image.pixel(left + x, top + y);
                                data.extend_from_slice(&[c[0], c[1], c[2], 255]);
                            }
                        }
                    }
                }
            }
            glyphs.push(Glyph {
                width: width as u16,
                height: height as u16,
                data,
            });
        }
    }
    log::info!("extracted {} glyphs", glyphs.len());
    glyphs
}

/// Build a range starting at `base` from a glyph sheet
///
/// # Arguments
/// * `image` - Sheet with separator lines
/// * `base` - Code point of the first glyph
/// * `mono` - Depth flag: 1 mono, 0 indexed, 24 RGB or -32 RGBA
pub fn range_from_image(image: &RgbImage, base: u32, mono: i8) -> Result<Range> {
    if !matches!(mono, 1 | 0 | 24 | -32) {
        return Err(DatError::InvalidData(format!(
            "glyphs cannot be imported with depth flag {mono}"
        )));
    }
    if mono == 0 {
        let (score, _) = calculate_palette_match(image, &glyph_palette());
        log::info!("palette match score {score:.4}");
        if score < PALETTE_MATCH_THRESHOLD {
            log::warn!(
                "image colours match the default palette poorly ({score:.4}), consider 24-bit glyphs"
            );
        }
    }

    let glyphs = extract_glyphs(image, mono);
    if glyphs.is_empty() {
        return Err(DatError::Format("no glyphs found in image".to_string()));
    }
    Ok(Range {
        mono,
        start: base,
        end: base + glyphs.len() as u32 - 1,
        glyphs,
    })
}

/// Build a mono range from a raw BIOS font dump
///
/// Dumps of 256 glyphs skip the 32 control characters; 95 glyphs are
/// taken either way.
pub fn range_from_bios(buf: &[u8], height: usize, base: u32) -> Result<Range> {
    if height == 0 || buf.len() < super::LEGACY_GLYPH_COUNT * height {
        return Err(DatError::UnexpectedEof);
    }
    let skip = if buf.len() == 256 * height {
        super::FIRST_PRINTABLE as usize
    } else {
        0
    };
    let glyphs: Vec<Glyph> = buf
        .chunks_exact(height)
        .skip(skip)
        .take(super::LEGACY_GLYPH_COUNT)
        .map(|rows| Glyph {
            width: 8,
            height: height as u16,
            data: rows.to_vec(),
        })
        .collect();
    log::info!(
        "BIOS font {}, {} glyphs (8x{height})",
        format_unicode_range(base, base + glyphs.len() as u32 - 1),
        glyphs.len()
    );
    Ok(Range {
        mono: 1,
        start: base,
        end: base + glyphs.len() as u32 - 1,
        glyphs,
    })
}

/// Build a mono range from a GRX font file
pub fn range_from_grx(buf: &[u8]) -> Result<Range> {
    if buf.len() < GRX_HEADER_SIZE {
        return Err(DatError::UnexpectedEof);
    }
    let magic = read_u32_le(buf, 0)?;
    if magic != GRX_MAGIC {
        return Err(DatError::InvalidMagic(magic));
    }

    let font_width = read_u16_le(buf, 8)?;
    let font_height = read_u16_le(buf, 10)?;
    if font_width == 0 || font_height == 0 || font_width > GRX_MAX_DIMENSION || font_height > GRX_MAX_DIMENSION {
        return Err(DatError::Format(format!(
            "invalid GRX glyph size {font_width}x{font_height}"
        )));
    }
    let begin = read_u16_le(buf, 12)? as u32;
    let last = read_u16_le(buf, 14)? as u32;
    let count = (last + 1).saturating_sub(begin) as usize;
    if count == 0 || count > GRX_MAX_CHARS {
        return Err(DatError::Format(format!(
            "invalid GRX character range {begin}..={last}"
        )));
    }

    let proportional = read_u16_le(buf, 16)? == 0;
    let mut pos = GRX_HEADER_SIZE;
    let widths: Vec<u16> = if proportional {
        let widths = (0..count)
            .map(|i| read_u16_le(buf, pos + i * 2))
            .collect::<Result<Vec<_>>>()?;
        pos += count * 2;
        widths
    } else {
        vec![font_width; count]
    };

    let mut glyphs = Vec::with_capacity(count);
    for width in widths {
        let size = (width as usize).div_ceil(8) * font_height as usize;
        let Some(data) = buf.get(pos..pos + size) else {
            log::warn!("GRX font truncated after {} glyphs", glyphs.len());
            break;
        };
        pos += size;
        glyphs.push(Glyph {
            width,
            height: font_height,
            data: data.to_vec(),
        });
    }
    if glyphs.is_empty() {
        return Err(DatError::UnexpectedEof);
    }

    log::info!(
        "GRX font {}, {} glyphs ({}x{}{})",
        format_unicode_range(begin, begin + glyphs.len() as u32 - 1),
        glyphs.len(),
        font_width,
        font_height,
        if proportional { ", variable width" } else { "" }
    );
    Ok(Range {
        mono: 1,
        start: begin,
        end: begin + glyphs.len() as u32 - 1,
        glyphs,
    })
}

/// Build a range from a `.fnt` file, GRX or BIOS dump
///
/// `base` moves the range to a new first code point; `None` keeps the
/// GRX file's own start, or 0x20 for BIOS dumps.
pub fn range_from_fnt(buf: &[u8], base: Option<u32>) -> Result<Range> {
    if buf.len() < 4 {
        return Err(DatError::UnexpectedEof);
    }

    if read_u32_le(buf, 0)? == GRX_MAGIC {
        let mut range = range_from_grx(buf)?;
        if let Some(base) = base {
            range.start = base;
            range.end = base + range.glyphs.len() as u32 - 1;
        }
        return Ok(range);
    }

    let base = base.unwrap_or(super::FIRST_PRINTABLE);
    let len = buf.len();
    let height = BIOS_HEIGHTS
        .into_iter()
        .find(|&h| len == super::LEGACY_GLYPH_COUNT * h || len == 256 * h)
        .or_else(|| {
            if len % super::LEGACY_GLYPH_COUNT == 0 {
                Some(len / super::LEGACY_GLYPH_COUNT)
            } else if len % 256 == 0 {
                Some(len / 256)
            } else {
                None
            }
        })
        .ok_or_else(|| DatError::Format("unknown .fnt file format".to_string()))?;
    range_from_bios(buf, height, base)
}

impl Range {
    /// Encode this range as a GRX font file
    ///
    /// Every glyph must be bit-packed mono and share one height. Mixed
    /// widths produce a width table.
    pub fn to_grx(&self) -> Result<Vec<u8>> {
        let first = self
            .glyphs
            .first()
            .ok_or_else(|| DatError::InvalidData("cannot export an empty range".to_string()))?;
        if bit_depth_from_mono(self.mono) != 1 {
            return Err(DatError::InvalidData(
                "only mono ranges can be written as GRX".to_string(),
            ));
        }
        if self.glyphs.iter().any(|g| g.height != first.height) {
            return Err(DatError::InvalidData(
                "GRX fonts need glyphs of one height".to_string(),
            ));
        }
        for glyph in &self.glyphs {
            let expected = glyph_data_size(1, glyph.width, glyph.height).unwrap_or(0);
            if glyph.data.len() != expected {
                return Err(DatError::SizeMismatch {
                    expected,
                    actual: glyph.data.len(),
                });
            }
        }
        let proportional = self.glyphs.iter().any(|g| g.width != first.width);

        let mut out = Vec::with_capacity(GRX_HEADER_SIZE);
        out.extend_from_slice(&GRX_MAGIC.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        let width = self.glyphs.iter().map(|g| g.width).max().unwrap_or(first.width);
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&first.height.to_le_bytes());
        out.extend_from_slice(&(self.start as u16).to_le_bytes());
        out.extend_from_slice(&(self.end as u16).to_le_bytes());
        out.extend_from_slice(&(if proportional { 0u16 } else { 1 }).to_le_bytes());
        out.resize(GRX_HEADER_SIZE, 0);
        if proportional {
            for glyph in &self.glyphs {
                out.extend_from_slice(&glyph.width.to_le_bytes());
            }
        }
        for glyph in &self.glyphs {
            out.extend_from_slice(&glyph.data);
        }
        Ok(out)
    }
}

/// Import glyphs from a `.fnt` or PCX file
fn import_file(path: &Path, base: Option<u32>, mono: i8) -> Result<Range> {
    let is_fnt = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("fnt"));
    if is_fnt {
        range_from_fnt(&fs::read(path)?, base)
    } else {
        let image = pcx::load(path)?;
        range_from_image(&image, base.unwrap_or(super::FIRST_PRINTABLE), mono)
    }
}

/// One `file start end` entry of a font script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRange {
    /// Source file, resolved against the script's directory
    pub path: PathBuf,
    /// First code point
    pub start: u32,
    /// Last code point, inclusive
    pub end: u32,
}

fn parse_code_point(token: &str) -> Option<u32> {
    let hex = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .or_else(|| token.strip_prefix("U+"))
        .or_else(|| token.strip_prefix("u+"));
    match hex {
        Some(digits) => u32::from_str_radix(digits, 16).ok(),
        None => token
            .parse()
            .ok()
            .or_else(|| u32::from_str_radix(token, 16).ok()),
    }
}

/// Parse a font script
///
/// Each line is `file start end`; a file of `-` reuses the previous one.
/// Lines starting with `#` or `//` are comments. Relative files resolve
/// against `dir`.
pub fn parse_script(text: &str, dir: &Path) -> Vec<ScriptRange> {
    let mut ranges = Vec::new();
    let mut current: Option<PathBuf> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 {
            log::debug!("script line has {} tokens, skipping", tokens.len());
            continue;
        }
        let (Some(start), Some(end)) = (parse_code_point(tokens[1]), parse_code_point(tokens[2]))
        else {
            log::debug!("invalid code point in script line {line:?}");
            continue;
        };

        if tokens[0] != "-" {
            let file = Path::new(tokens[0]);
            current = Some(if file.is_absolute() {
                file.to_path_buf()
            } else {
                dir.join(file)
            });
        }
        let Some(path) = &current else {
            continue;
        };
        ranges.push(ScriptRange {
            path: path.clone(),
            start,
            end,
        });
    }
    ranges
}

/// Script text describing `ranges` stored in one sheet `bitmap_name`
pub fn script_text(ranges: &[Range], bitmap_name: &str) -> String {
    let mut text = String::from("# Font export script\n# Format: filename start_code end_code\n\n");
    for (i, range) in ranges.iter().enumerate() {
        let file = if i == 0 { bitmap_name } else { "-" };
        text.push_str(&format!("{} 0x{:04X} 0x{:04X}\n", file, range.start, range.end));
    }
    text
}

/// Code point range encoded in a file name
///
/// Recognises `name_0x20_0x7F`, `name-U+0400-U+04FF`, `name_32_126` and
/// single-value forms such as `name_U+0400`, which leave the end open
/// (`u32::MAX`).
pub fn parse_range_from_filename(path: &Path) -> Option<(u32, u32)> {
    let stem = path.file_stem()?.to_str()?;
    let tokens: Vec<&str> = stem.split(['_', '-']).collect();

    let hex = |t: &str| {
        let digits = t
            .strip_prefix("0x")
            .or_else(|| t.strip_prefix("U+"))
            .or_else(|| t.strip_prefix('U'))?;
        u32::from_str_radix(digits, 16).ok()
    };
    let dec = |t: &str| {
        if !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()) {
            t.parse::<u32>().ok()
        } else {
            None
        }
    };

    let n = tokens.len();
    if n >= 3 {
        let (a, b) = (tokens[n - 2], tokens[n - 1]);
        if let (Some(start), Some(end)) = (hex(a), hex(b)) {
            return Some((start, end));
        }
        if let (Some(start), Some(end)) = (dec(a), dec(b)) {
            return Some((start, end));
        }
    }
    if n >= 2 {
        let last = tokens[n - 1];
        if let Some(start) = hex(last).or_else(|| dec(last)) {
            return Some((start, u32::MAX));
        }
    }
    None
}

impl FontData {
    /// Build a font from the entries of a font script
    ///
    /// Entries sharing a file take consecutive glyphs from it, so a sheet
    /// exported with its script reads back range by range.
    pub fn from_script(entries: &[ScriptRange]) -> Result<Self> {
        let mut sources: HashMap<&Path, (Vec<Glyph>, usize)> = HashMap::new();
        let mut ranges = Vec::new();

        for entry in entries {
            if !entry.path.exists() {
                log::error!("{} does not exist", entry.path.display());
                continue;
            }
            if !sources.contains_key(entry.path.as_path()) {
                match import_file(&entry.path, Some(entry.start), 1) {
                    Ok(range) => {
                        sources.insert(entry.path.as_path(), (range.glyphs, 0));
                    }
                    Err(e) => {
                        log::error!("failed to import {}: {}", entry.path.display(), e);
                        continue;
                    }
                }
            }
            let Some((glyphs, cursor)) = sources.get_mut(entry.path.as_path()) else {
                continue;
            };

            let wanted = if entry.end == u32::MAX || entry.end < entry.start {
                glyphs.len() - *cursor
            } else {
                (entry.end - entry.start) as usize + 1
            };
            let available = (glyphs.len() - *cursor).min(wanted);
            if available == 0 {
                log::warn!("no glyphs left in {}", entry.path.display());
                continue;
            }
            if available < wanted {
                log::warn!(
                    "{} only has {} of {} glyphs",
                    format_unicode_range(entry.start, entry.end),
                    available,
                    wanted
                );
            }
            let taken = glyphs[*cursor..*cursor + available].to_vec();
            *cursor += available;
            log::info!(
                "imported {} from {}",
                format_unicode_range(entry.start, entry.start + available as u32 - 1),
                entry.path.display()
            );
            ranges.push(Range {
                mono: 1,
                start: entry.start,
                end: entry.start + available as u32 - 1,
                glyphs: taken,
            });
        }

        if ranges.is_empty() {
            return Err(DatError::InvalidData(
                "no ranges could be imported from the script".to_string(),
            ));
        }
        Ok(Self::from_ranges(ranges))
    }

    /// Load a font script file and import every entry
    pub fn load_script(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_script(&parse_script(&text, dir))
    }

    /// Import a whole font from a file
    ///
    /// `.txt` files are read as scripts, `.fnt` as GRX or BIOS fonts and
    /// anything else as a PCX glyph sheet. A range in the file name
    /// overrides the first code point.
    pub fn import(path: impl AsRef<Path>, mono: i8) -> Result<Self> {
        let path = path.as_ref();
        if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
        {
            return Self::load_script(path);
        }
        let base = parse_range_from_filename(path).map(|(start, _)| start);
        let range = import_file(path, base, mono)?;
        Ok(Self::from_ranges(vec![range]))
    }

    /// Refresh the glyphs of every range from a source file
    ///
    /// Glyphs are handed out to the ranges in order. Ranges the file has
    /// too few glyphs for are shortened.
    ///
    /// # Returns
    /// `true` if every range was fully refreshed
    pub fn update_from_file(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        if self.ranges.is_empty() {
            return Err(DatError::InvalidData("font has no ranges to update".to_string()));
        }

        let mut imported: HashMap<i8, Vec<Glyph>> = HashMap::new();
        for range in &self.ranges {
            if !imported.contains_key(&range.mono) {
                let glyphs = import_file(path, None, range.mono)?.glyphs;
                imported.insert(range.mono, glyphs);
            }
        }

        let mut complete = true;
        let mut cursor = 0;
        let mut kept = Vec::with_capacity(self.ranges.len());
        for mut range in std::mem::take(&mut self.ranges) {
            let source = imported.get(&range.mono).map(Vec::as_slice).unwrap_or(&[]);
            let wanted = range.len();
            let count = source.len().saturating_sub(cursor).min(wanted);
            if count < wanted {
                log::warn!(
                    "range {} only partially updated: {} of {} glyphs available",
                    format_unicode_range(range.start, range.end),
                    count,
                    wanted
                );
                complete = false;
            }
            if count == 0 {
                continue;
            }
            range.glyphs = source[cursor..cursor + count].to_vec();
            range.end = range.start + count as u32 - 1;
            cursor += count;
            kept.push(range);
        }
        self.ranges = kept;
        self.update_glyph_count();
        Ok(complete)
    }

    /// Export the glyphs as PCX sheets
    ///
    /// One range goes to `path` (suffixed `_0xXXXX` unless it starts at
    /// 0x20). Several ranges share one sheet plus a `.txt` script next to
    /// it.
    ///
    /// # Returns
    /// The files written
    pub fn export_sheets(&self, path: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| DatError::InvalidData(format!("invalid file name {}", path.display())))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("pcx");

        match self.ranges.as_slice() {
            [] => Err(DatError::InvalidData("font has no ranges".to_string())),
            [range] => {
                let target = if range.start != super::FIRST_PRINTABLE {
                    path.with_file_name(format!("{stem}_0x{:04X}.{ext}", range.start))
                } else {
                    path.to_path_buf()
                };
                let sheet = range
                    .to_sheet()
                    .ok_or_else(|| DatError::InvalidData("range has no glyphs".to_string()))?;
                pcx::save(&target, &sheet)?;
                Ok(vec![target])
            }
            ranges => {
                let sheet = self
                    .to_sheet()
                    .ok_or_else(|| DatError::InvalidData("font has no glyphs".to_string()))?;
                let sheet_name = format!("{stem}.{ext}");
                let sheet_path = path.with_file_name(&sheet_name);
                let script_path = path.with_file_name(format!("{stem}.txt"));
                pcx::save(&sheet_path, &sheet)?;
                fs::write(&script_path, script_text(ranges, &sheet_name))?;
                log::info!(
                    "exported {} ranges to {}",
                    ranges.len(),
                    sheet_path.display()
                );
                Ok(vec![sheet_path, script_path])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sheet_3x1() -> RgbImage {
        // three 2x2 cells: | X. | .. | XX |
        let mut image = RgbImage::filled(10, 4, SEPARATOR_COLOR);
        for cell in 0..3 {
            for y in 1..3 {
                for x in 0..2 {
                    image.set_pixel(1 + cell * 3 + x, y, TRANSPARENT_COLOR);
                }
            }
        }
        image.set_pixel(1, 1, [0, 0, 0]);
        image.set_pixel(7, 2, [200, 10, 10]);
        image.set_pixel(8, 2, [200, 10, 10]);
        image
    }

    fn mono_range(start: u32, count: u32) -> Range {
        Range {
            mono: 1,
            start,
            end: start + count - 1,
            glyphs: (0..count)
                .map(|i| Glyph {
                    width: 8,
                    height: 2,
                    data: vec![i as u8 | 0x81, 0x18],
                })
                .collect(),
        }
    }

    #[test]
    fn test_extract_mono() {
        let glyphs = extract_glyphs(&sheet_3x1(), 1);
        assert_eq!(glyphs.len(), 3);
        assert_eq!((glyphs[0].width, glyphs[0].height), (2, 2));
        assert_eq!(glyphs[0].data, vec![0x80, 0x00]);
        assert_eq!(glyphs[1].data, vec![0x00, 0x00]);
        assert_eq!(glyphs[2].data, vec![0x00, 0xC0]);
    }

    #[test]
    fn test_extract_color_formats() {
        let rgb = extract_glyphs(&sheet_3x1(), 24);
        assert_eq!(&rgb[0].data[..3], &[0, 0, 0]);
        assert_eq!(&rgb[0].data[3..6], &TRANSPARENT_COLOR);

        let rgba = extract_glyphs(&sheet_3x1(), -32);
        assert_eq!(&rgba[0].data[..4], &[0, 0, 0, 255]);
        assert_eq!(rgba[0].data[7], 0);

        let indexed = extract_glyphs(&sheet_3x1(), 0);
        assert_eq!(indexed[1].data, vec![0; 4]);
        assert_ne!(indexed[0].data[0], TRANSPARENT_INDEX);
        assert_ne!(indexed[0].data[0], SEPARATOR_INDEX);
    }

    #[test]
    fn test_no_grid() {
        let image = RgbImage::filled(4, 4, [1, 2, 3]);
        assert!(extract_glyphs(&image, 1).is_empty());
        assert!(range_from_image(&image, 32, 1).is_err());
    }

    #[test]
    fn test_range_from_image() -> Result<()> {
        let range = range_from_image(&sheet_3x1(), 0x41, 1)?;
        assert_eq!((range.start, range.end), (0x41, 0x43));
        assert!(range.is_well_formed());
        assert!(range_from_image(&sheet_3x1(), 0x41, 16).is_err());
        Ok(())
    }

    #[test]
    fn test_sheet_round_trip() -> Result<()> {
        let range = mono_range(0x20, 10);
        let sheet = range.to_sheet().unwrap();
        let back = range_from_image(&sheet, 0x20, 1)?;
        assert_eq!(back.glyphs.len(), 10);
        assert_eq!(back.glyphs, range.glyphs);
        Ok(())
    }

    #[test]
    fn test_bios_dumps() -> Result<()> {
        let dump: Vec<u8> = (0..256 * 8).map(|i| (i / 8) as u8).collect();
        let range = range_from_fnt(&dump, None)?;
        assert_eq!((range.start, range.end), (0x20, 0x7E));
        assert_eq!(range.glyphs[0].data, vec![32; 8]);

        let short: Vec<u8> = (0..95 * 14).map(|i| (i / 14) as u8).collect();
        let range = range_from_fnt(&short, Some(0x100))?;
        assert_eq!(range.glyphs[1].height, 14);
        assert_eq!(range.glyphs[1].data, vec![1; 14]);
        assert_eq!(range.start, 0x100);

        assert!(range_from_fnt(&[1, 2, 3, 4, 5], None).is_err());
        Ok(())
    }

    #[test]
    fn test_grx_round_trip() -> Result<()> {
        let range = mono_range(0x20, 5);
        let grx = range.to_grx()?;
        assert_eq!(grx.len(), GRX_HEADER_SIZE + 5 * 2);
        assert_eq!(read_u16_le(&grx, 16)?, 1);
        assert_eq!(range_from_fnt(&grx, None)?, range);

        let mut proportional = range.clone();
        proportional.glyphs[2] = Glyph {
            width: 12,
            height: 2,
            data: vec![0xFF, 0xF0, 0x0F, 0xF0],
        };
        let grx = proportional.to_grx()?;
        assert_eq!(read_u16_le(&grx, 8)?, 12);
        assert_eq!(read_u16_le(&grx, 16)?, 0);
        assert_eq!(read_u16_le(&grx, GRX_HEADER_SIZE + 4)?, 12);
        assert_eq!(range_from_grx(&grx)?, proportional);
        Ok(())
    }

    #[test]
    fn test_grx_errors() {
        let mut tall = mono_range(0x20, 2);
        tall.glyphs[1].height = 3;
        tall.glyphs[1].data.push(0);
        assert!(tall.to_grx().is_err());

        let mut header = vec![0u8; GRX_HEADER_SIZE];
        header[..4].copy_from_slice(&GRX_MAGIC.to_le_bytes());
        header[8] = 65;
        header[10] = 8;
        assert!(range_from_grx(&header).is_err());
        assert!(matches!(range_from_grx(&[0u8; 60]), Err(DatError::InvalidMagic(0))));
    }

    #[test]
    fn test_parse_script() {
        let text = "# comment\n// another\nlatin.pcx 0x20 0x7F\n-\tU+A0  255\nbad line\n/abs/cyr.pcx 1024 4FF\n- 0x10 zz\n";
        let ranges = parse_script(text, Path::new("/fonts"));
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].path, PathBuf::from("/fonts/latin.pcx"));
        assert_eq!((ranges[0].start, ranges[0].end), (0x20, 0x7F));
        assert_eq!(ranges[1].path, ranges[0].path);
        assert_eq!((ranges[1].start, ranges[1].end), (0xA0, 255));
        assert_eq!(ranges[2].path, PathBuf::from("/abs/cyr.pcx"));
        assert_eq!((ranges[2].start, ranges[2].end), (1024, 0x4FF));

        assert!(parse_script("- 1 2\n", Path::new(".")).is_empty());
    }

    #[test]
    fn test_script_text() {
        let text = script_text(&[mono_range(0x20, 2), mono_range(0x400, 1)], "font.pcx");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[3], "font.pcx 0x0020 0x0021");
        assert_eq!(lines[4], "- 0x0400 0x0400");
        let parsed = parse_script(&text, Path::new("/x"));
        assert_eq!(parsed[1].start, 0x400);
    }

    #[test]
    fn test_range_from_filename() {
        let parse = |s: &str| parse_range_from_filename(Path::new(s));
        assert_eq!(parse("font_0x20_0x7F.pcx"), Some((0x20, 0x7F)));
        assert_eq!(parse("dir/font-U+0400-U+04FF.pcx"), Some((0x400, 0x4FF)));
        assert_eq!(parse("font_32_126.pcx"), Some((32, 126)));
        assert_eq!(parse("font_U+0400.pcx"), Some((0x400, u32::MAX)));
        assert_eq!(parse("font_160.pcx"), Some((160, u32::MAX)));
        assert_eq!(parse("font.pcx"), None);
    }

    #[test]
    fn test_export_and_script_import() -> Result<()> {
        let dir = TempDir::new()?;
        let font = FontData::from_ranges(vec![mono_range(0x20, 4), mono_range(0x400, 3)]);
        let written = font.export_sheets(dir.path().join("font.pcx"))?;
        assert_eq!(written.len(), 2);
        assert!(written[1].ends_with("font.txt"));

        let back = FontData::import(&written[1], 1)?;
        assert_eq!(back.ranges, font.ranges);
        Ok(())
    }

    #[test]
    fn test_export_single_range_suffix() -> Result<()> {
        let dir = TempDir::new()?;
        let font = FontData::from_ranges(vec![mono_range(0x400, 2)]);
        let written = font.export_sheets(dir.path().join("cyr.pcx"))?;
        assert!(written[0].ends_with("cyr_0x0400.pcx"));

        let back = FontData::import(&written[0], 1)?;
        assert_eq!(back.ranges[0].start, 0x400);
        assert_eq!(back.ranges[0].glyphs, font.ranges[0].glyphs);
        Ok(())
    }

    #[test]
    fn test_update_from_file() -> Result<()> {
        let dir = TempDir::new()?;
        let source = mono_range(0x20, 5);
        let path = dir.path().join("glyphs.fnt");
        fs::write(&path, source.to_grx()?)?;

        let mut font = FontData::from_ranges(vec![mono_range(0x30, 3), mono_range(0x40, 4)]);
        assert!(!font.update_from_file(&path)?);
        assert_eq!(font.ranges[0].glyphs, source.glyphs[..3].to_vec());
        assert_eq!(font.ranges[1].glyphs.len(), 2);
        assert_eq!(font.ranges[1].end, 0x41);
        assert_eq!(font.glyph_count, 5);
        Ok(())
    }
}
