//! Glyph rendering and range export images

use super::{FontData, Glyph, Range};
use crate::bitmap::{RgbImage, DEFAULT_PALETTE};
use crate::common::{
    SEPARATOR_COLOR, TRANSPARENT_COLOR, TRANSPARENT_COLOR_16, TRANSPARENT_INDEX,
};

/// Glyphs per row in the font preview
pub const PREVIEW_COLUMNS: usize = 31;

/// Gap around glyphs in the font preview
pub const PREVIEW_MARGIN: usize = 2;

/// Blank image with transparent magenta pixels
fn transparent_canvas(width: usize, height: usize) -> RgbImage {
    let mut image = RgbImage::filled(width, height, TRANSPARENT_COLOR);
    image.alpha = Some(vec![0; width * height]);
    image
}

/// Draw the opaque pixels of `glyph` with its top-left corner at (x0, y0)
pub(crate) fn draw_glyph(image: &mut RgbImage, depth: u32, glyph: &Glyph, x0: usize, y0: usize) {
    let (width, height) = (glyph.width as usize, glyph.height as usize);
    let mut plot = |x: usize, y: usize, rgb: [u8; 3], alpha: u8| {
        let (px, py) = (x0 + x, y0 + y);
        if px < image.width && py < image.height {
            image.set_pixel(px, py, rgb);
            image.set_alpha(px, py, alpha);
        }
    };

    match depth {
        1 => {
            let stride = width.div_ceil(8);
            for y in 0..height {
                for x in 0..width {
                    let Some(&byte) = glyph.data.get(y * stride + x / 8) else {
                        continue;
                    };
                    if byte & (0x80 >> (x % 8)) != 0 {
                        plot(x, y, [0, 0, 0], 255);
                    }
                }
            }
        }
        8 => {
            for (i, &index) in glyph.data.iter().enumerate().take(width * height) {
                if index != TRANSPARENT_INDEX {
                    plot(i % width, i / width, DEFAULT_PALETTE.color(index), 255);
                }
            }
        }
        16 => {
            for (i, px) in glyph.data.chunks_exact(2).enumerate().take(width * height) {
                let value = u16::from_le_bytes([px[0], px[1]]);
                if value != TRANSPARENT_COLOR_16 {
                    let rgb = [
                        (((value >> 11) & 0x1F) << 3) as u8,
                        (((value >> 5) & 0x3F) << 2) as u8,
                        ((value & 0x1F) << 3) as u8,
                    ];
                    plot(i % width, i / width, rgb, 255);
                }
            }
        }
        24 => {
            for (i, px) in glyph.data.chunks_exact(3).enumerate().take(width * height) {
                let rgb = [px[0], px[1], px[2]];
                if rgb != TRANSPARENT_COLOR {
                    plot(i % width, i / width, rgb, 255);
                }
            }
        }
        32 => {
            for (i, px) in glyph.data.chunks_exact(4).enumerate().take(width * height) {
                if px[3] > 0 {
                    plot(i % width, i / width, [px[0], px[1], px[2]], px[3]);
                }
            }
        }
        _ => {}
    }
}

impl Range {
    /// Render the glyph at `index` on a transparent background
    pub fn render_glyph(&self, index: usize) -> Option<RgbImage> {
        let glyph = self.glyphs.get(index)?;
        if glyph.width == 0 || glyph.height == 0 || glyph.data.is_empty() {
            return None;
        }
        let mut image = transparent_canvas(glyph.width as usize, glyph.height as usize);
        draw_glyph(&mut image, self.bit_depth(), glyph, 0, 0);
        Some(image)
    }

    /// Lay the range out as a separator-gridded sheet, see [`grid_sheet`]
    pub fn to_sheet(&self) -> Option<RgbImage> {
        grid_sheet(std::slice::from_ref(self))
    }
}

/// Lay out every glyph of `ranges` on a square-ish grid
///
/// Cells are as large as the largest glyph, filled magenta and separated
/// by one-pixel yellow lines, so [`super::extract_glyphs`] can read the
/// sheet back.
pub fn grid_sheet(ranges: &[Range]) -> Option<RgbImage> {
    let total: usize = ranges.iter().map(|r| r.glyphs.len()).sum();
    if total == 0 {
        return None;
    }

    let glyphs = ranges.iter().flat_map(|r| r.glyphs.iter());
    let cell_width = glyphs.clone().map(|g| g.width as usize).max().unwrap_or(0);
    let cell_height = glyphs.map(|g| g.height as usize).max().unwrap_or(0);

    let mut cols = 1;
    while cols * cols < total {
        cols += 1;
    }
    let rows = total.div_ceil(cols);

    let mut sheet = RgbImage::filled(
        cols * cell_width + cols + 1,
        rows * cell_height + rows + 1,
        SEPARATOR_COLOR,
    );

    let mut n = 0;
    for range in ranges {
        for index in 0..range.glyphs.len() {
            let cell_x = 1 + (n % cols) * (cell_width + 1);
            let cell_y = 1 + (n / cols) * (cell_height + 1);
            sheet.paste(
                &RgbImage::filled(cell_width, cell_height, TRANSPARENT_COLOR),
                cell_x,
                cell_y,
            );
            if let Some(glyph) = range.render_glyph(index) {
                let mut opaque = glyph;
                opaque.alpha = None;
                sheet.paste(
                    &opaque,
                    cell_x + (cell_width - opaque.width) / 2,
                    cell_y + (cell_height - opaque.height) / 2,
                );
            }
            n += 1;
        }
    }
    Some(sheet)
}

impl FontData {
    /// Render every glyph on one transparent sheet, 31 per row
    pub fn preview_image(&self) -> Option<RgbImage> {
        if !self.is_valid() {
            return None;
        }
        let glyphs = self.ranges.iter().flat_map(|r| r.glyphs.iter());
        let glyph_width = glyphs.clone().map(|g| g.width as usize).max().unwrap_or(0);
        let glyph_height = glyphs.map(|g| g.height as usize).max().unwrap_or(0);

        let total: usize = self.ranges.iter().map(|r| r.glyphs.len()).sum();
        let rows = total.div_ceil(PREVIEW_COLUMNS);
        let mut image = transparent_canvas(
            PREVIEW_COLUMNS * (glyph_width + PREVIEW_MARGIN) + PREVIEW_MARGIN,
            rows * (glyph_height + PREVIEW_MARGIN) + PREVIEW_MARGIN,
        );

        let mut n = 0;
        for range in &self.ranges {
            let depth = range.bit_depth();
            for glyph in &range.glyphs {
                let x0 = PREVIEW_MARGIN + (n % PREVIEW_COLUMNS) * (glyph_width + PREVIEW_MARGIN);
                let y0 = PREVIEW_MARGIN + (n / PREVIEW_COLUMNS) * (glyph_height + PREVIEW_MARGIN);
                draw_glyph(&mut image, depth, glyph, x0, y0);
                n += 1;
            }
        }
        Some(image)
    }

    /// Render the glyph for a code point
    pub fn render_code_point(&self, code_point: u32) -> Option<RgbImage> {
        self.ranges
            .iter()
            .find(|r| code_point >= r.start && code_point <= r.end)
            .and_then(|r| r.render_glyph((code_point - r.start) as usize))
    }

    /// All ranges on one separator-gridded sheet
    pub fn to_sheet(&self) -> Option<RgbImage> {
        grid_sheet(&self.ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(width: u16, height: u16, data: Vec<u8>) -> Glyph {
        Glyph {
            width,
            height,
            data,
        }
    }

    #[test]
    fn test_render_mono() {
        let range = Range {
            mono: 1,
            start: 65,
            end: 65,
            glyphs: vec![glyph(3, 2, vec![0b1010_0000, 0b0100_0000])],
        };
        let image = range.render_glyph(0).unwrap();
        assert_eq!(image.pixel(0, 0), [0, 0, 0]);
        assert_eq!(image.alpha_at(0, 0), 255);
        assert_eq!(image.pixel(1, 0), TRANSPARENT_COLOR);
        assert_eq!(image.alpha_at(1, 0), 0);
        assert_eq!(image.alpha_at(1, 1), 255);
        assert!(range.render_glyph(1).is_none());
    }

    #[test]
    fn test_render_color_depths() {
        let indexed = Range {
            mono: 0,
            start: 0,
            end: 0,
            glyphs: vec![glyph(2, 1, vec![0, 1])],
        };
        let image = indexed.render_glyph(0).unwrap();
        assert_eq!(image.alpha_at(0, 0), 0);
        assert_eq!(image.pixel(1, 0), DEFAULT_PALETTE.color(1));

        let hicolor = Range {
            mono: 16,
            start: 0,
            end: 0,
            glyphs: vec![glyph(2, 1, vec![0x1F, 0xF8, 0xE0, 0x07])],
        };
        let image = hicolor.render_glyph(0).unwrap();
        assert_eq!(image.alpha_at(0, 0), 0);
        assert_eq!(image.pixel(1, 0), [0, 252, 0]);

        let rgba = Range {
            mono: -32,
            start: 0,
            end: 0,
            glyphs: vec![glyph(2, 1, vec![1, 2, 3, 0, 4, 5, 6, 128])],
        };
        let image = rgba.render_glyph(0).unwrap();
        assert_eq!(image.alpha_at(0, 0), 0);
        assert_eq!(image.alpha_at(1, 0), 128);
    }

    #[test]
    fn test_preview_layout() {
        let range = Range {
            mono: 1,
            start: 0,
            end: 39,
            glyphs: vec![glyph(8, 1, vec![0xFF]); 40],
        };
        let font = FontData::from_ranges(vec![range]);
        let preview = font.preview_image().unwrap();
        assert_eq!(preview.width, 31 * 10 + 2);
        assert_eq!(preview.height, 2 * 3 + 2);
        assert_eq!(preview.alpha_at(2, 2), 255);
        assert_eq!(preview.alpha_at(0, 0), 0);
        assert_eq!(preview.alpha_at(2, 5), 255);
    }

    #[test]
    fn test_sheet_layout() {
        let range = Range {
            mono: 24,
            start: 0,
            end: 4,
            glyphs: vec![glyph(1, 1, vec![9, 9, 9]); 5],
        };
        let sheet = range.to_sheet().unwrap();
        // five glyphs: 3 columns, 2 rows of 1x1 cells
        assert_eq!((sheet.width, sheet.height), (7, 5));
        assert_eq!(sheet.pixel(0, 0), SEPARATOR_COLOR);
        assert_eq!(sheet.pixel(1, 1), [9, 9, 9]);
        assert_eq!(sheet.pixel(5, 3), SEPARATOR_COLOR);
        assert!(sheet.alpha.is_none());
    }
}
