//! Uncompressed RGB working image
//!
//! [`RgbImage`] is the interchange representation between packed bitmap
//! depths, PCX files and the font glyph extractor. Pixels are row-major RGB
//! triples with an optional parallel alpha plane and, for images that came
//! from an indexed source, the palette they were drawn with.

use std::collections::VecDeque;

use super::palette::{Palette, Rgb};
use crate::common::{BOUNDARY_COLOR, SEPARATOR_COLOR};

/// An axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge
    pub x: usize,
    /// Top edge
    pub y: usize,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

impl Rect {
    /// Create a rectangle
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Row-major RGB image with optional alpha
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
    /// RGB triples, `width * height * 3` bytes
    pub rgb: Vec<u8>,
    /// Per-pixel alpha, `width * height` bytes when present
    pub alpha: Option<Vec<u8>>,
    /// Palette of an indexed source image
    pub palette: Option<Palette>,
}

impl RgbImage {
    /// Create a black image without alpha
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rgb: vec![0; width * height * 3],
            alpha: None,
            palette: None,
        }
    }

    /// Create an image filled with one colour
    pub fn filled(width: usize, height: usize, color: Rgb) -> Self {
        let mut image = Self::new(width, height);
        for chunk in image.rgb.chunks_exact_mut(3) {
            chunk.copy_from_slice(&color);
        }
        image
    }

    /// True if the image has no pixels
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Colour at (x, y)
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> Rgb {
        let i = (y * self.width + x) * 3;
        [self.rgb[i], self.rgb[i + 1], self.rgb[i + 2]]
    }

    /// Set the colour at (x, y)
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) {
        let i = (y * self.width + x) * 3;
        self.rgb[i..i + 3].copy_from_slice(&color);
    }

    /// Alpha at (x, y), 255 when the image has no alpha plane
    #[inline]
    pub fn alpha_at(&self, x: usize, y: usize) -> u8 {
        self.alpha
            .as_ref()
            .map_or(255, |alpha| alpha[y * self.width + x])
    }

    /// Set the alpha at (x, y), creating an opaque plane first if needed
    pub fn set_alpha(&mut self, x: usize, y: usize, value: u8) {
        let len = self.width * self.height;
        let alpha = self.alpha.get_or_insert_with(|| vec![255; len]);
        alpha[y * self.width + x] = value;
    }

    /// Iterate over all pixels in row-major order
    pub fn pixels(&self) -> impl Iterator<Item = Rgb> + '_ {
        self.rgb.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }

    /// Copy out a sub-rectangle, clipped to the image
    pub fn sub_image(&self, rect: Rect) -> RgbImage {
        let x0 = rect.x.min(self.width);
        let y0 = rect.y.min(self.height);
        let width = rect.width.min(self.width - x0);
        let height = rect.height.min(self.height - y0);

        let mut out = RgbImage::new(width, height);
        out.palette = self.palette.clone();
        if self.alpha.is_some() {
            out.alpha = Some(vec![255; width * height]);
        }
        for y in 0..height {
            let src = ((y0 + y) * self.width + x0) * 3;
            let dst = y * width * 3;
            out.rgb[dst..dst + width * 3].copy_from_slice(&self.rgb[src..src + width * 3]);
            if let (Some(src_alpha), Some(dst_alpha)) = (&self.alpha, &mut out.alpha) {
                let src = (y0 + y) * self.width + x0;
                dst_alpha[y * width..(y + 1) * width]
                    .copy_from_slice(&src_alpha[src..src + width]);
            }
        }
        out
    }

    /// Paste `other` with its top-left corner at (x, y), clipped
    pub fn paste(&mut self, other: &RgbImage, x: usize, y: usize) {
        for sy in 0..other.height {
            for sx in 0..other.width {
                let (dx, dy) = (x + sx, y + sy);
                if dx < self.width && dy < self.height {
                    self.set_pixel(dx, dy, other.pixel(sx, sy));
                    if other.alpha.is_some() || self.alpha.is_some() {
                        self.set_alpha(dx, dy, other.alpha_at(sx, sy));
                    }
                }
            }
        }
    }

    /// Mean of R, G and B per pixel, or the alpha plane if there is one
    pub fn brightness_or_alpha(&self) -> Vec<u8> {
        match &self.alpha {
            Some(alpha) => alpha.clone(),
            None => self
                .pixels()
                .map(|c| ((c[0] as u16 + c[1] as u16 + c[2] as u16) / 3) as u8)
                .collect(),
        }
    }

    /// Split into regions separated by `grid_color`
    ///
    /// Each 4-connected region of non-grid pixels becomes one cell, in the
    /// order their top-left-most pixel is met scanning rows. When the image
    /// has alpha, a pixel only counts as grid if it is also opaque.
    pub fn grid_by_color(&self, grid_color: Rgb) -> Vec<Rect> {
        let (width, height) = (self.width, self.height);
        let is_grid = |x: usize, y: usize| {
            self.pixel(x, y) == grid_color && (self.alpha.is_none() || self.alpha_at(x, y) == 255)
        };

        let mut visited = vec![false; width * height];
        let mut cells = Vec::new();
        let mut queue = VecDeque::new();

        for y in 0..height {
            for x in 0..width {
                if visited[y * width + x] {
                    continue;
                }
                visited[y * width + x] = true;
                if is_grid(x, y) {
                    continue;
                }

                let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);
                queue.push_back((x, y));
                while let Some((cx, cy)) = queue.pop_front() {
                    min_x = min_x.min(cx);
                    min_y = min_y.min(cy);
                    max_x = max_x.max(cx);
                    max_y = max_y.max(cy);

                    let neighbours = [
                        (cx, cy + 1),
                        (cx, cy.wrapping_sub(1)),
                        (cx + 1, cy),
                        (cx.wrapping_sub(1), cy),
                    ];
                    for (nx, ny) in neighbours {
                        if nx >= width || ny >= height || visited[ny * width + nx] {
                            continue;
                        }
                        visited[ny * width + nx] = true;
                        if !is_grid(nx, ny) {
                            queue.push_back((nx, ny));
                        }
                    }
                }

                cells.push(Rect::new(
                    min_x,
                    min_y,
                    max_x - min_x + 1,
                    max_y - min_y + 1,
                ));
            }
        }
        cells
    }

    /// Split into fixed-size cells, clipping at the right and bottom edges
    ///
    /// Cells one pixel wide or high (leftover grid lines) are skipped.
    pub fn grid_by_size(&self, cell_width: usize, cell_height: usize) -> Vec<Rect> {
        let mut cells = Vec::new();
        if cell_width == 0 || cell_height == 0 {
            return cells;
        }
        for y in (0..self.height).step_by(cell_height) {
            for x in (0..self.width).step_by(cell_width) {
                let width = cell_width.min(self.width - x);
                let height = cell_height.min(self.height - y);
                if width <= 1 || height <= 1 {
                    continue;
                }
                cells.push(Rect::new(x, y, width, height));
            }
        }
        cells
    }

    /// Region of the character cell containing (x, y)
    ///
    /// Scans left and up until a boundary or separator pixel, right and
    /// down until a boundary pixel. Degenerate regions yield the whole image.
    pub fn find_character_region(&self, x: usize, y: usize) -> Rect {
        let whole = Rect::new(0, 0, self.width, self.height);
        if x >= self.width || y >= self.height {
            return whole;
        }
        let is_boundary = |px: usize, py: usize| self.pixel(px, py) == BOUNDARY_COLOR;
        let is_stop = |px: usize, py: usize| {
            let c = self.pixel(px, py);
            c == BOUNDARY_COLOR || c == SEPARATOR_COLOR
        };

        let mut left = x;
        while left > 0 && !is_stop(left - 1, y) {
            left -= 1;
        }
        let mut top = y;
        while top > 0 && !is_stop(x, top - 1) {
            top -= 1;
        }
        let mut right = x;
        while right + 1 < self.width && !is_boundary(right + 1, y) {
            right += 1;
        }
        let mut bottom = y;
        while bottom + 1 < self.height && !is_boundary(x, bottom + 1) {
            bottom += 1;
        }

        if left >= right || top >= bottom {
            return whole;
        }
        Rect::new(left, top, right - left + 1, bottom - top + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_image() -> RgbImage {
        // 7x4: yellow column at x=3, two 3x4 cells
        let mut image = RgbImage::filled(7, 4, [0, 0, 0]);
        for y in 0..4 {
            image.set_pixel(3, y, SEPARATOR_COLOR);
        }
        image
    }

    #[test]
    fn test_grid_by_color() {
        let cells = grid_image().grid_by_color(SEPARATOR_COLOR);
        assert_eq!(cells, vec![Rect::new(0, 0, 3, 4), Rect::new(4, 0, 3, 4)]);
    }

    #[test]
    fn test_grid_by_color_l_shape() {
        let mut image = RgbImage::filled(4, 4, SEPARATOR_COLOR);
        image.set_pixel(0, 0, [1, 1, 1]);
        image.set_pixel(0, 1, [1, 1, 1]);
        image.set_pixel(1, 1, [1, 1, 1]);
        image.set_pixel(3, 3, [2, 2, 2]);
        let cells = image.grid_by_color(SEPARATOR_COLOR);
        assert_eq!(cells, vec![Rect::new(0, 0, 2, 2), Rect::new(3, 3, 1, 1)]);
    }

    #[test]
    fn test_grid_by_size() {
        let image = RgbImage::new(10, 5);
        let cells = image.grid_by_size(4, 4);
        // the last column is 2 wide, the last row 1 high and skipped
        assert_eq!(
            cells,
            vec![
                Rect::new(0, 0, 4, 4),
                Rect::new(4, 0, 4, 4),
                Rect::new(8, 0, 2, 4),
            ]
        );
        assert!(image.grid_by_size(0, 4).is_empty());
    }

    #[test]
    fn test_sub_image_and_paste() {
        let mut image = RgbImage::new(4, 4);
        image.set_pixel(2, 1, [9, 8, 7]);
        image.set_alpha(2, 1, 100);
        let sub = image.sub_image(Rect::new(2, 1, 5, 5));
        assert_eq!((sub.width, sub.height), (2, 3));
        assert_eq!(sub.pixel(0, 0), [9, 8, 7]);
        assert_eq!(sub.alpha_at(0, 0), 100);

        let mut target = RgbImage::new(3, 3);
        target.paste(&sub, 1, 1);
        assert_eq!(target.pixel(1, 1), [9, 8, 7]);
        assert_eq!(target.alpha_at(1, 1), 100);
    }

    #[test]
    fn test_find_character_region() {
        let mut image = RgbImage::filled(8, 8, [0, 0, 0]);
        for i in 0..8 {
            image.set_pixel(i, 0, BOUNDARY_COLOR);
            image.set_pixel(0, i, SEPARATOR_COLOR);
            image.set_pixel(6, i, BOUNDARY_COLOR);
            image.set_pixel(i, 6, BOUNDARY_COLOR);
        }
        assert_eq!(image.find_character_region(3, 3), Rect::new(1, 1, 5, 5));
        // a point on a one-pixel strip is degenerate
        assert_eq!(image.find_character_region(7, 7), Rect::new(0, 0, 8, 8));
    }

    #[test]
    fn test_brightness_or_alpha() {
        let image = RgbImage::filled(2, 1, [30, 60, 90]);
        assert_eq!(image.brightness_or_alpha(), vec![60, 60]);
    }
}
