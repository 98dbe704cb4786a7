//! Bitmap, sprite and palette objects
//!
//! This module owns the payload codecs of the bitmap-family object types
//! (`BMP `, `RLE `, `CMP `, `XCMP`, `PAL `) and the pixel-format
//! conversions between packed depths and [`RgbImage`].

mod convert;
pub mod image;
pub mod palette;
pub mod pcx;
pub mod rle;

pub use convert::ConvertOptions;
pub use image::{Rect, RgbImage};
pub use palette::{Palette, Rgb, DEFAULT_PALETTE};

use std::collections::BTreeMap;

use crate::common::{bytes_per_pixel, read_u16_be, TRANSPARENT_COLOR};
use crate::tag::Tag;
use crate::{DatError, Result};
use palette::{PALETTE_SIZE, PALETTE_VGA_BYTES};

/// Size of the plain bitmap header
pub const BITMAP_HEADER_SIZE: usize = 6;

/// Width and height of the grid a palette object is stored as
pub const PALETTE_GRID: i32 = 16;

/// Pixels per palette entry when a palette is rendered as an image
pub const PALETTE_SCALE: usize = 8;

/// Width and height of the sample bitmap
const SAMPLE_SIZE: usize = 32;

/// Decoded bitmap-family payload
///
/// `data` holds `width * height * bytes_per_pixel(bits)` bytes in row-major
/// order. 15/16-bit pixels are little-endian. `alpha` is derived from the
/// pixels: empty for opaque formats, one byte per pixel for sprites and
/// true-alpha bitmaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapData {
    /// Object type this payload belongs to
    pub type_id: Tag,
    /// Colour depth: 8, 15, 16, 24, 32 or -32
    pub bits: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
    /// Packed pixels
    pub data: Vec<u8>,
    /// Per-pixel alpha, empty when the format has none
    pub alpha: Vec<u8>,
}

impl BitmapData {
    /// Create a bitmap from packed pixels, deriving the alpha plane
    pub fn new(type_id: Tag, bits: i32, width: i32, height: i32, data: Vec<u8>) -> Result<Self> {
        let bpp = bytes_per_pixel(bits)?;
        if width <= 0 || height <= 0 || width > u16::MAX as i32 || height > u16::MAX as i32 {
            return Err(DatError::Format(format!(
                "invalid bitmap size {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize * bpp;
        if data.len() != expected {
            return Err(DatError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        let mut bitmap = Self {
            type_id,
            bits,
            width,
            height,
            data,
            alpha: Vec::new(),
        };
        bitmap.refresh_alpha();
        Ok(bitmap)
    }

    /// Decode a payload of the given bitmap-family type
    pub fn parse(buf: &[u8], type_id: Tag) -> Result<Self> {
        match type_id {
            Tag::PALETTE => Self::parse_palette(buf),
            Tag::RLE_SPRITE => {
                let sprite = rle::decode(buf)?;
                Self::new(type_id, sprite.bits, sprite.width, sprite.height, sprite.data)
            }
            _ => {
                if buf.len() < BITMAP_HEADER_SIZE {
                    return Err(DatError::UnexpectedEof);
                }
                let bits = read_u16_be(buf, 0)? as i16 as i32;
                let width = read_u16_be(buf, 2)? as i32;
                let height = read_u16_be(buf, 4)? as i32;
                let bpp = bytes_per_pixel(bits)?;
                let expected = width as usize * height as usize * bpp;
                let actual = buf.len() - BITMAP_HEADER_SIZE;
                if actual != expected {
                    return Err(DatError::SizeMismatch { expected, actual });
                }
                Self::new(type_id, bits, width, height, buf[BITMAP_HEADER_SIZE..].to_vec())
            }
        }
    }

    fn parse_palette(buf: &[u8]) -> Result<Self> {
        if buf.len() != PALETTE_VGA_BYTES {
            return Err(DatError::SizeMismatch {
                expected: PALETTE_VGA_BYTES,
                actual: buf.len(),
            });
        }
        let data = buf
            .chunks_exact(4)
            .flat_map(|entry| [entry[0].wrapping_mul(4), entry[1].wrapping_mul(4), entry[2].wrapping_mul(4)])
            .collect();
        Self::new(Tag::PALETTE, 24, PALETTE_GRID, PALETTE_GRID, data)
    }

    /// Encode the payload for the owning object's type
    pub fn serialize(&self) -> Result<Vec<u8>> {
        match self.type_id {
            Tag::PALETTE => Ok(self
                .data
                .chunks_exact(3)
                .take(PALETTE_SIZE)
                .flat_map(|c| [c[0] / 4, c[1] / 4, c[2] / 4, 0])
                .collect()),
            Tag::RLE_SPRITE => rle::encode(self.bits, self.width, self.height, &self.data),
            _ => {
                let mut out = Vec::with_capacity(BITMAP_HEADER_SIZE + self.data.len());
                out.extend_from_slice(&(self.bits as i16).to_be_bytes());
                out.extend_from_slice(&(self.width as u16).to_be_bytes());
                out.extend_from_slice(&(self.height as u16).to_be_bytes());
                out.extend_from_slice(&self.data);
                Ok(out)
            }
        }
    }

    /// Create a palette object from a palette
    pub fn from_palette(palette: &Palette) -> Self {
        Self {
            type_id: Tag::PALETTE,
            bits: 24,
            width: PALETTE_GRID,
            height: PALETTE_GRID,
            data: palette.to_rgb_bytes(),
            alpha: Vec::new(),
        }
    }

    /// Create a palette object from 768 packed RGB bytes
    ///
    /// Any other length falls back to the default palette.
    pub fn from_palette_bytes(bytes: &[u8]) -> Self {
        match Palette::from_rgb_bytes(bytes) {
            Ok(palette) if bytes.len() == palette::PALETTE_RGB_BYTES => Self::from_palette(&palette),
            _ => {
                log::warn!(
                    "palette data has {} bytes, using the default palette",
                    bytes.len()
                );
                Self::from_palette(&DEFAULT_PALETTE)
            }
        }
    }

    /// The palette stored in a palette object
    pub fn palette(&self) -> Option<Palette> {
        if !self.is_palette() {
            return None;
        }
        Palette::from_rgb_bytes(&self.data[..self.data.len().min(palette::PALETTE_RGB_BYTES)]).ok()
    }

    /// A small placeholder image for a freshly created object
    pub fn sample(type_id: Tag) -> Result<Self> {
        if type_id == Tag::PALETTE {
            return Ok(Self::from_palette(&DEFAULT_PALETTE));
        }

        let sprite = matches!(type_id, Tag::RLE_SPRITE | Tag::C_SPRITE | Tag::XC_SPRITE);
        let mut image = RgbImage::new(SAMPLE_SIZE, SAMPLE_SIZE);
        for y in 0..SAMPLE_SIZE {
            for x in 0..SAMPLE_SIZE {
                let inside = (2 * x as i32 - 31).abs() + (2 * y as i32 - 31).abs() <= 24;
                if inside {
                    image.set_pixel(x, y, [0, 0, 255]);
                } else if sprite {
                    image.set_pixel(x, y, TRANSPARENT_COLOR);
                    image.set_alpha(x, y, 0);
                }
            }
        }

        let bits = if matches!(type_id, Tag::C_SPRITE | Tag::XC_SPRITE) {
            8
        } else {
            24
        };
        Self::from_image(
            type_id,
            &image,
            bits,
            &DEFAULT_PALETTE,
            ConvertOptions::default(),
        )
    }

    /// True for palette objects
    pub fn is_palette(&self) -> bool {
        self.type_id == Tag::PALETTE
    }

    /// True for compiled and mode-X compiled sprites
    pub fn is_compiled(&self) -> bool {
        matches!(self.type_id, Tag::C_SPRITE | Tag::XC_SPRITE)
    }

    /// Bytes per packed pixel
    pub fn bytes_per_pixel(&self) -> usize {
        bytes_per_pixel(self.bits).unwrap_or(0)
    }

    fn pixel_count(&self) -> usize {
        self.width.max(0) as usize * self.height.max(0) as usize
    }

    /// True for bitmaps and RLE sprites carrying a real alpha channel
    pub fn has_alpha_channel(&self) -> bool {
        matches!(self.type_id, Tag::BITMAP | Tag::RLE_SPRITE)
            && self.bits == -32
            && self.alpha.len() == self.pixel_count()
    }

    /// Recompute `alpha` from the pixel data
    ///
    /// True-alpha pixels copy their fourth byte. RLE sprites, and compiled
    /// sprites above 8 bits, mark the depth's transparent colour with 0.
    /// At 8 bits that colour is index 0 whatever the palette holds there,
    /// matching what zero runs decode to.
    pub fn refresh_alpha(&mut self) {
        let bpp = self.bytes_per_pixel();
        self.alpha = if bpp == 0 || self.is_palette() {
            Vec::new()
        } else if self.bits == -32 {
            self.data.chunks_exact(4).map(|p| p[3]).collect()
        } else if self.type_id == Tag::RLE_SPRITE || (self.is_compiled() && self.bits != 8) {
            self.data
                .chunks_exact(bpp)
                .map(|p| if rle::is_zero_pixel(self.bits, p) { 0 } else { 255 })
                .collect()
        } else {
            Vec::new()
        };
    }

    /// One-line description for listings
    pub fn caption(&self) -> String {
        if self.is_palette() {
            return "Palette".to_string();
        }

        let size = self.data.len();
        let human = if size > 1024 * 1024 {
            format!("{:.2} MB", size as f64 / (1024.0 * 1024.0))
        } else if size > 1024 {
            format!("{:.2} KB", size as f64 / 1024.0)
        } else {
            format!("{size} B")
        };

        let (kind, alpha) = match self.type_id {
            Tag::RLE_SPRITE => ("RLE sprite", self.bits == -32),
            Tag::C_SPRITE => ("Compiled sprite", false),
            Tag::XC_SPRITE if self.bits == 8 => ("Mode-X compiled sprite", false),
            Tag::XC_SPRITE => return format!("!!! {} bit XC sprite not possible !!!", self.bits),
            _ => ("Bitmap", self.bits == -32),
        };

        format!(
            "{} ({}x{}, {} bit){} size: {}",
            kind,
            self.width,
            self.height,
            self.bits.abs(),
            if alpha { " +alpha," } else { "" },
            human
        )
    }

    /// True if every pixel is identical (or there are none)
    pub fn is_monocolor(&self) -> bool {
        let bpp = self.bytes_per_pixel();
        if bpp == 0 || self.data.is_empty() {
            return bpp != 0;
        }
        let first = &self.data[..bpp];
        self.data.chunks_exact(bpp).all(|p| p == first)
    }

    fn color_key(&self, pixel: &[u8]) -> Vec<u8> {
        match self.bits {
            15 | 16 => convert::expand_hicolor(self.bits, u16::from_le_bytes([pixel[0], pixel[1]])).to_vec(),
            24 | 32 => pixel[..3].to_vec(),
            _ => pixel.to_vec(),
        }
    }

    /// Crop away the border made of the most common colour
    ///
    /// # Returns
    /// The offset of the kept area, or `None` if nothing was cropped
    pub fn auto_crop(&mut self) -> Option<(usize, usize)> {
        let bpp = self.bytes_per_pixel();
        let (width, height) = (self.width.max(0) as usize, self.height.max(0) as usize);
        if bpp == 0 || self.is_palette() || width == 0 || height == 0 {
            return None;
        }

        let mut counts: BTreeMap<Vec<u8>, usize> = BTreeMap::new();
        for pixel in self.data.chunks_exact(bpp) {
            *counts.entry(self.color_key(pixel)).or_insert(0) += 1;
        }
        let mut dominant: Option<&Vec<u8>> = None;
        let mut max_count = 0;
        for (key, &count) in &counts {
            if count > max_count {
                max_count = count;
                dominant = Some(key);
            }
        }
        let dominant = dominant?.clone();

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (width, height, 0, 0);
        for (i, pixel) in self.data.chunks_exact(bpp).enumerate() {
            if self.color_key(pixel) != dominant {
                let (x, y) = (i % width, i / width);
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        let found = min_x <= max_x && min_y <= max_y;
        let smaller = min_x > 0 || min_y > 0 || max_x + 1 < width || max_y + 1 < height;
        if !found || !smaller {
            return None;
        }

        let crop_width = max_x - min_x + 1;
        let crop_height = max_y - min_y + 1;
        let mut data = Vec::with_capacity(crop_width * crop_height * bpp);
        for y in min_y..=max_y {
            let start = (y * width + min_x) * bpp;
            data.extend_from_slice(&self.data[start..start + crop_width * bpp]);
        }
        self.width = crop_width as i32;
        self.height = crop_height as i32;
        self.data = data;
        self.refresh_alpha();
        Some((min_x, min_y))
    }

    /// Convert a true-alpha bitmap to 32-bit, dropping the alpha bytes
    pub fn delete_alpha(&mut self) {
        if self.bits != -32 {
            return;
        }
        self.data = self
            .data
            .chunks_exact(4)
            .flat_map(|p| [p[0], p[1], p[2]])
            .collect();
        self.bits = 32;
        self.refresh_alpha();
    }

    /// Greyscale view of the alpha channel, white if there is none
    pub fn alpha_as_image(&self) -> RgbImage {
        let (width, height) = (self.width.max(0) as usize, self.height.max(0) as usize);
        let mut image = RgbImage::filled(width, height, [255, 255, 255]);
        if self.has_alpha_channel() {
            for (i, &a) in self.alpha.iter().enumerate() {
                image.set_pixel(i % width, i / width, [a, a, a]);
            }
        }
        image
    }

    /// Replace the alpha channel with the brightness of `image`
    ///
    /// The bitmap is first converted to -32 bits. Pixels outside `image`
    /// become opaque.
    pub fn import_alpha(&mut self, image: &RgbImage, palette: &Palette) -> Result<()> {
        if self.is_palette() || self.is_compiled() {
            return Err(DatError::InvalidData(format!(
                "{} objects cannot carry an alpha channel",
                self.type_id
            )));
        }

        let (width, height) = (self.width as usize, self.height as usize);
        if self.bits != -32 {
            let rgb = self.to_image(palette, false);
            self.data = rgb.pixels().flat_map(|c| [c[0], c[1], c[2], 255]).collect();
            self.bits = -32;
        }

        let brightness = image.brightness_or_alpha();
        for y in 0..height {
            for x in 0..width {
                let value = if x < image.width && y < image.height {
                    brightness[y * image.width + x]
                } else {
                    255
                };
                self.data[(y * width + x) * 4 + 3] = value;
            }
        }
        self.refresh_alpha();
        Ok(())
    }
}
