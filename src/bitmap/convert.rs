//! Conversions between packed bitmap depths and [`RgbImage`]

use super::palette::{apply_dithering, generate_optimal_palette, Palette, Rgb};
use super::{rle, BitmapData, RgbImage, PALETTE_SCALE};
use crate::common::{
    bytes_per_pixel, is_valid_depth, HICOLOR_15_BIT, REFERENCE_COLOR_1516, TRANSPARENT_COLOR,
    TRANSPARENT_COLOR_15, TRANSPARENT_COLOR_16, TRANSPARENT_INDEX,
};
use crate::tag::Tag;
use crate::{DatError, Result};

/// Magenta stand-in for palette entries that must not turn transparent
const NEAR_TRANSPARENT: Rgb = [255, 1, 255];

/// Options for importing images and changing depth or type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Floyd–Steinberg dither when reducing to 8, 15 or 16 bits
    pub dither: bool,
    /// Keep magenta and alpha-0 pixels transparent for plain bitmaps too
    pub preserve_transparency: bool,
}

/// Expand a 15- or 16-bit pixel value to RGB
pub(crate) fn expand_hicolor(bits: i32, value: u16) -> Rgb {
    let r = (((value >> 11) & 0x1F) << 3) as u8;
    let b = ((value & 0x1F) << 3) as u8;
    let g = if bits == 15 {
        (((value >> 6) & 0x1F) << 3) as u8
    } else {
        (((value >> 5) & 0x3F) << 2) as u8
    };
    [r, g, b]
}

fn pack_15(c: Rgb) -> u16 {
    ((c[0] as u16 >> 3) << 11) | ((c[1] as u16 >> 3) << 6) | (c[2] as u16 >> 3) | HICOLOR_15_BIT
}

fn pack_16(c: Rgb) -> u16 {
    ((c[0] as u16 >> 3) << 11) | ((c[1] as u16 >> 2) << 5) | (c[2] as u16 >> 3)
}

impl BitmapData {
    /// Render to an RGB image
    ///
    /// Palette objects render as a 128x128 swatch grid. With
    /// `preserve_transparency`, transparent pixels of 8/15/16-bit data come
    /// out magenta and real magenta palette entries are nudged off it.
    pub fn to_image(&self, palette: &Palette, preserve_transparency: bool) -> RgbImage {
        if self.is_palette() {
            let colors = self.palette().unwrap_or_default();
            let side = super::PALETTE_GRID as usize * PALETTE_SCALE;
            let mut image = RgbImage::new(side, side);
            for y in 0..side {
                for x in 0..side {
                    let index = (y / PALETTE_SCALE) * 16 + x / PALETTE_SCALE;
                    image.set_pixel(x, y, colors.color(index as u8));
                }
            }
            return image;
        }

        let (width, height) = (self.width.max(0) as usize, self.height.max(0) as usize);
        let bpp = self.bytes_per_pixel();
        let mut image = RgbImage::new(width, height);
        if bpp == 0 {
            return image;
        }

        for (dst, px) in image.rgb.chunks_exact_mut(3).zip(self.data.chunks_exact(bpp)) {
            let rgb = match self.bits {
                8 => {
                    let index = px[0];
                    let color = palette.color(index);
                    if preserve_transparency && index == TRANSPARENT_INDEX {
                        TRANSPARENT_COLOR
                    } else if preserve_transparency && color == TRANSPARENT_COLOR {
                        NEAR_TRANSPARENT
                    } else {
                        color
                    }
                }
                15 | 16 => {
                    let value = u16::from_le_bytes([px[0], px[1]]);
                    if preserve_transparency && rle::is_zero_pixel(self.bits, px) {
                        TRANSPARENT_COLOR
                    } else {
                        expand_hicolor(self.bits, value)
                    }
                }
                _ => [px[0], px[1], px[2]],
            };
            dst.copy_from_slice(&rgb);
        }

        if !self.alpha.is_empty() {
            image.alpha = Some(self.alpha.clone());
        } else if self.bits == 8 && self.is_compiled() {
            image.alpha = Some(
                self.data
                    .iter()
                    .map(|&i| if i == TRANSPARENT_INDEX { 0 } else { 255 })
                    .collect(),
            );
        }
        if self.bits == 8 {
            image.palette = Some(palette.clone());
        }
        image
    }

    /// Build a bitmap-family payload from an RGB image
    ///
    /// `bits == 0` picks -32 for images with alpha and 24 otherwise.
    /// Compiled sprites cannot hold true alpha and fall back to 32 bits.
    /// Importing into a palette object derives an optimal palette.
    pub fn from_image(
        type_id: Tag,
        image: &RgbImage,
        bits: i32,
        palette: &Palette,
        options: ConvertOptions,
    ) -> Result<Self> {
        if image.is_empty() {
            return Err(DatError::Format("cannot import an empty image".to_string()));
        }
        if type_id == Tag::PALETTE {
            let derived = match &image.palette {
                Some(source) => source.clone(),
                None => generate_optimal_palette(image),
            };
            return Ok(Self::from_palette(&derived));
        }

        let mut bits = if bits == 0 {
            if image.alpha.is_some() {
                -32
            } else {
                24
            }
        } else {
            bits
        };
        let compiled = matches!(type_id, Tag::C_SPRITE | Tag::XC_SPRITE);
        if compiled && bits == -32 {
            bits = 32;
        }
        let bpp = bytes_per_pixel(bits)?;

        let sprite = compiled || type_id == Tag::RLE_SPRITE;
        let keep = sprite || options.preserve_transparency;

        let mut work = image.clone();
        if options.dither && matches!(bits, 8 | 15 | 16) {
            apply_dithering(&mut work, bits, palette, keep);
        }

        let pixel_count = image.width * image.height;
        let mut data = Vec::with_capacity(pixel_count * bpp);
        let first_index = if keep { 1 } else { 0 };

        for i in 0..pixel_count {
            let (x, y) = (i % image.width, i / image.width);
            let source = image.pixel(x, y);
            let alpha = image.alpha_at(x, y);
            let transparent = keep && (source == TRANSPARENT_COLOR || alpha == 0);
            let color = work.pixel(x, y);

            match bits {
                8 => data.push(if transparent {
                    TRANSPARENT_INDEX
                } else {
                    palette.nearest(color, first_index)
                }),
                15 | 16 => {
                    let sentinel = if bits == 15 {
                        TRANSPARENT_COLOR_15
                    } else {
                        TRANSPARENT_COLOR_16
                    };
                    let value = if transparent {
                        sentinel
                    } else {
                        let packed = if bits == 15 {
                            pack_15(color)
                        } else {
                            pack_16(color)
                        };
                        if keep && packed == sentinel {
                            REFERENCE_COLOR_1516
                        } else {
                            packed
                        }
                    };
                    data.extend_from_slice(&value.to_le_bytes());
                }
                -32 => {
                    if sprite && transparent {
                        data.extend_from_slice(&[TRANSPARENT_COLOR[0], TRANSPARENT_COLOR[1], TRANSPARENT_COLOR[2], 0]);
                    } else {
                        data.extend_from_slice(&[color[0], color[1], color[2], alpha]);
                    }
                }
                _ => {
                    let rgb = if transparent { TRANSPARENT_COLOR } else { color };
                    data.extend_from_slice(&rgb);
                }
            }
        }

        Self::new(
            type_id,
            bits,
            image.width as i32,
            image.height as i32,
            data,
        )
    }

    /// Change colour depth, going through an RGB image
    ///
    /// Depths that only differ in sign are left alone.
    pub fn set_color_depth(
        &mut self,
        bits: i32,
        palette: &Palette,
        options: ConvertOptions,
    ) -> Result<()> {
        if !is_valid_depth(bits) {
            return Err(DatError::InvalidBitDepth(bits));
        }
        if self.is_palette() {
            return Err(DatError::InvalidData(
                "palette objects have a fixed depth".to_string(),
            ));
        }
        if self.bits.abs() == bits.abs() {
            return Ok(());
        }

        let image = self.to_image(palette, options.preserve_transparency);
        *self = Self::from_image(self.type_id, &image, bits, palette, options)?;
        Ok(())
    }

    /// Re-encode as another bitmap-family type
    pub fn set_type(&mut self, type_id: Tag, palette: &Palette, options: ConvertOptions) -> Result<()> {
        if type_id == self.type_id {
            return Ok(());
        }
        if self.is_palette() {
            return Err(DatError::InvalidData(
                "palette objects cannot change type".to_string(),
            ));
        }
        if !matches!(
            type_id,
            Tag::BITMAP | Tag::RLE_SPRITE | Tag::C_SPRITE | Tag::XC_SPRITE
        ) {
            return Err(DatError::InvalidData(format!(
                "cannot convert a bitmap to {type_id}"
            )));
        }

        let image = self.to_image(palette, true);
        let mut bits = self.bits;
        if matches!(type_id, Tag::C_SPRITE | Tag::XC_SPRITE) && bits == -32 {
            bits = 32;
        }
        *self = Self::from_image(type_id, &image, bits, palette, options)?;
        Ok(())
    }
}
