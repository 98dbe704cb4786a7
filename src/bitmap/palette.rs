//! Palettes, quantization and dithering
//!
//! Everything that maps true-colour pixels onto a 256-entry palette lives
//! here: the standard Allegro palette, nearest-colour search, median-cut
//! palette generation, palette-match scoring and Floyd–Steinberg
//! error diffusion.

use std::collections::{BTreeMap, HashSet};

use super::image::RgbImage;
use crate::common::TRANSPARENT_COLOR;
use crate::{DatError, Result};

/// One 8-bit-per-channel colour
pub type Rgb = [u8; 3];

/// Number of entries in a palette
pub const PALETTE_SIZE: usize = 256;

/// Bytes of a palette stored as packed RGB triples
pub const PALETTE_RGB_BYTES: usize = PALETTE_SIZE * 3;

/// Bytes of a palette object payload (R, G, B, pad per entry)
pub const PALETTE_VGA_BYTES: usize = PALETTE_SIZE * 4;

/// A 256-colour palette
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette(pub [Rgb; PALETTE_SIZE]);

/// The standard Allegro palette; entries 0 and 36 are magenta
pub const DEFAULT_PALETTE: Palette = Palette([
    [255, 0, 255], [0, 0, 170], [0, 170, 0], [0, 170, 170],
    [170, 0, 0], [170, 0, 170], [170, 85, 0], [170, 170, 170],
    [85, 85, 85], [85, 85, 255], [85, 255, 85], [85, 255, 255],
    [255, 85, 85], [255, 85, 255], [255, 255, 85], [255, 255, 255],
    [0, 0, 0], [20, 20, 20], [32, 32, 32], [44, 44, 44],
    [56, 56, 56], [68, 68, 68], [80, 80, 80], [97, 97, 97],
    [113, 113, 113], [129, 129, 129], [145, 145, 145], [161, 161, 161],
    [182, 182, 182], [202, 202, 202], [226, 226, 226], [255, 255, 255],
    [0, 0, 255], [64, 0, 255], [125, 0, 255], [190, 0, 255],
    [255, 0, 255], [255, 0, 190], [255, 0, 125], [255, 0, 64],
    [255, 0, 0], [255, 64, 0], [255, 125, 0], [255, 190, 0],
    [255, 255, 0], [190, 255, 0], [125, 255, 0], [64, 255, 0],
    [0, 255, 0], [0, 255, 64], [0, 255, 125], [0, 255, 190],
    [0, 255, 255], [0, 190, 255], [0, 125, 255], [0, 64, 255],
    [125, 125, 255], [157, 125, 255], [190, 125, 255], [222, 125, 255],
    [255, 125, 255], [255, 125, 222], [255, 125, 190], [255, 125, 157],
    [255, 125, 125], [255, 157, 125], [255, 190, 125], [255, 222, 125],
    [255, 255, 125], [222, 255, 125], [190, 255, 125], [157, 255, 125],
    [125, 255, 125], [125, 255, 157], [125, 255, 190], [125, 255, 222],
    [125, 255, 255], [125, 222, 255], [125, 190, 255], [125, 157, 255],
    [182, 182, 255], [198, 182, 255], [218, 182, 255], [234, 182, 255],
    [255, 182, 255], [255, 182, 234], [255, 182, 218], [255, 182, 198],
    [255, 182, 182], [255, 198, 182], [255, 218, 182], [255, 234, 182],
    [255, 255, 182], [234, 255, 182], [218, 255, 182], [198, 255, 182],
    [182, 255, 182], [182, 255, 198], [182, 255, 218], [182, 255, 234],
    [182, 255, 255], [182, 234, 255], [182, 218, 255], [182, 198, 255],
    [0, 0, 113], [28, 0, 113], [56, 0, 113], [85, 0, 113],
    [113, 0, 113], [113, 0, 85], [113, 0, 56], [113, 0, 28],
    [113, 0, 0], [113, 28, 0], [113, 56, 0], [113, 85, 0],
    [113, 113, 0], [85, 113, 0], [56, 113, 0], [28, 113, 0],
    [0, 113, 0], [0, 113, 28], [0, 113, 56], [0, 113, 85],
    [0, 113, 113], [0, 85, 113], [0, 56, 113], [0, 28, 113],
    [56, 56, 113], [68, 56, 113], [85, 56, 113], [97, 56, 113],
    [113, 56, 113], [113, 56, 97], [113, 56, 85], [113, 56, 68],
    [113, 56, 56], [113, 68, 56], [113, 85, 56], [113, 97, 56],
    [113, 113, 56], [97, 113, 56], [85, 113, 56], [68, 113, 56],
    [56, 113, 56], [56, 113, 68], [56, 113, 85], [56, 113, 97],
    [56, 113, 113], [56, 97, 113], [56, 85, 113], [56, 68, 113],
    [80, 80, 113], [89, 80, 113], [97, 80, 113], [105, 80, 113],
    [113, 80, 113], [113, 80, 105], [113, 80, 97], [113, 80, 89],
    [113, 80, 80], [113, 89, 80], [113, 97, 80], [113, 105, 80],
    [113, 113, 80], [105, 113, 80], [97, 113, 80], [89, 113, 80],
    [80, 113, 80], [80, 113, 89], [80, 113, 97], [80, 113, 105],
    [80, 113, 113], [80, 105, 113], [80, 97, 113], [80, 89, 113],
    [0, 0, 64], [16, 0, 64], [32, 0, 64], [48, 0, 64],
    [64, 0, 64], [64, 0, 48], [64, 0, 32], [64, 0, 16],
    [64, 0, 0], [64, 16, 0], [64, 32, 0], [64, 48, 0],
    [64, 64, 0], [48, 64, 0], [32, 64, 0], [16, 64, 0],
    [0, 64, 0], [0, 64, 16], [0, 64, 32], [0, 64, 48],
    [0, 64, 64], [0, 48, 64], [0, 32, 64], [0, 16, 64],
    [32, 32, 64], [40, 32, 64], [48, 32, 64], [56, 32, 64],
    [64, 32, 64], [64, 32, 56], [64, 32, 48], [64, 32, 40],
    [64, 32, 32], [64, 40, 32], [64, 48, 32], [64, 56, 32],
    [64, 64, 32], [56, 64, 32], [48, 64, 32], [40, 64, 32],
    [32, 64, 32], [32, 64, 40], [32, 64, 48], [32, 64, 56],
    [32, 64, 64], [32, 56, 64], [32, 48, 64], [32, 40, 64],
    [44, 44, 64], [48, 44, 64], [52, 44, 64], [60, 44, 64],
    [64, 44, 64], [64, 44, 60], [64, 44, 52], [64, 44, 48],
    [64, 44, 44], [64, 48, 44], [64, 52, 44], [64, 60, 44],
    [64, 64, 44], [60, 64, 44], [52, 64, 44], [48, 64, 44],
    [44, 64, 44], [44, 64, 48], [44, 64, 52], [44, 64, 60],
    [44, 64, 64], [44, 60, 64], [44, 52, 64], [44, 48, 64],
    [0, 0, 0], [0, 0, 0], [0, 0, 0], [0, 0, 0],
    [0, 0, 0], [0, 0, 0], [0, 0, 0], [255, 255, 255],
]);

impl Default for Palette {
    fn default() -> Self {
        DEFAULT_PALETTE
    }
}

impl Palette {
    /// Build a palette from packed RGB triples
    ///
    /// Shorter inputs leave the remaining entries black.
    pub fn from_rgb_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > PALETTE_RGB_BYTES || bytes.len() % 3 != 0 {
            return Err(DatError::SizeMismatch {
                expected: PALETTE_RGB_BYTES,
                actual: bytes.len(),
            });
        }
        let mut colors = [[0u8; 3]; PALETTE_SIZE];
        for (dst, src) in colors.iter_mut().zip(bytes.chunks_exact(3)) {
            dst.copy_from_slice(src);
        }
        Ok(Palette(colors))
    }

    /// Packed RGB triples, 768 bytes
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.0.iter().flatten().copied().collect()
    }

    /// Colour at `index`
    #[inline]
    pub fn color(&self, index: u8) -> Rgb {
        self.0[index as usize]
    }

    /// Index of the closest colour by squared RGB distance
    ///
    /// Entries below `start` are skipped; ties resolve to the lower index.
    pub fn nearest(&self, rgb: Rgb, start: usize) -> u8 {
        let mut best_index = start.min(PALETTE_SIZE - 1);
        let mut best_distance = u32::MAX;
        for (i, entry) in self.0.iter().enumerate().skip(start) {
            let distance = color_distance(rgb, *entry);
            if distance < best_distance {
                best_distance = distance;
                best_index = i;
                if distance == 0 {
                    break;
                }
            }
        }
        best_index as u8
    }
}

/// Squared Euclidean distance in RGB space
#[inline]
pub fn color_distance(a: Rgb, b: Rgb) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// Build a palette for `image` with median cut over its exact colours
///
/// Images with at most 256 distinct colours get them verbatim, in order of
/// first appearance.
pub fn generate_optimal_palette(image: &RgbImage) -> Palette {
    let mut seen = HashSet::new();
    let mut unique: Vec<Rgb> = Vec::new();
    for pixel in image.pixels() {
        if seen.insert(pixel) {
            unique.push(pixel);
        }
    }

    let mut colors = [[0u8; 3]; PALETTE_SIZE];
    if unique.len() <= PALETTE_SIZE {
        colors[..unique.len()].copy_from_slice(&unique);
        return Palette(colors);
    }

    let mut buckets: Vec<Vec<Rgb>> = vec![unique];
    while buckets.len() < PALETTE_SIZE {
        let mut split: Option<(usize, usize)> = None;
        let mut widest = -1i32;
        for (i, bucket) in buckets.iter().enumerate() {
            if bucket.len() <= 1 {
                continue;
            }
            for channel in 0..3 {
                let (lo, hi) = bucket.iter().fold((255u8, 0u8), |(lo, hi), c| {
                    (lo.min(c[channel]), hi.max(c[channel]))
                });
                let range = (hi - lo) as i32;
                if range > widest {
                    widest = range;
                    split = Some((i, channel));
                }
            }
        }

        let Some((index, channel)) = split else {
            break;
        };
        let bucket = &mut buckets[index];
        bucket.sort_by_key(|c| c[channel]);
        let upper = bucket.split_off(bucket.len() / 2);
        buckets.push(upper);
    }

    for (dst, bucket) in colors.iter_mut().zip(&buckets) {
        if bucket.is_empty() {
            continue;
        }
        let mut sum = [0u64; 3];
        for c in bucket {
            for channel in 0..3 {
                sum[channel] += c[channel] as u64;
            }
        }
        let n = bucket.len() as u64;
        *dst = [(sum[0] / n) as u8, (sum[1] / n) as u8, (sum[2] / n) as u8];
    }
    Palette(colors)
}

/// Score how well `palette` represents `image`
///
/// # Returns
/// A value in `[0, 1]` (1 = every colour present exactly) and the chosen
/// palette index for every distinct image colour.
pub fn calculate_palette_match(image: &RgbImage, palette: &Palette) -> (f64, BTreeMap<Rgb, u8>) {
    let mut frequencies: BTreeMap<Rgb, u64> = BTreeMap::new();
    for pixel in image.pixels() {
        *frequencies.entry(pixel).or_insert(0) += 1;
    }

    let total_pixels: u64 = frequencies.values().sum();
    let mut mapping = BTreeMap::new();
    if total_pixels == 0 {
        return (0.0, mapping);
    }

    let mut total_distance = 0f64;
    for (&color, &count) in &frequencies {
        let index = palette.nearest(color, 0);
        mapping.insert(color, index);
        total_distance += color_distance(color, palette.color(index)) as f64 * count as f64;
    }

    let size = PALETTE_SIZE as f64;
    let max_distance = size * size * 3.0 * total_pixels as f64;
    (1.0 - total_distance / max_distance, mapping)
}

fn quantize(rgb: [i32; 3], bits: i32, palette: &Palette) -> [i32; 3] {
    match bits {
        8 => {
            let c = palette.color(palette.nearest([rgb[0] as u8, rgb[1] as u8, rgb[2] as u8], 0));
            [c[0] as i32, c[1] as i32, c[2] as i32]
        }
        15 => [rgb[0] >> 3 << 3, rgb[1] >> 3 << 3, rgb[2] >> 3 << 3],
        16 => [rgb[0] >> 3 << 3, rgb[1] >> 2 << 2, rgb[2] >> 3 << 3],
        _ => rgb,
    }
}

/// Floyd–Steinberg dithering of `image` towards depth `bits`
///
/// 8-bit targets quantize against `palette`, 15/16-bit targets truncate
/// channel bits; other depths leave the image unchanged. Magenta pixels
/// keep their colour when `keep_transparent` is set.
pub fn apply_dithering(image: &mut RgbImage, bits: i32, palette: &Palette, keep_transparent: bool) {
    if !matches!(bits, 8 | 15 | 16) {
        return;
    }

    let (width, height) = (image.width, image.height);
    let mut error = vec![[0i32; 3]; width * height];

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let src = image.pixel(x, y);
            if keep_transparent && src == TRANSPARENT_COLOR {
                continue;
            }

            let old = [
                (src[0] as i32 + error[i][0]).clamp(0, 255),
                (src[1] as i32 + error[i][1]).clamp(0, 255),
                (src[2] as i32 + error[i][2]).clamp(0, 255),
            ];
            let new = quantize(old, bits, palette);
            image.set_pixel(x, y, [new[0] as u8, new[1] as u8, new[2] as u8]);

            let diff = [old[0] - new[0], old[1] - new[1], old[2] - new[2]];
            let mut spread = |nx: usize, ny: usize, weight: i32| {
                let e = &mut error[ny * width + nx];
                for c in 0..3 {
                    e[c] += diff[c] * weight / 16;
                }
            };
            if x + 1 < width {
                spread(x + 1, y, 7);
            }
            if y + 1 < height {
                if x > 0 {
                    spread(x - 1, y + 1, 3);
                }
                spread(x, y + 1, 5);
                if x + 1 < width {
                    spread(x + 1, y + 1, 1);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_palette() {
        assert_eq!(DEFAULT_PALETTE.color(0), TRANSPARENT_COLOR);
        assert_eq!(DEFAULT_PALETTE.color(36), TRANSPARENT_COLOR);
        assert_eq!(DEFAULT_PALETTE.color(1), [0, 0, 170]);
        assert_eq!(DEFAULT_PALETTE.to_rgb_bytes().len(), PALETTE_RGB_BYTES);
    }

    #[test]
    fn test_nearest() {
        assert_eq!(DEFAULT_PALETTE.nearest([255, 0, 255], 0), 0);
        assert_eq!(DEFAULT_PALETTE.nearest([255, 0, 255], 1), 36);
        assert_eq!(DEFAULT_PALETTE.nearest([0, 0, 168], 0), 1);
    }

    #[test]
    fn test_rgb_bytes_round_trip() {
        let bytes = DEFAULT_PALETTE.to_rgb_bytes();
        assert_eq!(Palette::from_rgb_bytes(&bytes).unwrap(), DEFAULT_PALETTE);
        assert!(Palette::from_rgb_bytes(&[0u8; 769]).is_err());
    }

    #[test]
    fn test_optimal_palette_few_colors() {
        let mut image = RgbImage::new(2, 2);
        image.set_pixel(0, 0, [10, 20, 30]);
        image.set_pixel(1, 0, [40, 50, 60]);
        let palette = generate_optimal_palette(&image);
        // first appearance order: (10,20,30), (40,50,60), black
        assert_eq!(palette.color(0), [10, 20, 30]);
        assert_eq!(palette.color(1), [40, 50, 60]);
        assert_eq!(palette.color(2), [0, 0, 0]);
        assert_eq!(palette.color(3), [0, 0, 0]);
    }

    #[test]
    fn test_optimal_palette_median_cut() {
        let mut image = RgbImage::new(32, 32);
        for y in 0..32 {
            for x in 0..32 {
                image.set_pixel(x, y, [(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8]);
            }
        }
        let palette = generate_optimal_palette(&image);
        let (score, mapping) = calculate_palette_match(&image, &palette);
        assert_eq!(mapping.len(), 1024);
        assert!(score > 0.99, "score {score}");
    }

    #[test]
    fn test_palette_match_exact() {
        let mut image = RgbImage::new(3, 1);
        image.set_pixel(0, 0, DEFAULT_PALETTE.color(5));
        image.set_pixel(1, 0, DEFAULT_PALETTE.color(9));
        image.set_pixel(2, 0, DEFAULT_PALETTE.color(9));
        let (score, mapping) = calculate_palette_match(&image, &DEFAULT_PALETTE);
        assert_eq!(score, 1.0);
        assert_eq!(mapping[&DEFAULT_PALETTE.color(9)], 9);
    }

    #[test]
    fn test_dither_16_bit_quantizes() {
        let mut image = RgbImage::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                image.set_pixel(x, y, [123, 77, 201]);
            }
        }
        apply_dithering(&mut image, 16, &DEFAULT_PALETTE, false);
        for pixel in image.pixels() {
            assert_eq!(pixel[0] & 0x07, 0);
            assert_eq!(pixel[1] & 0x03, 0);
            assert_eq!(pixel[2] & 0x07, 0);
        }
    }

    #[test]
    fn test_dither_8_bit_uses_palette() {
        let mut image = RgbImage::new(3, 3);
        for y in 0..3 {
            for x in 0..3 {
                image.set_pixel(x, y, [100, 100, 100]);
            }
        }
        apply_dithering(&mut image, 8, &DEFAULT_PALETTE, false);
        for pixel in image.pixels() {
            assert!(DEFAULT_PALETTE.0.contains(&pixel));
        }
    }
}
