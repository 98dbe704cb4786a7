//! PCX image files
//!
//! Reads 24-bit (three planes), 8-bit paletted and 1-bit monochrome
//! images. Writes always produce 24-bit three-plane files.

use std::fs;
use std::path::Path;

use super::palette::{Palette, PALETTE_RGB_BYTES};
use super::RgbImage;
use crate::common::read_u16_le;
use crate::{DatError, Result};

/// Size of the fixed PCX header
pub const PCX_HEADER_SIZE: usize = 128;

/// Manufacturer byte every PCX file starts with
pub const PCX_MANUFACTURER: u8 = 0x0A;

/// Marker byte in front of the trailing 256-colour palette
pub const PCX_PALETTE_MARKER: u8 = 0x0C;

const RUN_FLAG: u8 = 0xC0;
const MAX_RUN: usize = 63;

/// Decode PCX data into an image
///
/// 8-bit images carry their palette in [`RgbImage::palette`].
pub fn read_pcx(buf: &[u8]) -> Result<RgbImage> {
    if buf.len() < PCX_HEADER_SIZE {
        return Err(DatError::UnexpectedEof);
    }
    if buf[0] != PCX_MANUFACTURER {
        return Err(DatError::Format("not a PCX file".to_string()));
    }

    let xmin = read_u16_le(buf, 4)? as usize;
    let ymin = read_u16_le(buf, 6)? as usize;
    let xmax = read_u16_le(buf, 8)? as usize;
    let ymax = read_u16_le(buf, 10)? as usize;
    if xmax < xmin || ymax < ymin {
        return Err(DatError::Format(format!(
            "invalid PCX window {xmin},{ymin}-{xmax},{ymax}"
        )));
    }
    let width = xmax - xmin + 1;
    let height = ymax - ymin + 1;
    let bits_per_plane = buf[3];
    let planes = buf[65];
    let bytes_per_line = match read_u16_le(buf, 66)? as usize {
        0 => (width + 1) & !1,
        n => n,
    };

    let mut image = RgbImage::new(width, height);
    match (bits_per_plane, planes) {
        (8, 3) => {
            let mut decoder = RunDecoder::new(&buf[PCX_HEADER_SIZE..]);
            let mut line = vec![0u8; bytes_per_line * 3];
            for y in 0..height {
                decoder.scanline(&mut line)?;
                for x in 0..width.min(bytes_per_line) {
                    let r = line[x];
                    let g = line[bytes_per_line + x];
                    let b = line[2 * bytes_per_line + x];
                    image.set_pixel(x, y, [r, g, b]);
                }
            }
        }
        (8, 1) => {
            let palette_start = buf.len().checked_sub(PALETTE_RGB_BYTES + 1);
            let palette_start = match palette_start {
                Some(start) if start >= PCX_HEADER_SIZE && buf[start] == PCX_PALETTE_MARKER => start,
                _ => return Err(DatError::Format("PCX palette missing".to_string())),
            };
            let palette = Palette::from_rgb_bytes(&buf[palette_start + 1..])?;

            let mut decoder = RunDecoder::new(&buf[PCX_HEADER_SIZE..palette_start]);
            let mut line = vec![0u8; bytes_per_line];
            for y in 0..height {
                decoder.scanline(&mut line)?;
                for x in 0..width.min(bytes_per_line) {
                    image.set_pixel(x, y, palette.color(line[x]));
                }
            }
            image.palette = Some(palette);
        }
        (1, 1) => {
            let mut decoder = RunDecoder::new(&buf[PCX_HEADER_SIZE..]);
            let mut line = vec![0u8; bytes_per_line];
            for y in 0..height {
                decoder.scanline(&mut line)?;
                for x in 0..width.min(bytes_per_line * 8) {
                    let set = line[x / 8] & (0x80 >> (x % 8)) != 0;
                    let value = if set { 255 } else { 0 };
                    image.set_pixel(x, y, [value; 3]);
                }
            }
        }
        _ => {
            return Err(DatError::Format(format!(
                "unsupported PCX format: {bits_per_plane} bits, {planes} planes"
            )))
        }
    }
    Ok(image)
}

struct RunDecoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> RunDecoder<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Fill one scanline; runs are clipped to it and missing data is zero
    fn scanline(&mut self, line: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < line.len() {
            let Some(&byte) = self.input.get(self.pos) else {
                line[filled..].fill(0);
                return Ok(());
            };
            self.pos += 1;

            if byte & RUN_FLAG == RUN_FLAG {
                let count = (byte & !RUN_FLAG) as usize;
                let &value = self.input.get(self.pos).ok_or(DatError::UnexpectedEof)?;
                self.pos += 1;
                let end = (filled + count).min(line.len());
                line[filled..end].fill(value);
                filled = end;
            } else {
                line[filled] = byte;
                filled += 1;
            }
        }
        Ok(())
    }
}

/// Encode an image as a 24-bit PCX file
pub fn write_pcx(image: &RgbImage) -> Vec<u8> {
    let (width, height) = (image.width, image.height);
    let bytes_per_line = (width + 1) & !1;

    let mut out = vec![0u8; PCX_HEADER_SIZE];
    out[0] = PCX_MANUFACTURER;
    out[1] = 5;
    out[2] = 1;
    out[3] = 8;
    out[8..10].copy_from_slice(&(width.saturating_sub(1) as u16).to_le_bytes());
    out[10..12].copy_from_slice(&(height.saturating_sub(1) as u16).to_le_bytes());
    out[12..14].copy_from_slice(&72u16.to_le_bytes());
    out[14..16].copy_from_slice(&72u16.to_le_bytes());
    out[65] = 3;
    out[66..68].copy_from_slice(&(bytes_per_line as u16).to_le_bytes());
    out[68..70].copy_from_slice(&1u16.to_le_bytes());

    let mut plane = vec![0u8; bytes_per_line];
    for y in 0..height {
        for channel in 0..3 {
            plane.fill(0);
            for x in 0..width {
                plane[x] = image.pixel(x, y)[channel];
            }
            encode_runs(&plane, &mut out);
        }
    }
    out
}

fn encode_runs(line: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < line.len() {
        let value = line[i];
        let mut run = 1;
        while run < MAX_RUN && i + run < line.len() && line[i + run] == value {
            run += 1;
        }
        if run > 1 || value & RUN_FLAG == RUN_FLAG {
            out.push(RUN_FLAG | run as u8);
        }
        out.push(value);
        i += run;
    }
}

/// Load a PCX file from disk
pub fn load(path: impl AsRef<Path>) -> Result<RgbImage> {
    let buf = fs::read(path)?;
    read_pcx(&buf)
}

/// Save an image as a 24-bit PCX file
pub fn save(path: impl AsRef<Path>, image: &RgbImage) -> Result<()> {
    fs::write(path, write_pcx(image))?;
    Ok(())
}
