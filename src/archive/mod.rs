//! Archive objects and the container codec
//!
//! A datafile is a list of [`ArchiveObject`]s. Each object carries a type
//! tag, an ordered property table and a payload that is either decoded
//! (bitmap, font, nested datafile) or kept as opaque bytes.
//!
//! The submodules implement the three layers of the format:
//!
//! - [`parser`]: object records to objects, recursing into nested files
//! - [`writer`]: the exact inverse of the parser
//! - [`packfile`]: the magic, password and compression envelope

pub mod packfile;
pub mod parser;
pub mod writer;

pub use packfile::{backup_path, decode_packfile, encode_packfile, load, save, SaveOptions};
pub use parser::{parse_objects, MAX_NESTING_DEPTH};
pub use writer::serialize_objects;

use std::fs;
use std::path::Path;

use crate::bitmap::{BitmapData, ConvertOptions, Palette};
use crate::font::{FontData, Glyph, Range, FIRST_PRINTABLE, LAST_PRINTABLE};
use crate::tag::Tag;
use crate::Result;

/// Format of the `DATE` property
pub const DATE_FORMAT: &str = "%m-%d-%Y, %H:%M";

/// Decoded payload of an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Opaque bytes: audio, video, `info`, unknown types and failed decodes
    Raw(Vec<u8>),
    /// Bitmap-family payload
    Bitmap(BitmapData),
    /// Font payload
    Font(FontData),
    /// Nested datafile
    Nested(Vec<ArchiveObject>),
}

impl Payload {
    /// Encode the payload bytes as stored after the object header
    pub fn serialize(&self) -> Result<Vec<u8>> {
        match self {
            Payload::Raw(bytes) => Ok(bytes.clone()),
            Payload::Bitmap(bitmap) => bitmap.serialize(),
            Payload::Font(font) => font.serialize(),
            Payload::Nested(objects) => serialize_objects(objects),
        }
    }

    /// Short name of the payload kind
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Raw(_) => "raw",
            Payload::Bitmap(_) => "bitmap",
            Payload::Font(_) => "font",
            Payload::Nested(_) => "nested",
        }
    }
}

/// Result of refreshing an object from its source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The payload was replaced and `DATE` stamped
    Updated,
    /// Nothing changed; the message says why
    Skipped(String),
}

/// One object of a datafile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveObject {
    /// Object type
    pub type_id: Tag,
    properties: Vec<(Tag, Vec<u8>)>,
    name: String,
    /// Decoded payload
    pub payload: Payload,
    /// Stored uncompressed size of raw payloads, 0 for decoded ones
    pub uncompressed_size: i32,
}

impl ArchiveObject {
    /// Create an object without properties
    pub fn new(type_id: Tag, payload: Payload) -> Self {
        let uncompressed_size = match &payload {
            Payload::Raw(bytes) => bytes.len() as i32,
            _ => 0,
        };
        Self {
            type_id,
            properties: Vec::new(),
            name: String::new(),
            payload,
            uncompressed_size,
        }
    }

    /// Create a fresh object of `type_id` with a placeholder payload
    ///
    /// The object is named after its type and stamped with `DATE`. Audio
    /// and video objects start out empty.
    pub fn new_object(type_id: Tag) -> Result<Self> {
        let payload = if type_id == Tag::FILE {
            Payload::Nested(Vec::new())
        } else if type_id == Tag::FONT {
            Payload::Font(blank_font())
        } else if type_id.is_bitmap() {
            Payload::Bitmap(BitmapData::sample(type_id)?)
        } else {
            Payload::Raw(Vec::new())
        };

        let mut object = Self::new(type_id, payload);
        object.set_name(default_name(type_id));
        object.touch();
        Ok(object)
    }

    /// Create a palette object named "Palette" from 768 RGB bytes
    pub fn from_palette(bytes: &[u8]) -> Self {
        let mut object = Self::new(
            Tag::PALETTE,
            Payload::Bitmap(BitmapData::from_palette_bytes(bytes)),
        );
        object.set_name("Palette");
        object.touch();
        object
    }

    /// Object name, mirrored from the `NAME` property
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the `NAME` property
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.set_property(Tag::NAME, name.into().into_bytes());
    }

    /// Properties in stored order
    pub fn properties(&self) -> &[(Tag, Vec<u8>)] {
        &self.properties
    }

    /// Raw value of a property
    pub fn property(&self, id: Tag) -> Option<&[u8]> {
        self.properties
            .iter()
            .find(|(tag, _)| *tag == id)
            .map(|(_, value)| value.as_slice())
    }

    /// Property value as text, invalid UTF-8 replaced
    pub fn property_string(&self, id: Tag) -> Option<String> {
        self.property(id)
            .map(|value| String::from_utf8_lossy(value).into_owned())
    }

    /// Set a property
    ///
    /// New properties are appended; existing ones keep their position.
    pub fn set_property(&mut self, id: Tag, value: impl Into<Vec<u8>>) {
        let value = value.into();
        if id == Tag::NAME {
            self.name = String::from_utf8_lossy(&value).into_owned();
        }
        match self.properties.iter_mut().find(|(tag, _)| *tag == id) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((id, value)),
        }
    }

    /// Remove a property, returning its value
    pub fn clear_property(&mut self, id: Tag) -> Option<Vec<u8>> {
        let index = self.properties.iter().position(|(tag, _)| *tag == id)?;
        if id == Tag::NAME {
            self.name.clear();
        }
        Some(self.properties.remove(index).1)
    }

    /// [`property_string`](Self::property_string) keyed by a tag string such as `"ORIG"`
    pub fn property_str(&self, key: &str) -> Option<String> {
        self.property_string(Tag::from_str_lossy(key))
    }

    /// [`set_property`](Self::set_property) keyed by a tag string
    pub fn set_property_str(&mut self, key: &str, value: &str) {
        self.set_property(Tag::from_str_lossy(key), value.as_bytes());
    }

    /// Stamp `DATE` with the current local time
    pub fn touch(&mut self) {
        self.set_property(Tag::DATE, date_stamp());
    }

    /// Replace the payload with opaque bytes
    pub fn set_raw(&mut self, bytes: Vec<u8>) {
        self.uncompressed_size = bytes.len() as i32;
        self.payload = Payload::Raw(bytes);
    }

    /// Nested objects of a `FILE` object
    pub fn children(&self) -> &[ArchiveObject] {
        match &self.payload {
            Payload::Nested(children) => children,
            _ => &[],
        }
    }

    /// One-line description of the payload for listings
    pub fn caption(&self) -> String {
        match &self.payload {
            Payload::Raw(bytes) => format!("{} ({} bytes)", self.type_id, bytes.len()),
            Payload::Bitmap(bitmap) => bitmap.caption(),
            Payload::Font(font) => font.caption(),
            Payload::Nested(children) => format!("Datafile ({} objects)", children.len()),
        }
    }

    /// Refresh the payload from the file named by `ORIG`
    ///
    /// Bitmaps are re-imported from PCX at their current depth, nested
    /// datafiles are reloaded, fonts re-extract their ranges and anything
    /// else takes the file bytes. Unless `force` is set an identical result
    /// is reported as skipped.
    pub fn update(
        &mut self,
        force: bool,
        palette: &Palette,
        options: ConvertOptions,
    ) -> Result<UpdateStatus> {
        let Some(origin) = self.property_string(Tag::ORIG).filter(|p| !p.is_empty()) else {
            return Ok(UpdateStatus::Skipped(format!(
                "{} has no origin data - skipping",
                self.name
            )));
        };
        let path = Path::new(&origin);
        if !path.exists() {
            return Ok(UpdateStatus::Skipped(format!(
                "{}: {} not found - skipping",
                self.name, origin
            )));
        }

        let payload = match &self.payload {
            Payload::Bitmap(current) => {
                let image = crate::bitmap::pcx::load(path)?;
                let bits = if current.is_palette() { 24 } else { current.bits };
                Payload::Bitmap(BitmapData::from_image(
                    self.type_id,
                    &image,
                    bits,
                    palette,
                    options,
                )?)
            }
            Payload::Font(current) => {
                let mut font = current.clone();
                font.update_from_file(path)?;
                Payload::Font(font)
            }
            Payload::Nested(_) => Payload::Nested(load(path, "")?.0),
            Payload::Raw(_) => Payload::Raw(fs::read(path)?),
        };

        if !force && payload == self.payload {
            return Ok(UpdateStatus::Skipped(format!(
                "{}: {} is identical - skipping",
                self.name, origin
            )));
        }

        if let Payload::Raw(bytes) = payload {
            self.set_raw(bytes);
        } else {
            self.payload = payload;
        }
        self.touch();
        log::info!("updated {} from {}", self.name, origin);
        Ok(UpdateStatus::Updated)
    }
}

/// Name given to new objects of a type
pub fn default_name(type_id: Tag) -> &'static str {
    match type_id {
        Tag::FILE => "Data File",
        Tag::BITMAP => "Bitmap",
        Tag::RLE_SPRITE => "RLE Sprite",
        Tag::C_SPRITE => "Compiled Sprite",
        Tag::XC_SPRITE => "X-Compiled Sprite",
        Tag::PALETTE => "Palette",
        Tag::FLIC => "FLI Animation",
        Tag::SAMPLE => "Audio Sample",
        Tag::MIDI => "MIDI File",
        Tag::OGG => "OGG Audio",
        Tag::FONT => "Font",
        _ => "Binary Data",
    }
}

/// Current local time in `DATE` format, without a leading zero
pub fn date_stamp() -> String {
    let stamp = chrono::Local::now().format(DATE_FORMAT).to_string();
    match stamp.strip_prefix('0') {
        Some(rest) => rest.to_string(),
        None => stamp,
    }
}

// 95 empty 8x8 mono glyphs
fn blank_font() -> FontData {
    let glyphs = (FIRST_PRINTABLE..=LAST_PRINTABLE)
        .map(|_| Glyph {
            width: 8,
            height: 8,
            data: vec![0; 8],
        })
        .collect();
    FontData::from_ranges(vec![Range {
        mono: 1,
        start: FIRST_PRINTABLE,
        end: LAST_PRINTABLE,
        glyphs,
    }])
}

/// Find an object by name, depth first
pub fn find_by_name<'a>(objects: &'a [ArchiveObject], name: &str) -> Option<&'a ArchiveObject> {
    objects.iter().find_map(|object| {
        if object.name() == name {
            Some(object)
        } else {
            find_by_name(object.children(), name)
        }
    })
}

/// Find an object by a `/`-separated path of names
pub fn find_by_path<'a>(objects: &'a [ArchiveObject], path: &str) -> Option<&'a ArchiveObject> {
    let mut parts = path.split('/').filter(|p| !p.is_empty());
    let first = parts.next()?;
    let mut current = objects.iter().find(|o| o.name() == first)?;
    for part in parts {
        current = current.children().iter().find(|o| o.name() == part)?;
    }
    Some(current)
}

/// Number of objects in the tree, nested ones included
pub fn count_objects(objects: &[ArchiveObject]) -> usize {
    objects
        .iter()
        .map(|object| 1 + count_objects(object.children()))
        .sum()
}
