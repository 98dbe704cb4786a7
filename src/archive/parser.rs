//! Object list decoding
//!
//! The object list is a `u32` count followed by one record per object:
//! any number of `prop` records, then the type tag, the stored size, the
//! uncompressed size and the payload. All integers are big-endian.

use super::{ArchiveObject, Payload};
use crate::bitmap::BitmapData;
use crate::common::read_u32_be;
use crate::font::FontData;
use crate::tag::Tag;
use crate::{DatError, Result};

/// Nested datafiles deeper than this stay raw bytes
pub const MAX_NESTING_DEPTH: usize = 64;

/// Read position in an object list
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u32(&mut self) -> Result<u32> {
        let value = read_u32_be(self.buf, self.pos)?;
        self.pos += 4;
        Ok(value)
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(DatError::UnexpectedEof)?;
        let bytes = self.buf.get(self.pos..end).ok_or(DatError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }
}

/// Decode an object list (the bytes after the `ALL.` magic)
///
/// Payloads that fail to decode are kept as raw bytes. A truncated
/// record fails the whole list.
pub fn parse_objects(buf: &[u8]) -> Result<Vec<ArchiveObject>> {
    parse_at_depth(buf, 0)
}

fn parse_at_depth(buf: &[u8], depth: usize) -> Result<Vec<ArchiveObject>> {
    let mut cursor = Cursor::new(buf);
    let count = cursor.u32()? as usize;
    log::debug!("reading {count} objects at depth {depth}");

    // every record is at least 12 bytes, so a bogus count cannot over-allocate
    let mut objects = Vec::with_capacity(count.min(buf.len() / 12));
    for _ in 0..count {
        objects.push(parse_object(&mut cursor, depth)?);
    }
    if cursor.pos < buf.len() {
        log::debug!("{} trailing bytes after object list", buf.len() - cursor.pos);
    }
    Ok(objects)
}

fn parse_object(cursor: &mut Cursor<'_>, depth: usize) -> Result<ArchiveObject> {
    let mut properties = Vec::new();
    let mut id = Tag(cursor.u32()?);
    while id == Tag::PROPERTY {
        let key = Tag(cursor.u32()?);
        let size = cursor.u32()? as usize;
        properties.push((key, cursor.bytes(size)?.to_vec()));
        id = Tag(cursor.u32()?);
    }

    let stored_size = cursor.u32()? as usize;
    let uncompressed_size = cursor.u32()? as i32;
    let data = cursor.bytes(stored_size)?;

    let mut object = ArchiveObject::new(id, decode_payload(id, data, depth));
    // stored verbatim, repeated keys included
    if let Some((_, name)) = properties.iter().find(|(key, _)| *key == Tag::NAME) {
        object.name = String::from_utf8_lossy(name).into_owned();
    }
    object.properties = properties;
    if let Payload::Raw(_) = object.payload {
        object.uncompressed_size = uncompressed_size;
    }
    log::debug!(
        "object {:?} type {} ({} bytes, {})",
        object.name(),
        id,
        stored_size,
        object.payload.kind()
    );
    Ok(object)
}

fn decode_payload(id: Tag, data: &[u8], depth: usize) -> Payload {
    let decoded = match id {
        Tag::FILE if depth + 1 >= MAX_NESTING_DEPTH => {
            log::warn!("datafile nested deeper than {MAX_NESTING_DEPTH} levels kept as raw data");
            return Payload::Raw(data.to_vec());
        }
        Tag::FILE => parse_at_depth(data, depth + 1).map(Payload::Nested),
        _ if id.is_bitmap() => BitmapData::parse(data, id).map(Payload::Bitmap),
        Tag::FONT => FontData::parse(data).map(Payload::Font),
        _ if id.is_audio() || id.is_video() || id == Tag::INFO || id == Tag::DATA => {
            return Payload::Raw(data.to_vec());
        }
        _ => {
            log::warn!("Unknown object type {id}, keeping raw data");
            return Payload::Raw(data.to_vec());
        }
    };

    decoded.unwrap_or_else(|e| {
        log::warn!("failed to decode {id} object, keeping raw data: {e}");
        Payload::Raw(data.to_vec())
    })
}
