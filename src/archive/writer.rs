//! Object list encoding

use super::{ArchiveObject, Payload};
use crate::tag::Tag;
use crate::Result;

/// Encode an object list, the inverse of [`super::parse_objects`]
///
/// Decoded payloads store their encoded length in both size fields. Raw
/// payloads write back the uncompressed size they were read with.
pub fn serialize_objects(objects: &[ArchiveObject]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_objects(&mut out, objects)?;
    Ok(out)
}

fn write_objects(out: &mut Vec<u8>, objects: &[ArchiveObject]) -> Result<()> {
    out.extend_from_slice(&(objects.len() as u32).to_be_bytes());
    for object in objects {
        for (key, value) in object.properties() {
            out.extend_from_slice(&Tag::PROPERTY.to_bytes());
            out.extend_from_slice(&key.to_bytes());
            out.extend_from_slice(&(value.len() as u32).to_be_bytes());
            out.extend_from_slice(value);
        }
        out.extend_from_slice(&object.type_id.to_bytes());

        let data = object.payload.serialize()?;
        let uncompressed = match object.payload {
            Payload::Raw(_) => object.uncompressed_size,
            _ => data.len() as i32,
        };
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(&uncompressed.to_be_bytes());
        out.extend_from_slice(&data);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::parse_objects;
    use crate::bitmap::BitmapData;

    #[test]
    fn test_empty_list() -> Result<()> {
        assert_eq!(serialize_objects(&[])?, vec![0, 0, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_record_layout() -> Result<()> {
        let mut object = ArchiveObject::new(Tag::DATA, Payload::Raw(vec![0xAB]));
        object.set_name("x");
        let bytes = serialize_objects(&[object])?;
        let expected = hex::decode(concat!(
            "00000001",
            "70726f70", "4e414d45", "00000001", "78",
            "44415441", "00000001", "00000001", "ab"
        ))
        .unwrap();
        assert_eq!(bytes, expected);
        Ok(())
    }

    #[test]
    fn test_bitmap_sizes_written_twice() -> Result<()> {
        let bitmap = BitmapData::new(Tag::BITMAP, 8, 2, 1, vec![3, 4])?;
        let object = ArchiveObject::new(Tag::BITMAP, Payload::Bitmap(bitmap));
        let bytes = serialize_objects(&[object])?;
        assert_eq!(&bytes[8..16], &[0, 0, 0, 8, 0, 0, 0, 8]);
        assert_eq!(&bytes[16..], &[0, 8, 0, 2, 0, 1, 3, 4]);

        let objects = parse_objects(&bytes)?;
        assert!(matches!(objects[0].payload, Payload::Bitmap(ref b) if b.data == [3, 4]));
        Ok(())
    }

    #[test]
    fn test_invalid_font_fails() {
        let object = ArchiveObject::new(Tag::FONT, Payload::Font(Default::default()));
        assert!(serialize_objects(&[object]).is_err());
    }
}
