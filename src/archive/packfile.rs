//! Packfile envelope
//!
//! A packfile starts with a big-endian outer magic telling whether the
//! rest is LZSS compressed (`slh!`) or stored (`slh.`). With a password
//! the outer magic is XOR-ed with the password mask and every byte after
//! it with the password itself. Inside the envelope the `ALL.` magic
//! precedes the object list.

use std::fs;
use std::path::{Path, PathBuf};

use super::{parse_objects, serialize_objects, ArchiveObject};
use crate::cipher::{encrypt_buffer, encrypt_id};
use crate::common::{read_u32_be, DAT_MAGIC, F_NOPACK_MAGIC, F_PACK_MAGIC};
use crate::lzss::{compress_bytes, decompress_bytes};
use crate::{DatError, Result};

/// Options for [`save`] and [`encode_packfile`]
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    /// LZSS-compress the whole file
    pub compress: bool,
    /// Copy an existing file to `<name>.bak` first
    pub backup: bool,
    /// Password; empty for none
    pub password: String,
}

/// Remove the envelope and return the object list bytes
///
/// # Returns
/// The bytes following the `ALL.` magic and whether the file was compressed
pub fn open_envelope(buf: &[u8], password: &str) -> Result<(Vec<u8>, bool)> {
    let password = password.as_bytes();
    let magic = encrypt_id(read_u32_be(buf, 0)?, password, true);
    log::debug!("outer magic 0x{magic:08x}");

    let compressed = match magic {
        F_PACK_MAGIC => true,
        F_NOPACK_MAGIC => false,
        other => return Err(DatError::InvalidMagic(other)),
    };

    let mut body = buf.to_vec();
    encrypt_buffer(&mut body, password, 4);
    let body = if compressed {
        decompress_bytes(&body[4..])?
    } else {
        body.split_off(4)
    };

    let inner = read_u32_be(&body, 0)?;
    if inner != DAT_MAGIC {
        return Err(DatError::Format(format!(
            "not a datafile: inner magic 0x{inner:08x}"
        )));
    }
    Ok((body[4..].to_vec(), compressed))
}

/// Decode a whole packfile
///
/// # Returns
/// The top-level objects and whether the file was compressed
pub fn decode_packfile(buf: &[u8], password: &str) -> Result<(Vec<ArchiveObject>, bool)> {
    let (body, compressed) = open_envelope(buf, password)?;
    let objects = parse_objects(&body)?;
    Ok((objects, compressed))
}

/// Encode objects as a complete packfile
pub fn encode_packfile(objects: &[ArchiveObject], compress: bool, password: &str) -> Result<Vec<u8>> {
    let password = password.as_bytes();

    let mut body = DAT_MAGIC.to_be_bytes().to_vec();
    body.extend_from_slice(&serialize_objects(objects)?);
    let body = if compress {
        compress_bytes(&body)?
    } else {
        body
    };

    let magic = if compress { F_PACK_MAGIC } else { F_NOPACK_MAGIC };
    let mut out = Vec::with_capacity(body.len() + 4);
    out.extend_from_slice(&encrypt_id(magic, password, true).to_be_bytes());
    out.extend_from_slice(&body);
    encrypt_buffer(&mut out, password, 4);
    Ok(out)
}

/// Load a packfile from disk
///
/// # Arguments
/// * `path` - File to read
/// * `password` - Password, empty for none
///
/// # Returns
/// The top-level objects and whether the file was compressed
pub fn load(path: impl AsRef<Path>, password: &str) -> Result<(Vec<ArchiveObject>, bool)> {
    let path = path.as_ref();
    let buf = fs::read(path)?;
    log::info!("loading {} ({} bytes)", path.display(), buf.len());
    decode_packfile(&buf, password)
}

/// Path of the backup copy made by [`save`]
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".bak");
    PathBuf::from(name)
}

/// Save objects as a packfile
///
/// The file is encoded completely before anything on disk changes. A
/// failed backup is logged and does not stop the save.
pub fn save(path: impl AsRef<Path>, objects: &[ArchiveObject], options: &SaveOptions) -> Result<()> {
    let path = path.as_ref();
    let buf = encode_packfile(objects, options.compress, &options.password)?;

    if options.backup && path.exists() {
        let backup = backup_path(path);
        log::info!("creating backup {}", backup.display());
        if backup.exists() {
            if let Err(e) = fs::remove_file(&backup) {
                log::error!("failed to remove old backup {}: {e}", backup.display());
            }
        }
        if let Err(e) = fs::copy(path, &backup) {
            log::error!("failed to create backup {}: {e}", backup.display());
        }
    }

    fs::write(path, &buf)?;
    log::info!("saved {} ({} bytes)", path.display(), buf.len());
    Ok(())
}
