//! A loaded datafile with its grabber settings

use std::path::Path;

use crate::archive::{self, ArchiveObject, SaveOptions};
use crate::info::{CompressionMode, GrabberInfo};
use crate::Result;

/// Objects of a datafile plus the settings from its `info` object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Datafile {
    /// Top-level objects, `info` object removed
    pub objects: Vec<ArchiveObject>,
    /// Settings, defaults if the file had no `info` object
    pub info: GrabberInfo,
    /// Whether the file was LZSS compressed when read
    pub compressed: bool,
}

impl Datafile {
    /// Split the `info` object off a decoded object list
    pub fn from_objects(mut objects: Vec<ArchiveObject>, compressed: bool) -> Self {
        let mut info = GrabberInfo::default();
        info.take_from(&mut objects);
        if compressed && info.pack == CompressionMode::None {
            info.pack = CompressionMode::Global;
        }
        Self {
            objects,
            info,
            compressed,
        }
    }

    /// Decode a packfile held in memory
    pub fn from_bytes(buf: &[u8], password: &str) -> Result<Self> {
        let (objects, compressed) = archive::decode_packfile(buf, password)?;
        Ok(Self::from_objects(objects, compressed))
    }

    /// Load a packfile from disk
    pub fn open(path: impl AsRef<Path>, password: &str) -> Result<Self> {
        let (objects, compressed) = archive::load(path, password)?;
        Ok(Self::from_objects(objects, compressed))
    }

    /// Objects as written to disk, `info` object appended
    pub fn objects_with_info(&self) -> Vec<ArchiveObject> {
        let mut objects = self.objects.clone();
        self.info.push_to(&mut objects);
        objects
    }

    /// Encode as a packfile using the compression mode from the settings
    pub fn to_bytes(&self, password: &str) -> Result<Vec<u8>> {
        archive::encode_packfile(&self.objects_with_info(), self.info.pack.compresses(), password)
    }

    /// Save to disk, honouring the backup and compression settings
    pub fn save(&self, path: impl AsRef<Path>, password: &str) -> Result<()> {
        let options = SaveOptions {
            compress: self.info.pack.compresses(),
            backup: self.info.backup,
            password: password.to_string(),
        };
        archive::save(path, &self.objects_with_info(), &options)
    }

    /// Sort top-level objects by name when the settings ask for it
    pub fn sort_if_enabled(&mut self) {
        if self.info.sort {
            self.objects.sort_by(|a, b| a.name().cmp(b.name()));
        }
    }
}
