//! Grabber settings
//!
//! [`GrabberInfo`] holds the editor settings stored with a datafile (as a
//! trailing `info` object) and in the `[grabber]` section of `allegro.cfg`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ini::{EscapePolicy, Ini, LineSeparator, ParseOption, WriteOption};

use crate::archive::{ArchiveObject, Payload};
use crate::tag::Tag;
use crate::{DatError, Result};

/// Payload of the `info` object
pub const INFO_PAYLOAD: &[u8] = b"For internal use by the grabber";

/// Section of `allegro.cfg` holding the settings
pub const CONFIG_SECTION: &str = "grabber";

/// How a datafile is compressed when saved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMode {
    /// Stored
    #[default]
    None = 0,
    /// Objects compressed one by one
    Individual = 1,
    /// Whole file compressed
    Global = 2,
}

impl CompressionMode {
    /// Create a CompressionMode from its `PACK` value
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionMode::None),
            1 => Ok(CompressionMode::Individual),
            2 => Ok(CompressionMode::Global),
            _ => Err(DatError::InvalidData(format!(
                "invalid compression mode {value}"
            ))),
        }
    }

    /// True if a save with this mode LZSS-compresses the file
    pub fn compresses(self) -> bool {
        self != CompressionMode::None
    }
}

/// How the griddler cuts a sheet into objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GriddleMode {
    /// Fixed cell size
    #[default]
    Grid,
    /// Cells bounded by colour 255
    Color255,
}

/// Grabber settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrabberInfo {
    /// Grid width for grabbing
    pub xgrid: i32,
    /// Grid height for grabbing
    pub ygrid: i32,
    /// Keep a `.bak` copy when saving
    pub backup: bool,
    /// Write an index (settings file only)
    pub index: bool,
    /// Dither when reducing colour depth
    pub dither: bool,
    /// Name of the info object
    pub name: String,
    /// Compression mode
    pub pack: CompressionMode,
    /// Store `ORIG` paths relative to the datafile
    pub relative: bool,
    /// Keep objects sorted by name
    pub sort: bool,
    /// Preserve transparency when converting
    pub transparency: bool,
    /// Griddler cell width
    pub griddle_xgrid: i32,
    /// Griddler cell height
    pub griddle_ygrid: i32,
    /// Griddler cutting mode
    pub griddle_mode: GriddleMode,
    /// Griddler keeps empty cells
    pub griddle_empties: bool,
    /// Griddler crops cells
    pub griddle_autocrop: bool,
    /// Object type index created by the griddler
    pub griddle_type: i32,
    /// Griddler grid colour, `0xRRGGBB`
    pub griddle_color: u32,
    /// Datafile password
    pub password: String,
    /// Shell commands keyed by object type
    pub associations: BTreeMap<String, String>,
}

impl Default for GrabberInfo {
    fn default() -> Self {
        Self {
            xgrid: 16,
            ygrid: 16,
            backup: true,
            index: false,
            dither: true,
            name: "GrabberInfo".to_string(),
            pack: CompressionMode::None,
            relative: false,
            sort: false,
            transparency: false,
            griddle_xgrid: 64,
            griddle_ygrid: 64,
            griddle_mode: GriddleMode::Grid,
            griddle_empties: false,
            griddle_autocrop: false,
            griddle_type: 0,
            griddle_color: 0xffffff,
            password: String::new(),
            associations: BTreeMap::new(),
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "y"
    } else {
        "n"
    }
}

fn parse_number(key: &str, value: &str, target: &mut i32) {
    match value.parse() {
        Ok(n) => *target = n,
        Err(_) => log::warn!("invalid {key} value: {value:?}"),
    }
}

impl GrabberInfo {
    /// Take the settings from a trailing `info` object
    ///
    /// The object is removed from `objects`. Without one the settings are
    /// left untouched.
    ///
    /// # Returns
    /// `true` if an info object was found
    pub fn take_from(&mut self, objects: &mut Vec<ArchiveObject>) -> bool {
        if objects.last().map(|o| o.type_id) != Some(Tag::INFO) {
            log::info!("no info object found, using default settings");
            return false;
        }
        let Some(info) = objects.pop() else {
            return false;
        };

        let text = |tag: Tag| info.property_string(tag).unwrap_or_default();
        if let Some(value) = info.property_string(Tag::XGRD) {
            parse_number("XGRD", &value, &mut self.xgrid);
        }
        if let Some(value) = info.property_string(Tag::YGRD) {
            parse_number("YGRD", &value, &mut self.ygrid);
        }
        self.backup = text(Tag::BACK) == "y";
        self.dither = text(Tag::DITH) == "y";
        self.relative = text(Tag::RELF) == "y";
        self.sort = text(Tag::SORT) == "y";
        self.transparency = text(Tag::TRAN) == "y";

        if let Some(value) = info.property_string(Tag::PACK).filter(|v| !v.is_empty()) {
            self.pack = match value.trim().parse::<u8>().map(CompressionMode::from_u8) {
                Ok(Ok(mode)) => mode,
                _ => {
                    log::warn!("invalid PACK value {value:?}, using no compression");
                    CompressionMode::None
                }
            };
        }
        self.name = info.name().to_string();
        true
    }

    /// Build the `info` object for these settings
    pub fn to_object(&self) -> ArchiveObject {
        let mut info = ArchiveObject::new(Tag::INFO, Payload::Raw(INFO_PAYLOAD.to_vec()));
        info.set_property(Tag::XGRD, self.xgrid.to_string());
        info.set_property(Tag::YGRD, self.ygrid.to_string());
        info.set_property(Tag::BACK, yes_no(self.backup));
        info.set_property(Tag::DITH, yes_no(self.dither));
        info.set_property(Tag::RELF, yes_no(self.relative));
        info.set_property(Tag::SORT, yes_no(self.sort));
        info.set_property(Tag::TRAN, yes_no(self.transparency));
        info.set_property(Tag::PACK, (self.pack as u8).to_string());
        if !self.name.is_empty() {
            info.set_name(self.name.clone());
        }
        info
    }

    /// Append the `info` object to an object list
    pub fn push_to(&self, objects: &mut Vec<ArchiveObject>) {
        objects.push(self.to_object());
    }

    /// Read the `[grabber]` section of a settings file
    pub fn load_config(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse_config(&text)
    }

    /// Parse settings text; keys outside `[grabber]` are ignored
    ///
    /// `#` and `;` start a comment only in front of the `=`, so values may
    /// contain either character.
    pub fn parse_config(text: &str) -> Result<Self> {
        let cleaned: String = text
            .lines()
            .filter_map(|line| {
                let head = line.find('=').map_or(line, |eq| &line[..eq]);
                let line = match head.find(&['#', ';'][..]) {
                    Some(pos) => &line[..pos],
                    None => line,
                };
                let line = line.trim();
                if line.starts_with('[') {
                    return Some(format!("{line}\n"));
                }
                let (key, value) = line.split_once('=')?;
                Some(format!("{}={}\n", key.trim(), value.trim()))
            })
            .collect();

        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(&cleaned, options)
            .map_err(|e| DatError::Format(format!("invalid settings file: {e}")))?;

        let mut info = Self::default();
        if let Some(section) = ini.section(Some(CONFIG_SECTION)) {
            for (key, value) in section.iter() {
                if !key.is_empty() {
                    info.apply_setting(key, value);
                }
            }
        }
        Ok(info)
    }

    fn apply_setting(&mut self, key: &str, value: &str) {
        let flag = value == "y";
        match key {
            "xgrid" => parse_number(key, value, &mut self.xgrid),
            "ygrid" => parse_number(key, value, &mut self.ygrid),
            "backups" => self.backup = flag,
            "index" => self.index = flag,
            "sort" => self.sort = flag,
            "relative" => self.relative = flag,
            "dither" => self.dither = flag,
            "transparency" => self.transparency = flag,
            "griddle_xgrid" => parse_number(key, value, &mut self.griddle_xgrid),
            "griddle_ygrid" => parse_number(key, value, &mut self.griddle_ygrid),
            "griddle_mode" => {
                self.griddle_mode = if value == "grid" {
                    GriddleMode::Grid
                } else {
                    if value != "col255" {
                        log::warn!("invalid griddle_mode {value:?}, expected grid or col255");
                    }
                    GriddleMode::Color255
                };
            }
            "griddle_empties" => self.griddle_empties = flag,
            "griddle_autocrop" => self.griddle_autocrop = flag,
            "griddle_type" => parse_number(key, value, &mut self.griddle_type),
            "griddle_color" => match value
                .strip_prefix('#')
                .filter(|hex| hex.len() == 6)
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
            {
                Some(color) => self.griddle_color = color,
                None => log::warn!("invalid griddle_color {value:?}, expected #RRGGBB"),
            },
            "password" => self.password = value.to_string(),
            _ => {
                self.associations.insert(key.to_string(), value.to_string());
            }
        }
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        let mode = match self.griddle_mode {
            GriddleMode::Grid => "grid",
            GriddleMode::Color255 => "col255",
        };
        let mut section = ini.with_section(Some(CONFIG_SECTION));
        section
            .set("xgrid", self.xgrid.to_string())
            .set("ygrid", self.ygrid.to_string())
            .set("backups", yes_no(self.backup))
            .set("index", yes_no(self.index))
            .set("sort", yes_no(self.sort))
            .set("relative", yes_no(self.relative))
            .set("dither", yes_no(self.dither))
            .set("transparency", yes_no(self.transparency))
            .set("griddle_xgrid", self.griddle_xgrid.to_string())
            .set("griddle_ygrid", self.griddle_ygrid.to_string())
            .set("griddle_mode", mode)
            .set("griddle_empties", yes_no(self.griddle_empties))
            .set("griddle_autocrop", yes_no(self.griddle_autocrop))
            .set("griddle_type", self.griddle_type.to_string())
            .set("griddle_color", format!("#{:06x}", self.griddle_color));
        if !self.password.is_empty() {
            section.set("password", self.password.as_str());
        }
        for (key, value) in &self.associations {
            section.set(key.as_str(), value.as_str());
        }
        ini
    }

    /// Settings as `allegro.cfg` text
    pub fn config_text(&self) -> Result<String> {
        let options = WriteOption {
            escape_policy: EscapePolicy::Nothing,
            line_separator: LineSeparator::CR,
            kv_separator: " = ",
        };
        let mut out = Vec::new();
        self.to_ini().write_to_opt(&mut out, options)?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Write the settings file
    pub fn save_config(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.config_text()?)?;
        Ok(())
    }

    /// Shell command associated with an object type
    pub fn shell_command(&self, type_name: &str) -> Option<&str> {
        self.associations
            .get(type_name.trim_end())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let info = GrabberInfo::default();
        assert_eq!((info.xgrid, info.ygrid), (16, 16));
        assert!(info.backup && info.dither);
        assert_eq!(info.pack, CompressionMode::None);
        assert_eq!(info.griddle_color, 0xffffff);
        assert_eq!(info.name, "GrabberInfo");
    }

    #[test]
    fn test_compression_mode() {
        assert_eq!(CompressionMode::from_u8(2).unwrap(), CompressionMode::Global);
        assert!(CompressionMode::from_u8(3).is_err());
        assert!(!CompressionMode::None.compresses());
        assert!(CompressionMode::Individual.compresses());
    }

    #[test]
    fn test_info_object_round_trip() {
        let info = GrabberInfo {
            xgrid: 32,
            backup: false,
            sort: true,
            pack: CompressionMode::Global,
            ..Default::default()
        };
        let mut objects = vec![ArchiveObject::new(Tag::DATA, Payload::Raw(Vec::new()))];
        info.push_to(&mut objects);

        let order: Vec<Tag> = objects[1].properties().iter().map(|(t, _)| *t).collect();
        assert_eq!(
            order,
            vec![
                Tag::XGRD,
                Tag::YGRD,
                Tag::BACK,
                Tag::DITH,
                Tag::RELF,
                Tag::SORT,
                Tag::TRAN,
                Tag::PACK,
                Tag::NAME
            ]
        );
        assert_eq!(objects[1].payload, Payload::Raw(INFO_PAYLOAD.to_vec()));

        let mut loaded = GrabberInfo::default();
        assert!(loaded.take_from(&mut objects));
        assert_eq!(objects.len(), 1);
        assert_eq!(loaded.xgrid, 32);
        assert!(!loaded.backup);
        assert!(loaded.sort);
        assert_eq!(loaded.pack, CompressionMode::Global);
        assert!(!loaded.take_from(&mut objects));
    }

    #[test]
    fn test_bad_pack_value() {
        let mut object = GrabberInfo::default().to_object();
        object.set_property(Tag::PACK, "7");
        let mut objects = vec![object];
        let mut info = GrabberInfo {
            pack: CompressionMode::Global,
            ..Default::default()
        };
        info.take_from(&mut objects);
        assert_eq!(info.pack, CompressionMode::None);
    }

    #[test]
    fn test_parse_config() -> Result<()> {
        let text = "\
xgrid = 99
[grabber]
# comment line
xgrid = 8
backups = n
griddle_mode = col255
griddle_color = #00ff80
password = a#b;c
bad = ; value
BMP =gimp %s
ygrid = not-a-number
";
        let info = GrabberInfo::parse_config(text)?;
        assert_eq!(info.xgrid, 8);
        assert_eq!(info.ygrid, 16);
        assert!(!info.backup);
        assert_eq!(info.griddle_mode, GriddleMode::Color255);
        assert_eq!(info.griddle_color, 0x00ff80);
        assert_eq!(info.password, "a#b;c");
        assert_eq!(info.shell_command("BMP "), Some("gimp %s"));
        assert_eq!(info.associations.get("bad").map(String::as_str), Some("; value"));
        Ok(())
    }

    #[test]
    fn test_config_file_round_trip() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("allegro.cfg");
        let mut info = GrabberInfo {
            griddle_color: 0x123456,
            password: "pw".to_string(),
            ..Default::default()
        };
        info.associations.insert("FONT".to_string(), "edit".to_string());
        info.save_config(&path)?;

        let text = fs::read_to_string(&path)?;
        assert!(text.contains("[grabber]\nxgrid = 16\n"));
        assert!(text.contains("griddle_color = #123456\n"));
        assert!(text.ends_with("FONT = edit\n"));

        let loaded = GrabberInfo::load_config(&path)?;
        assert_eq!(loaded, info);
        Ok(())
    }
}
