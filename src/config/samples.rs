// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Sample maps and soundfont tables.
//!
//! A sample map is a JSON object from bank name to either a list of sample paths
//! or an object from note name to a list of sample paths:
//!
//! ```json
//! {
//!   "_base": "samples/",
//!   "bd": ["bd/kick0.wav", "bd/kick1.wav"],
//!   "piano": { "c3": ["piano/c3.wav"], "a3": ["piano/a3.wav"] }
//! }
//! ```
//!
//! Note-map key order is kept as written, since nearest-note ties go to the first key.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use tracing::warn;

use super::error::ConfigError;

/// The samples recorded at one note of a pitched bank.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSamples {
    pub note: String,
    pub paths: Vec<String>,
}

/// One named bank of samples.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBank {
    /// Unpitched samples selected by index.
    List(Vec<String>),
    /// Samples keyed by the note they were recorded at, in file order.
    Pitched(Vec<NoteSamples>),
}

impl SampleBank {
    pub fn is_empty(&self) -> bool {
        match self {
            SampleBank::List(paths) => paths.is_empty(),
            SampleBank::Pitched(notes) => notes.iter().all(|note| note.paths.is_empty()),
        }
    }

    /// Total number of sample paths in the bank.
    pub fn sample_count(&self) -> usize {
        match self {
            SampleBank::List(paths) => paths.len(),
            SampleBank::Pitched(notes) => notes.iter().map(|note| note.paths.len()).sum(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SampleBank::List(_) => "list",
            SampleBank::Pitched(_) => "pitched",
        }
    }

    fn rebase(self, base: &str) -> SampleBank {
        let join = |paths: Vec<String>| paths.iter().map(|path| with_base(base, path)).collect();
        match self {
            SampleBank::List(paths) => SampleBank::List(join(paths)),
            SampleBank::Pitched(notes) => SampleBank::Pitched(
                notes
                    .into_iter()
                    .map(|note| NoteSamples {
                        note: note.note,
                        paths: join(note.paths),
                    })
                    .collect(),
            ),
        }
    }
}

/// Prefixes a relative path with the base directory or URL.
fn with_base(base: &str, path: &str) -> String {
    if base.is_empty() || path.contains("://") || Path::new(path).is_absolute() {
        return path.to_string();
    }
    if base.contains("://") {
        return format!("{base}{path}");
    }
    Path::new(base).join(path).to_string_lossy().into_owned()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PathList {
    One(String),
    Many(Vec<String>),
}

impl From<PathList> for Vec<String> {
    fn from(list: PathList) -> Self {
        match list {
            PathList::One(path) => vec![path],
            PathList::Many(paths) => paths,
        }
    }
}

/// A bank value that may turn out not to be a bank at all.
struct BankEntry(Option<SampleBank>);

impl<'de> Deserialize<'de> for BankEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BankVisitor;

        impl<'de> Visitor<'de> for BankVisitor {
            type Value = BankEntry;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a list of sample paths or a map of notes to sample paths")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<BankEntry, E> {
                Ok(BankEntry(Some(SampleBank::List(vec![v.to_string()]))))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<BankEntry, A::Error> {
                let mut paths = Vec::new();
                while let Some(path) = seq.next_element::<String>()? {
                    paths.push(path);
                }
                Ok(BankEntry(Some(SampleBank::List(paths))))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<BankEntry, A::Error> {
                let mut notes = Vec::new();
                while let Some(key) = map.next_key::<String>()? {
                    if key.starts_with('_') {
                        map.next_value::<IgnoredAny>()?;
                        continue;
                    }
                    let paths: PathList = map.next_value()?;
                    notes.push(NoteSamples {
                        note: key,
                        paths: paths.into(),
                    });
                }
                Ok(BankEntry(Some(SampleBank::Pitched(notes))))
            }

            fn visit_bool<E: de::Error>(self, _: bool) -> Result<BankEntry, E> {
                Ok(BankEntry(None))
            }

            fn visit_i64<E: de::Error>(self, _: i64) -> Result<BankEntry, E> {
                Ok(BankEntry(None))
            }

            fn visit_u64<E: de::Error>(self, _: u64) -> Result<BankEntry, E> {
                Ok(BankEntry(None))
            }

            fn visit_f64<E: de::Error>(self, _: f64) -> Result<BankEntry, E> {
                Ok(BankEntry(None))
            }

            fn visit_unit<E: de::Error>(self) -> Result<BankEntry, E> {
                Ok(BankEntry(None))
            }
        }

        deserializer.deserialize_any(BankVisitor)
    }
}

impl<'de> Deserialize<'de> for SampleBank {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        BankEntry::deserialize(deserializer)?
            .0
            .ok_or_else(|| de::Error::custom("sample bank must be a list or an object"))
    }
}

/// The parsed form of a sample map file, before paths are resolved.
struct RawSampleMap {
    base: Option<String>,
    banks: Vec<(String, SampleBank)>,
}

impl<'de> Deserialize<'de> for RawSampleMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MapVisitor;

        impl<'de> Visitor<'de> for MapVisitor {
            type Value = RawSampleMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of sample banks")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RawSampleMap, A::Error> {
                let mut raw = RawSampleMap {
                    base: None,
                    banks: Vec::new(),
                };
                while let Some(key) = map.next_key::<String>()? {
                    if key == "_base" {
                        raw.base = Some(map.next_value()?);
                    } else if key.starts_with('_') {
                        map.next_value::<IgnoredAny>()?;
                    } else {
                        match map.next_value::<BankEntry>()?.0 {
                            Some(bank) => raw.banks.push((key, bank)),
                            None => warn!(
                                bank = %key,
                                "Ignoring sample bank that is not a list or an object"
                            ),
                        }
                    }
                }
                Ok(raw)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

/// Sample banks by name, with every path already resolved against its base.
#[derive(Debug, Clone, Default)]
pub struct SampleMap {
    banks: HashMap<String, SampleBank>,
}

impl SampleMap {
    /// Creates a sample map from already resolved banks.
    pub fn new(banks: impl IntoIterator<Item = (String, SampleBank)>) -> SampleMap {
        SampleMap {
            banks: banks.into_iter().collect(),
        }
    }

    /// Parses a sample map from JSON. Relative paths are only prefixed with `_base`.
    pub fn from_json(json: &str) -> Result<SampleMap, ConfigError> {
        let raw: RawSampleMap = serde_json::from_str(json)?;
        Ok(SampleMap::from_raw(raw, None))
    }

    /// Parses a sample map file. Relative paths, and a relative `_base`, are
    /// resolved against the file's directory.
    pub fn deserialize(path: &Path) -> Result<SampleMap, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let raw: RawSampleMap = serde_json::from_str(&contents)?;
        Ok(SampleMap::from_raw(raw, path.parent()))
    }

    fn from_raw(raw: RawSampleMap, dir: Option<&Path>) -> SampleMap {
        let dir = dir.map(|dir| dir.to_string_lossy().into_owned());
        let base = match (dir, raw.base) {
            (Some(dir), Some(base)) => with_base(&dir, &base),
            (Some(dir), None) => dir,
            (None, Some(base)) => base,
            (None, None) => String::new(),
        };
        SampleMap::new(
            raw.banks
                .into_iter()
                .map(|(name, bank)| (name, bank.rebase(&base))),
        )
    }

    /// Adds the banks of another map, replacing banks with the same name.
    pub fn extend(&mut self, other: SampleMap) {
        self.banks.extend(other.banks);
    }

    pub fn bank(&self, name: &str) -> Option<&SampleBank> {
        self.banks.get(name)
    }

    /// Bank names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.banks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.banks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.banks.is_empty()
    }
}

/// A table of General MIDI soundfont instruments.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct SoundfontTable {
    /// Instrument ids, e.g. "0000_JCLive_sf2_file". The first three digits are the program number.
    #[serde(default)]
    instruments: Vec<String>,

    /// General MIDI instrument names, indexed by program number.
    #[serde(default, rename = "instrumentNames")]
    instrument_names: Vec<String>,

    /// Note maps by instrument id.
    #[serde(default)]
    fonts: HashMap<String, SampleBank>,
}

impl SoundfontTable {
    pub fn from_json(json: &str) -> Result<SoundfontTable, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses a soundfont table file, resolving relative paths against its directory.
    pub fn deserialize(path: &Path) -> Result<SoundfontTable, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut table = SoundfontTable::from_json(&contents)?;
        if let Some(dir) = path.parent() {
            let dir = dir.to_string_lossy().into_owned();
            table.fonts = table
                .fonts
                .into_iter()
                .map(|(id, bank)| (id, bank.rebase(&dir)))
                .collect();
        }
        Ok(table)
    }

    /// Finds the instrument id for a sound, either given directly or by its
    /// General MIDI name.
    pub fn key_for(&self, sound: &str) -> Option<&str> {
        if let Some(id) = self.instruments.iter().find(|id| *id == sound) {
            return Some(id);
        }
        let program = self.instrument_names.iter().position(|name| name == sound)?;
        let prefix = format!("{program:03}");
        self.instruments
            .iter()
            .find(|id| id.starts_with(&prefix))
            .map(String::as_str)
    }

    pub fn font(&self, key: &str) -> Option<&SampleBank> {
        self.fonts.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_and_pitched_banks() {
        let map = SampleMap::from_json(
            r#"{
                "bd": ["bd/0.wav", "bd/1.wav"],
                "piano": { "d3": ["d3.wav"], "_meta": 1, "c3": "c3.wav" }
            }"#,
        )
        .unwrap();

        assert_eq!(map.names(), vec!["bd", "piano"]);
        assert_eq!(
            map.bank("bd"),
            Some(&SampleBank::List(vec![
                "bd/0.wav".to_string(),
                "bd/1.wav".to_string()
            ]))
        );
        assert_eq!(
            map.bank("piano"),
            Some(&SampleBank::Pitched(vec![
                NoteSamples {
                    note: "d3".to_string(),
                    paths: vec!["d3.wav".to_string()],
                },
                NoteSamples {
                    note: "c3".to_string(),
                    paths: vec!["c3.wav".to_string()],
                },
            ]))
        );
    }

    #[test]
    fn test_base_prefix() {
        let map = SampleMap::from_json(
            r#"{
                "_base": "https://example.com/samples/",
                "hh": ["hh/0.wav", "/abs/hh.wav"]
            }"#,
        )
        .unwrap();
        assert_eq!(
            map.bank("hh"),
            Some(&SampleBank::List(vec![
                "https://example.com/samples/hh/0.wav".to_string(),
                "/abs/hh.wav".to_string()
            ]))
        );
    }

    #[test]
    fn test_malformed_bank_is_skipped() {
        let map = SampleMap::from_json(r#"{ "bad": 3, "sn": ["sn.wav"] }"#).unwrap();
        assert!(map.bank("bad").is_none());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_deserialize_resolves_against_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strudel.json");
        fs::write(&path, r#"{ "_base": "kit", "bd": ["bd.wav"] }"#).unwrap();

        let map = SampleMap::deserialize(&path).unwrap();
        let expected = dir.path().join("kit").join("bd.wav");
        assert_eq!(
            map.bank("bd"),
            Some(&SampleBank::List(vec![expected
                .to_string_lossy()
                .into_owned()]))
        );
    }

    #[test]
    fn test_missing_file() {
        let err = SampleMap::deserialize(Path::new("/nonexistent/strudel.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_extend_replaces() {
        let mut map = SampleMap::from_json(r#"{ "bd": ["a.wav"], "sn": ["b.wav"] }"#).unwrap();
        map.extend(SampleMap::from_json(r#"{ "bd": ["c.wav"] }"#).unwrap());
        assert_eq!(map.bank("bd"), Some(&SampleBank::List(vec!["c.wav".into()])));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_soundfont_key_lookup() {
        let table = SoundfontTable::from_json(
            r#"{
                "instruments": ["0000_JCLive_sf2_file", "0100_FluidR3_GM_sf2_file"],
                "instrumentNames": ["acoustic_grand_piano", "bright_acoustic_piano", "electric_grand_piano",
                    "honkytonk_piano", "electric_piano_1", "electric_piano_2", "harpsichord", "clavinet",
                    "celesta", "glockenspiel", "music_box"],
                "fonts": { "0100_FluidR3_GM_sf2_file": { "c4": ["mb_c4.wav"] } }
            }"#,
        )
        .unwrap();

        assert_eq!(
            table.key_for("0000_JCLive_sf2_file"),
            Some("0000_JCLive_sf2_file")
        );
        assert_eq!(table.key_for("acoustic_grand_piano"), Some("0000_JCLive_sf2_file"));
        assert_eq!(table.key_for("music_box"), Some("0100_FluidR3_GM_sf2_file"));
        assert_eq!(table.key_for("celesta"), None);
        assert_eq!(table.key_for("bd"), None);
        assert!(table.font("0100_FluidR3_GM_sf2_file").is_some());
    }
}
