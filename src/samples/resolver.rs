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

//! Picks the sample file for a sound name, index and note.

use tracing::debug;

use crate::config::{NoteSamples, SampleBank, SampleMap, SoundfontTable};
use crate::notes::note_to_midi;

/// Errors raised while looking up a sound.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("sample not found: '{name}', try one of: {}", known.join(", "))]
    MissingSampleBank { name: String, known: Vec<String> },

    #[error("soundfont '{name}' has no samples")]
    MissingSoundfont { name: String },
}

/// The sample chosen for one trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSample {
    pub path: String,
    /// Semitones to repitch the sample by to reach the requested note.
    pub transpose: f64,
    /// Play the sample backwards.
    pub reverse: bool,
    /// The sample came from a soundfont, so it plays for the event's duration.
    pub soundfont: bool,
}

/// Looks sounds up in the loaded sample map and, when present, a soundfont table.
#[derive(Debug, Clone, Default)]
pub struct SampleResolver {
    samples: SampleMap,
    soundfonts: Option<SoundfontTable>,
    /// The MIDI note unpitched samples are taken to sound at.
    reference_note: f64,
}

impl SampleResolver {
    pub fn new(samples: SampleMap, reference_note: f64) -> SampleResolver {
        SampleResolver {
            samples,
            soundfonts: None,
            reference_note,
        }
    }

    pub fn with_soundfonts(mut self, soundfonts: SoundfontTable) -> SampleResolver {
        self.soundfonts = Some(soundfonts);
        self
    }

    pub fn samples(&self) -> &SampleMap {
        &self.samples
    }

    /// The soundfont instrument a sound refers to, if any.
    pub fn soundfont_key(&self, sound: &str) -> Option<&str> {
        self.soundfonts.as_ref()?.key_for(sound)
    }

    /// Resolves a sound to a sample path and the transposition needed to play
    /// it at `note` (a MIDI note number; unpitched banks treat a missing note as
    /// their reference note).
    pub fn resolve(
        &self,
        sound: &str,
        index: i64,
        note: Option<f64>,
        speed: f64,
    ) -> Result<ResolvedSample, ResolveError> {
        let midi = note.unwrap_or(self.reference_note);

        if let Some(key) = self.soundfont_key(sound) {
            let (path, transpose) = self
                .soundfonts
                .as_ref()
                .and_then(|table| table.font(key))
                .and_then(|font| pick(font, index, midi, self.reference_note))
                .ok_or_else(|| ResolveError::MissingSoundfont {
                    name: sound.to_string(),
                })?;
            debug!(
                sound,
                soundfont = key,
                path = %path,
                transpose,
                "Resolved soundfont sample"
            );
            return Ok(ResolvedSample {
                path,
                transpose,
                reverse: speed < 0.0,
                soundfont: true,
            });
        }

        let (path, transpose) = self
            .samples
            .bank(sound)
            .and_then(|bank| pick(bank, index, midi, self.reference_note))
            .ok_or_else(|| ResolveError::MissingSampleBank {
                name: sound.to_string(),
                known: self
                    .samples
                    .names()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            })?;
        debug!(sound, index, path = %path, transpose, "Resolved sample");
        Ok(ResolvedSample {
            path,
            transpose,
            reverse: speed < 0.0,
            soundfont: false,
        })
    }
}

/// Picks a path from a bank. None when the bank has nothing to pick from.
fn pick(bank: &SampleBank, index: i64, midi: f64, reference_note: f64) -> Option<(String, f64)> {
    match bank {
        SampleBank::List(paths) => {
            let path = nth_wrapping(paths, index)?;
            Some((path.clone(), midi - reference_note))
        }
        SampleBank::Pitched(notes) => {
            let (closest, key_midi) = closest_note(notes, midi)?;
            let path = nth_wrapping(&closest.paths, index)?;
            Some((path.clone(), midi - key_midi))
        }
    }
}

fn nth_wrapping(paths: &[String], index: i64) -> Option<&String> {
    if paths.is_empty() {
        return None;
    }
    paths.get(index.rem_euclid(paths.len() as i64) as usize)
}

/// The note entry nearest to `midi`. Ties go to the entry that comes first.
fn closest_note(notes: &[NoteSamples], midi: f64) -> Option<(&NoteSamples, f64)> {
    let mut closest: Option<(&NoteSamples, f64)> = None;
    for entry in notes.iter().filter(|entry| !entry.paths.is_empty()) {
        let key_midi = match note_to_midi(&entry.note) {
            Ok(key_midi) => key_midi,
            Err(e) => {
                debug!(
                    note = %entry.note,
                    err = %e,
                    "Skipping sample key that is not a note"
                );
                continue;
            }
        };
        let is_closer = closest
            .map(|(_, best)| (key_midi - midi).abs() < (best - midi).abs())
            .unwrap_or(true);
        if is_closer {
            closest = Some((entry, key_midi));
        }
    }
    closest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(json: &str) -> SampleResolver {
        SampleResolver::new(SampleMap::from_json(json).unwrap(), 36.0)
    }

    #[test]
    fn test_list_index_wraps() {
        let resolver = resolver(r#"{ "bd": ["a.wav", "b.wav"] }"#);

        let path = |index| resolver.resolve("bd", index, None, 1.0).unwrap().path;
        assert_eq!(path(0), "a.wav");
        assert_eq!(path(1), "b.wav");
        assert_eq!(path(2), "a.wav");
        assert_eq!(path(-1), "b.wav");

        let resolved = resolver.resolve("bd", 0, None, 1.0).unwrap();
        assert_eq!(resolved.transpose, 0.0);
        assert!(!resolved.reverse);
        assert!(!resolved.soundfont);
    }

    #[test]
    fn test_list_is_pitched_from_reference_note() {
        let resolver = resolver(r#"{ "bd": ["a.wav"] }"#);
        let resolved = resolver.resolve("bd", 0, Some(48.0), 1.0).unwrap();
        assert_eq!(resolved.transpose, 12.0);
    }

    #[test]
    fn test_nearest_note() {
        let resolver = resolver(r#"{ "piano": { "c3": ["x.wav"], "d3": ["y.wav"] } }"#);

        // c#3 is one semitone above c3 and one below d3; the first key wins.
        let resolved = resolver.resolve("piano", 0, Some(49.0), 1.0).unwrap();
        assert_eq!(resolved.path, "x.wav");
        assert_eq!(resolved.transpose, 1.0);

        let resolved = resolver.resolve("piano", 0, Some(51.0), 1.0).unwrap();
        assert_eq!(resolved.path, "y.wav");
        assert_eq!(resolved.transpose, 1.0);

        let resolved = resolver.resolve("piano", 0, Some(47.0), 1.0).unwrap();
        assert_eq!(resolved.path, "x.wav");
        assert_eq!(resolved.transpose, -1.0);
    }

    #[test]
    fn test_tie_goes_to_first_key_in_file_order() {
        let resolver = resolver(r#"{ "piano": { "d3": ["y.wav"], "c3": ["x.wav"] } }"#);
        let resolved = resolver.resolve("piano", 0, Some(49.0), 1.0).unwrap();
        assert_eq!(resolved.path, "y.wav");
        assert_eq!(resolved.transpose, -1.0);
    }

    #[test]
    fn test_pitched_index_wraps_within_note() {
        let resolver = resolver(r#"{ "piano": { "c3": ["x0.wav", "x1.wav"] } }"#);
        let resolved = resolver.resolve("piano", 3, Some(48.0), 1.0).unwrap();
        assert_eq!(resolved.path, "x1.wav");
        assert_eq!(resolved.transpose, 0.0);
    }

    #[test]
    fn test_missing_bank_lists_known_banks() {
        let resolver = resolver(r#"{ "sn": ["s.wav"], "bd": ["b.wav"] }"#);
        let err = resolver.resolve("hh", 0, None, 1.0).unwrap_err();
        assert_eq!(
            err,
            ResolveError::MissingSampleBank {
                name: "hh".to_string(),
                known: vec!["bd".to_string(), "sn".to_string()],
            }
        );
        assert_eq!(err.to_string(), "sample not found: 'hh', try one of: bd, sn");
    }

    #[test]
    fn test_empty_bank_is_missing() {
        let resolver = resolver(r#"{ "bd": [], "piano": {} }"#);
        assert!(matches!(
            resolver.resolve("bd", 0, None, 1.0),
            Err(ResolveError::MissingSampleBank { .. })
        ));
        assert!(matches!(
            resolver.resolve("piano", 0, None, 1.0),
            Err(ResolveError::MissingSampleBank { .. })
        ));
    }

    #[test]
    fn test_negative_speed_reverses() {
        let resolver = resolver(r#"{ "bd": ["a.wav"] }"#);
        assert!(resolver.resolve("bd", 0, None, -1.0).unwrap().reverse);
    }

    #[test]
    fn test_soundfont() {
        let table = SoundfontTable::from_json(
            r#"{
                "instruments": ["0000_JCLive_sf2_file", "0040_Aspirin_sf2_file"],
                "instrumentNames": ["acoustic_grand_piano", "x", "x", "x", "electric_piano_1"],
                "fonts": { "0000_JCLive_sf2_file": { "c4": ["piano_c4.wav"] } }
            }"#,
        )
        .unwrap();
        let resolver = resolver(r#"{ "bd": ["a.wav"] }"#).with_soundfonts(table);

        let resolved = resolver
            .resolve("acoustic_grand_piano", 0, Some(62.0), 1.0)
            .unwrap();
        assert_eq!(resolved.path, "piano_c4.wav");
        assert_eq!(resolved.transpose, 2.0);
        assert!(resolved.soundfont);

        assert_eq!(
            resolver.resolve("electric_piano_1", 0, None, 1.0),
            Err(ResolveError::MissingSoundfont {
                name: "electric_piano_1".to_string()
            })
        );

        // Sounds that are not instruments still come from the sample map.
        assert!(!resolver.resolve("bd", 0, None, 1.0).unwrap().soundfont);
    }
}
