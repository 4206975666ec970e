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

//! Control records.
//!
//! A hap meant for the trigger engine carries a flat JSON object of controls
//! (`s`, `n`, `note`, `gain`, `cutoff`, ...). The record is read once into
//! [`Controls`] and then settled into a [`VoiceSpec`]: which source to play and
//! which stages to put after it. Unknown keys are ignored.

use std::str::FromStr;

use serde_json::{Map, Value};

use super::envelope::Envelope;
use super::error::TriggerError;
use crate::audio::{FilterType, NodeKind, Vowel, Waveform};
use crate::config::EngineConfig;
use crate::notes::{midi_to_freq, note_to_midi};

/// A pitch given either as a MIDI number or as a note name.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteValue {
    Midi(f64),
    Name(String),
}

impl NoteValue {
    fn to_midi(&self, field: &'static str) -> Result<f64, TriggerError> {
        match self {
            NoteValue::Midi(midi) => Ok(*midi),
            NoteValue::Name(name) => match name.parse::<f64>() {
                Ok(midi) => Ok(midi),
                Err(_) => {
                    note_to_midi(name).map_err(|e| TriggerError::invalid(field, e.to_string()))
                }
            },
        }
    }

    fn to_index(&self) -> Result<f64, TriggerError> {
        match self {
            NoteValue::Midi(index) => Ok(*index),
            NoteValue::Name(name) => name.parse::<f64>().map_err(|_| {
                TriggerError::invalid("n", format!("'{name}' is not a sample index"))
            }),
        }
    }
}

/// The controls of one hap, as given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Controls {
    pub s: Option<String>,
    pub bank: Option<String>,
    pub n: Option<NoteValue>,
    pub note: Option<NoteValue>,
    pub freq: Option<f64>,

    pub attack: Option<f64>,
    pub decay: Option<f64>,
    pub sustain: Option<f64>,
    pub release: Option<f64>,

    pub gain: Option<f64>,

    pub cutoff: Option<f64>,
    pub resonance: Option<f64>,
    pub hcutoff: Option<f64>,
    pub hresonance: Option<f64>,
    pub bandf: Option<f64>,
    pub bandq: Option<f64>,
    pub vowel: Option<Vowel>,

    pub speed: Option<f64>,
    pub begin: Option<f64>,
    pub end: Option<f64>,
    pub loop_count: Option<f64>,
    pub unit: Option<String>,
    pub nudge: Option<f64>,
    pub cut: Option<i64>,
    pub clip: bool,

    pub coarse: Option<f64>,
    pub crush: Option<f64>,
    pub shape: Option<f64>,
    pub pan: Option<f64>,

    pub delay: Option<f64>,
    pub delaytime: Option<f64>,
    pub delayfeedback: Option<f64>,
    pub room: Option<f64>,
    pub roomsize: Option<f64>,
    pub size: Option<f64>,

    pub orbit: Option<i64>,
}

impl Controls {
    /// Reads the controls from a hap value, which must be a JSON object.
    pub fn from_value(value: &Value) -> Result<Controls, TriggerError> {
        let record = match value {
            Value::Object(map) => Record(map),
            other => {
                return Err(TriggerError::ValueShape {
                    found: json_kind(other),
                })
            }
        };

        Ok(Controls {
            s: record.string("s")?,
            bank: record.string("bank")?,
            n: record.note("n")?,
            note: record.note("note")?,
            freq: record.number("freq")?,
            attack: record.duration("attack")?,
            decay: record.duration("decay")?,
            sustain: record.number("sustain")?,
            release: record.duration("release")?,
            gain: record.number("gain")?,
            cutoff: record.number("cutoff")?,
            resonance: record.number("resonance")?,
            hcutoff: record.number("hcutoff")?,
            hresonance: record.number("hresonance")?,
            bandf: record.number("bandf")?,
            bandq: record.number("bandq")?,
            vowel: record
                .string("vowel")?
                .map(|vowel| {
                    Vowel::from_str(&vowel)
                        .map_err(|e| TriggerError::invalid("vowel", e.to_string()))
                })
                .transpose()?,
            speed: record.number("speed")?,
            begin: record.number("begin")?,
            end: record.number("end")?,
            loop_count: record.number("loop")?,
            unit: record.string("unit")?,
            nudge: record.number("nudge")?,
            cut: record.integer("cut")?,
            clip: record.flag("clip")?,
            coarse: record.number("coarse")?,
            crush: record.number("crush")?,
            shape: record.number("shape")?,
            pan: record.number("pan")?,
            delay: record.number("delay")?,
            delaytime: record.number("delaytime")?,
            delayfeedback: record.number("delayfeedback")?,
            room: record.number("room")?,
            roomsize: record.number("roomsize")?,
            size: record.number("size")?,
            orbit: record.integer("orbit")?,
        })
    }

    /// Settles the controls into a voice, filling in defaults from `config`.
    /// `velocity` scales the voice's level.
    pub fn into_voice(
        self,
        config: &EngineConfig,
        velocity: f64,
    ) -> Result<VoiceSpec, TriggerError> {
        // Empty names and zero pitches count as unset.
        let s = self.s.filter(|s| !s.is_empty());
        let mut sound = match (&self.bank, s) {
            (Some(bank), Some(s)) => Some(format!("{bank}_{s}")),
            (_, s) => s,
        };
        let mut n = self.n;
        let mut note = self
            .note
            .filter(|note| !matches!(note, NoteValue::Midi(midi) if *midi == 0.0));
        let freq = self.freq.filter(|freq| *freq != 0.0);

        if let Some((name, index)) = sound.as_deref().and_then(split_index) {
            sound = Some(name);
            n = Some(NoteValue::Midi(index));
        }
        let note_split = match &note {
            Some(NoteValue::Name(name)) => split_index(name),
            _ => None,
        };
        if let Some((name, index)) = note_split {
            note = Some(NoteValue::Name(name));
            n = Some(NoteValue::Midi(index));
        }

        let level = self.gain.unwrap_or(config.default_gain()) * velocity;
        let waveform = match sound.as_deref() {
            None => Some(Waveform::Triangle),
            Some(name) => Waveform::from_str(name).ok(),
        };

        let (source, envelope, level) = match waveform {
            Some(waveform) => {
                // An index of 0 is the default, not a pitch.
                let pitch = match (&note, &n) {
                    (Some(note), _) => note.to_midi("note")?,
                    (None, Some(NoteValue::Midi(index))) if *index == 0.0 => {
                        config.default_note()
                    }
                    (None, Some(n)) => n.to_midi("n")?,
                    (None, None) => config.default_note(),
                };
                let frequency = freq.unwrap_or_else(|| midi_to_freq(pitch));
                let envelope = Envelope::from_controls(
                    config.oscillator_envelope(),
                    self.attack,
                    self.decay,
                    self.sustain,
                    self.release,
                );
                (
                    SoundSource::Oscillator {
                        waveform,
                        frequency,
                    },
                    envelope,
                    level * config.oscillator_level(),
                )
            }
            None => {
                let index = n.as_ref().map(NoteValue::to_index).transpose()?.unwrap_or(0.0);
                let begin = self.begin.unwrap_or(0.0);
                let end = self.end.unwrap_or(1.0);
                if end <= begin {
                    return Err(TriggerError::invalid(
                        "end",
                        format!("end ({end}) must be after begin ({begin})"),
                    ));
                }
                let envelope = Envelope::from_controls(
                    config.sample_envelope(),
                    self.attack,
                    self.decay,
                    self.sustain,
                    self.release,
                );
                (
                    SoundSource::Sample {
                        sound: sound.unwrap_or_default(),
                        index: index.floor() as i64,
                        note: note.as_ref().map(|note| note.to_midi("note")).transpose()?,
                        playback: Playback {
                            speed: self.speed.unwrap_or(1.0),
                            begin,
                            end,
                            loop_count: self.loop_count.filter(|count| *count != 0.0),
                            cycle_unit: self.unit.as_deref() == Some("c"),
                            nudge: self.nudge.unwrap_or(0.0),
                            cut: self.cut,
                            clip: self.clip,
                        },
                    },
                    envelope,
                    level,
                )
            }
        };

        let mut stages = Vec::new();
        if let Some(frequency) = self.cutoff {
            stages.push(NodeKind::Filter {
                filter: FilterType::Lowpass,
                frequency,
                q: self.resonance.unwrap_or(1.0),
            });
        }
        if let Some(frequency) = self.hcutoff {
            stages.push(NodeKind::Filter {
                filter: FilterType::Highpass,
                frequency,
                q: self.hresonance.unwrap_or(1.0),
            });
        }
        if let Some(frequency) = self.bandf {
            stages.push(NodeKind::Filter {
                filter: FilterType::Bandpass,
                frequency,
                q: self.bandq.unwrap_or(1.0),
            });
        }
        if let Some(vowel) = self.vowel {
            stages.push(NodeKind::VowelFilter { vowel });
        }
        if let Some(factor) = self.coarse {
            stages.push(NodeKind::Coarse { factor });
        }
        if let Some(bits) = self.crush {
            stages.push(NodeKind::Crush { bits });
        }
        if let Some(amount) = self.shape {
            stages.push(NodeKind::Shape { amount });
        }
        if let Some(pan) = self.pan {
            // Controls pan in [0, 1]; the panner wants [-1, 1].
            stages.push(NodeKind::StereoPanner { pan: 2.0 * pan - 1.0 });
        }

        let delay = DelaySend {
            wet: self.delay.unwrap_or(0.0),
            time: self.delaytime.unwrap_or(config.delay_time()),
            feedback: self.delayfeedback.unwrap_or(config.delay_feedback()),
        };
        let reverb = ReverbSend {
            wet: self.room.unwrap_or(0.0),
            size: self.roomsize.or(self.size).unwrap_or(config.reverb_size()),
        };

        Ok(VoiceSpec {
            source,
            envelope,
            level,
            stages,
            orbit: self.orbit.unwrap_or(config.default_orbit()),
            delay: (delay.wet > 0.0 && delay.time > 0.0 && delay.feedback > 0.0).then_some(delay),
            reverb: (reverb.wet > 0.0 && reverb.size > 0.0).then_some(reverb),
        })
    }
}

/// Splits `name:index` when the part after the colon is a number.
fn split_index(name: &str) -> Option<(String, f64)> {
    let mut parts = name.split(':');
    let name = parts.next()?;
    let index = parts.next()?.parse::<f64>().ok()?;
    Some((name.to_string(), index))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Typed access to the fields of a control record. Nulls count as absent.
struct Record<'a>(&'a Map<String, Value>);

impl Record<'_> {
    fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field).filter(|value| !value.is_null())
    }

    fn number(&self, field: &'static str) -> Result<Option<f64>, TriggerError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Number(number)) => number
                .as_f64()
                .map(Some)
                .ok_or_else(|| TriggerError::invalid(field, "number out of range")),
            Some(Value::String(text)) => text
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| TriggerError::invalid(field, format!("'{text}' is not a number"))),
            Some(other) => Err(TriggerError::invalid(
                field,
                format!("expected a number, found a {}", json_kind(other)),
            )),
        }
    }

    /// A number of seconds, which cannot be negative.
    fn duration(&self, field: &'static str) -> Result<Option<f64>, TriggerError> {
        match self.number(field)? {
            Some(seconds) if seconds < 0.0 => {
                Err(TriggerError::invalid(field, "must not be negative"))
            }
            seconds => Ok(seconds),
        }
    }

    fn integer(&self, field: &'static str) -> Result<Option<i64>, TriggerError> {
        match self.number(field)? {
            Some(number) if number.fract() != 0.0 || !number.is_finite() => Err(
                TriggerError::invalid(field, format!("{number} is not a whole number")),
            ),
            number => Ok(number.map(|number| number as i64)),
        }
    }

    fn string(&self, field: &'static str) -> Result<Option<String>, TriggerError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(Value::Number(number)) => Ok(Some(number.to_string())),
            Some(other) => Err(TriggerError::invalid(
                field,
                format!("expected a name, found a {}", json_kind(other)),
            )),
        }
    }

    fn note(&self, field: &'static str) -> Result<Option<NoteValue>, TriggerError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(NoteValue::Name(text.clone()))),
            Some(Value::Number(_)) => Ok(self.number(field)?.map(NoteValue::Midi)),
            Some(other) => Err(TriggerError::invalid(
                field,
                format!("expected a note, found a {}", json_kind(other)),
            )),
        }
    }

    fn flag(&self, field: &'static str) -> Result<bool, TriggerError> {
        match self.get(field) {
            None => Ok(false),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(_) => Ok(self.number(field)?.is_some_and(|number| number != 0.0)),
        }
    }
}

/// Where a voice's sound comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum SoundSource {
    Oscillator {
        waveform: Waveform,
        frequency: f64,
    },
    Sample {
        sound: String,
        index: i64,
        /// Requested pitch as a MIDI note, if any.
        note: Option<f64>,
        playback: Playback,
    },
}

/// How a sample is played back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Playback {
    /// Playback speed; negative plays the sample backwards, zero plays nothing.
    pub speed: f64,
    /// Trim window as fractions of the sample.
    pub begin: f64,
    pub end: f64,
    /// Times to repeat the trimmed window.
    pub loop_count: Option<f64>,
    /// Speed is in cycles: the whole sample plays in one second at speed 1.
    pub cycle_unit: bool,
    /// Seconds to shift the start by.
    pub nudge: f64,
    pub cut: Option<i64>,
    /// Play for the event's duration instead of the sample's.
    pub clip: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelaySend {
    pub wet: f64,
    pub time: f64,
    pub feedback: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReverbSend {
    pub wet: f64,
    pub size: f64,
}

/// Everything needed to build one voice.
#[derive(Debug, Clone)]
pub struct VoiceSpec {
    pub source: SoundSource,
    pub envelope: Envelope,
    /// Envelope peak.
    pub level: f64,
    /// Processing stages after the envelope, in chain order.
    pub stages: Vec<NodeKind>,
    pub orbit: i64,
    pub delay: Option<DelaySend>,
    pub reverb: Option<ReverbSend>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::EnvelopeDefaults;

    fn voice(value: Value) -> VoiceSpec {
        Controls::from_value(&value)
            .unwrap()
            .into_voice(&EngineConfig::default(), 1.0)
            .unwrap()
    }

    fn voice_err(value: Value) -> TriggerError {
        match Controls::from_value(&value) {
            Ok(controls) => controls
                .into_voice(&EngineConfig::default(), 1.0)
                .unwrap_err(),
            Err(e) => e,
        }
    }

    #[test]
    fn test_value_must_be_an_object() {
        assert!(matches!(
            voice_err(json!(3)),
            TriggerError::ValueShape { found: "number" }
        ));
        assert!(matches!(
            voice_err(json!("bd")),
            TriggerError::ValueShape { found: "string" }
        ));
    }

    #[test]
    fn test_no_sound_is_a_triangle_at_the_default_note() {
        let spec = voice(json!({}));
        assert_eq!(
            spec.source,
            SoundSource::Oscillator {
                waveform: Waveform::Triangle,
                frequency: midi_to_freq(36.0),
            }
        );
        assert_eq!(spec.envelope, Envelope::from(EnvelopeDefaults::OSCILLATOR));
        assert!((spec.level - 0.8 * 0.3).abs() < 1e-12);
        assert!(spec.stages.is_empty());
        assert_eq!(spec.orbit, 1);
        assert_eq!(spec.delay, None);
        assert_eq!(spec.reverb, None);
    }

    #[test]
    fn test_waveform_names_pick_the_oscillator() {
        let spec = voice(json!({"s": "sawtooth", "note": "a4"}));
        assert_eq!(
            spec.source,
            SoundSource::Oscillator {
                waveform: Waveform::Sawtooth,
                frequency: 440.0,
            }
        );

        let spec = voice(json!({"s": "sine", "n": 69, "freq": 100.0}));
        assert_eq!(
            spec.source,
            SoundSource::Oscillator {
                waveform: Waveform::Sine,
                frequency: 100.0,
            }
        );
    }

    #[test]
    fn test_sample_source() {
        let spec = voice(json!({"s": "bd", "n": 3, "speed": -2, "cut": 1}));
        let SoundSource::Sample {
            sound,
            index,
            note,
            playback,
        } = spec.source
        else {
            panic!("expected a sample source");
        };
        assert_eq!(sound, "bd");
        assert_eq!(index, 3);
        assert_eq!(note, None);
        assert_eq!(playback.speed, -2.0);
        assert_eq!(playback.cut, Some(1));
        assert_eq!(playback.begin, 0.0);
        assert_eq!(playback.end, 1.0);
        assert_eq!(spec.envelope, Envelope::from(EnvelopeDefaults::SAMPLE));
        assert_eq!(spec.level, 0.8);
    }

    #[test]
    fn test_bank_and_index_suffix() {
        let spec = voice(json!({"s": "bd:2", "bank": "RolandTR909"}));
        let SoundSource::Sample { sound, index, .. } = spec.source else {
            panic!("expected a sample source");
        };
        assert_eq!(sound, "RolandTR909_bd");
        assert_eq!(index, 2);

        let spec = voice(json!({"s": "piano", "note": "c4:1"}));
        let SoundSource::Sample { index, note, .. } = spec.source else {
            panic!("expected a sample source");
        };
        assert_eq!(index, 1);
        assert_eq!(note, Some(60.0));
    }

    #[test]
    fn test_stages_in_chain_order() {
        let spec = voice(json!({
            "s": "bd",
            "pan": 1,
            "shape": 0.5,
            "vowel": "a",
            "hcutoff": 200,
            "cutoff": 1000,
            "resonance": 5,
        }));
        let names: Vec<&str> = spec.stages.iter().map(NodeKind::name).collect();
        assert_eq!(names, vec!["lowpass", "highpass", "vowel", "shape", "pan"]);
        assert!(matches!(
            spec.stages[0],
            NodeKind::Filter { q, .. } if q == 5.0
        ));
        assert!(matches!(
            spec.stages[4],
            NodeKind::StereoPanner { pan } if pan == 1.0
        ));
    }

    #[test]
    fn test_sends() {
        let spec = voice(json!({"s": "bd", "delay": 0.5, "room": 0.3, "size": 4, "orbit": 2}));
        assert_eq!(spec.orbit, 2);
        assert_eq!(
            spec.delay,
            Some(DelaySend {
                wet: 0.5,
                time: 0.25,
                feedback: 0.5,
            })
        );
        assert_eq!(spec.reverb, Some(ReverbSend { wet: 0.3, size: 4.0 }));

        let spec = voice(json!({"s": "bd", "delay": 0.5, "delayfeedback": 0}));
        assert_eq!(spec.delay, None);
    }

    #[test]
    fn test_velocity_scales_level() {
        let spec = Controls::from_value(&json!({"s": "bd", "gain": 0.5}))
            .unwrap()
            .into_voice(&EngineConfig::default(), 0.5)
            .unwrap();
        assert_eq!(spec.level, 0.25);
    }

    #[test]
    fn test_invalid_controls() {
        assert!(matches!(
            voice_err(json!({"s": "bd", "gain": "loud"})),
            TriggerError::InvalidControl { field: "gain", .. }
        ));
        assert!(matches!(
            voice_err(json!({"s": "bd", "vowel": "y"})),
            TriggerError::InvalidControl { field: "vowel", .. }
        ));
        assert!(matches!(
            voice_err(json!({"s": "bd", "cut": 1.5})),
            TriggerError::InvalidControl { field: "cut", .. }
        ));
        assert!(matches!(
            voice_err(json!({"s": "bd", "attack": -1})),
            TriggerError::InvalidControl { field: "attack", .. }
        ));
        assert!(matches!(
            voice_err(json!({"s": "bd", "begin": 0.5, "end": 0.5})),
            TriggerError::InvalidControl { field: "end", .. }
        ));
        assert!(matches!(
            voice_err(json!({"note": "h3"})),
            TriggerError::InvalidControl { field: "note", .. }
        ));
    }

    #[test]
    fn test_empty_and_zero_values_are_unset() {
        let triangle = SoundSource::Oscillator {
            waveform: Waveform::Triangle,
            frequency: midi_to_freq(36.0),
        };
        assert_eq!(voice(json!({"s": ""})).source, triangle);
        assert_eq!(voice(json!({"note": 0})).source, triangle);
        assert_eq!(voice(json!({"freq": 0})).source, triangle);
        assert_eq!(
            voice(json!({"s": "sine", "note": 0, "n": 69})).source,
            SoundSource::Oscillator {
                waveform: Waveform::Sine,
                frequency: 440.0,
            }
        );
    }

    #[test]
    fn test_nulls_are_absent() {
        let spec = voice(json!({"s": "bd", "cutoff": null}));
        assert!(spec.stages.is_empty());
    }
}
