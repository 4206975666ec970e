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
use std::path::Path;
use std::time::Duration;

use config::{Config, File, FileFormat};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_CROSSFADE: Duration = Duration::from_millis(1);
const DEFAULT_PANIC_FADE: Duration = Duration::from_millis(10);
const DEFAULT_OSCILLATOR_LEVEL: f64 = 0.3;
const DEFAULT_GAIN: f64 = 0.8;
const DEFAULT_ORBIT: i64 = 1;
const DEFAULT_NOTE: f64 = 36.0;
const DEFAULT_DELAY_TIME: f64 = 0.25;
const DEFAULT_DELAY_FEEDBACK: f64 = 0.5;
const DEFAULT_REVERB_SIZE: f64 = 2.0;

/// Attack, decay, sustain and release defaults for one kind of voice.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeDefaults {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl EnvelopeDefaults {
    pub const OSCILLATOR: EnvelopeDefaults = EnvelopeDefaults {
        attack: 0.001,
        decay: 0.05,
        sustain: 0.6,
        release: 0.01,
    };

    pub const SAMPLE: EnvelopeDefaults = EnvelopeDefaults {
        attack: 0.001,
        decay: 0.001,
        sustain: 1.0,
        release: 0.001,
    };
}

/// A YAML representation of the trigger engine defaults. Every field is optional.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct EngineConfig {
    /// How long a stolen cut-group voice takes to fade out, e.g. "1ms".
    crossfade: Option<String>,

    /// How long the master output takes to fade out on panic.
    panic_fade: Option<String>,

    oscillator_envelope: Option<EnvelopeDefaults>,

    sample_envelope: Option<EnvelopeDefaults>,

    /// Fixed level applied to oscillators, which are much louder than typical samples.
    oscillator_level: Option<f64>,

    default_gain: Option<f64>,

    default_orbit: Option<i64>,

    /// MIDI note used when neither a note nor an index is given.
    default_note: Option<f64>,

    delay_time: Option<f64>,

    delay_feedback: Option<f64>,

    reverb_size: Option<f64>,
}

impl EngineConfig {
    /// Parses the engine configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<EngineConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<EngineConfig>()?)
    }

    /// Parses the engine configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<EngineConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize::<EngineConfig>()?)
    }

    /// Cut-group crossfade (default: 1ms).
    pub fn crossfade(&self) -> Result<Duration, ConfigError> {
        parse_duration("crossfade", self.crossfade.as_deref(), DEFAULT_CROSSFADE)
    }

    /// Panic fade-out (default: 10ms).
    pub fn panic_fade(&self) -> Result<Duration, ConfigError> {
        parse_duration("panic_fade", self.panic_fade.as_deref(), DEFAULT_PANIC_FADE)
    }

    pub fn oscillator_envelope(&self) -> EnvelopeDefaults {
        self.oscillator_envelope.unwrap_or(EnvelopeDefaults::OSCILLATOR)
    }

    pub fn sample_envelope(&self) -> EnvelopeDefaults {
        self.sample_envelope.unwrap_or(EnvelopeDefaults::SAMPLE)
    }

    pub fn oscillator_level(&self) -> f64 {
        self.oscillator_level.unwrap_or(DEFAULT_OSCILLATOR_LEVEL)
    }

    pub fn default_gain(&self) -> f64 {
        self.default_gain.unwrap_or(DEFAULT_GAIN)
    }

    pub fn default_orbit(&self) -> i64 {
        self.default_orbit.unwrap_or(DEFAULT_ORBIT)
    }

    pub fn default_note(&self) -> f64 {
        self.default_note.unwrap_or(DEFAULT_NOTE)
    }

    pub fn delay_time(&self) -> f64 {
        self.delay_time.unwrap_or(DEFAULT_DELAY_TIME)
    }

    pub fn delay_feedback(&self) -> f64 {
        self.delay_feedback.unwrap_or(DEFAULT_DELAY_FEEDBACK)
    }

    pub fn reverb_size(&self) -> f64 {
        self.reverb_size.unwrap_or(DEFAULT_REVERB_SIZE)
    }
}

fn parse_duration(
    field: &'static str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => Ok(DurationString::from_string(value.to_string())
            .map_err(|e| ConfigError::Duration {
                field,
                reason: e.to_string(),
            })?
            .into()),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.crossfade().unwrap(), Duration::from_millis(1));
        assert_eq!(config.panic_fade().unwrap(), Duration::from_millis(10));
        assert_eq!(config.oscillator_envelope(), EnvelopeDefaults::OSCILLATOR);
        assert_eq!(config.sample_envelope(), EnvelopeDefaults::SAMPLE);
        assert_eq!(config.default_gain(), 0.8);
        assert_eq!(config.default_orbit(), 1);
        assert_eq!(config.default_note(), 36.0);
        assert_eq!(config.delay_time(), 0.25);
        assert_eq!(config.delay_feedback(), 0.5);
        assert_eq!(config.reverb_size(), 2.0);
        assert_eq!(config.oscillator_level(), 0.3);
    }

    #[test]
    fn test_from_yaml() {
        let config = EngineConfig::from_yaml(
            r#"
            crossfade: 5ms
            default_gain: 1.0
            default_orbit: 2
            sample_envelope:
              attack: 0.01
              decay: 0.1
              sustain: 0.5
              release: 0.2
            "#,
        )
        .unwrap();

        assert_eq!(config.crossfade().unwrap(), Duration::from_millis(5));
        assert_eq!(config.default_gain(), 1.0);
        assert_eq!(config.default_orbit(), 2);
        assert_eq!(
            config.sample_envelope(),
            EnvelopeDefaults {
                attack: 0.01,
                decay: 0.1,
                sustain: 0.5,
                release: 0.2,
            }
        );
        assert_eq!(config.oscillator_envelope(), EnvelopeDefaults::OSCILLATOR);
    }

    #[test]
    fn test_bad_duration() {
        let config = EngineConfig::from_yaml("crossfade: soon").unwrap();
        assert!(matches!(
            config.crossfade(),
            Err(ConfigError::Duration {
                field: "crossfade",
                ..
            })
        ));
    }

    #[test]
    fn test_deserialize_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "panic_fade: 50ms\nreverb_size: 4.0\n").unwrap();

        let config = EngineConfig::deserialize(&path).unwrap();
        assert_eq!(config.panic_fade().unwrap(), Duration::from_millis(50));
        assert_eq!(config.reverb_size(), 4.0);
    }
}
