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

//! The node kinds, parameters and automation events understood by an audio backend.

use std::{fmt, str::FromStr, sync::Arc};

use super::buffer::AudioBuffer;

/// Identifies a node within one backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Returned when a name does not match any variant of a node option.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Basic oscillator waveforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Square,
    Triangle,
    Sawtooth,
}

impl Waveform {
    pub fn as_str(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Triangle => "triangle",
            Waveform::Sawtooth => "sawtooth",
        }
    }
}

impl FromStr for Waveform {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "triangle" => Ok(Waveform::Triangle),
            "sawtooth" => Ok(Waveform::Sawtooth),
            _ => Err(UnknownVariant {
                kind: "waveform",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Biquad filter responses used by the voice chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
}

impl FilterType {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::Lowpass => "lowpass",
            FilterType::Highpass => "highpass",
            FilterType::Bandpass => "bandpass",
        }
    }
}

/// Formant filter vowels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vowel {
    A,
    E,
    I,
    O,
    U,
}

impl Vowel {
    pub fn as_str(self) -> &'static str {
        match self {
            Vowel::A => "a",
            Vowel::E => "e",
            Vowel::I => "i",
            Vowel::O => "o",
            Vowel::U => "u",
        }
    }
}

impl FromStr for Vowel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" => Ok(Vowel::A),
            "e" => Ok(Vowel::E),
            "i" => Ok(Vowel::I),
            "o" => Ok(Vowel::O),
            "u" => Ok(Vowel::U),
            _ => Err(UnknownVariant {
                kind: "vowel",
                value: s.to_string(),
            }),
        }
    }
}

/// A loop region in seconds of buffer time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRegion {
    pub start: f64,
    pub end: f64,
}

/// Everything the engine can ask a backend to build.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Oscillator {
        waveform: Waveform,
        frequency: f64,
    },
    BufferSource {
        buffer: Arc<AudioBuffer>,
        playback_rate: f64,
        loop_region: Option<LoopRegion>,
    },
    Gain {
        gain: f64,
    },
    Filter {
        filter: FilterType,
        frequency: f64,
        q: f64,
    },
    VowelFilter {
        vowel: Vowel,
    },
    /// Sample-rate reduction: holds every `factor`th sample.
    Coarse {
        factor: f64,
    },
    /// Bit depth reduction.
    Crush {
        bits: f64,
    },
    /// Waveshaping distortion, amount in `[0, 1)`.
    Shape {
        amount: f64,
    },
    /// Equal-power stereo panner, pan in `[-1, 1]`.
    StereoPanner {
        pan: f64,
    },
    FeedbackDelay {
        time: f64,
        feedback: f64,
    },
    Reverb {
        duration: f64,
    },
}

impl NodeKind {
    /// Short name for logs and plans.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Oscillator { .. } => "oscillator",
            NodeKind::BufferSource { .. } => "buffer-source",
            NodeKind::Gain { .. } => "gain",
            NodeKind::Filter { filter, .. } => filter.as_str(),
            NodeKind::VowelFilter { .. } => "vowel",
            NodeKind::Coarse { .. } => "coarse",
            NodeKind::Crush { .. } => "crush",
            NodeKind::Shape { .. } => "shape",
            NodeKind::StereoPanner { .. } => "pan",
            NodeKind::FeedbackDelay { .. } => "delay",
            NodeKind::Reverb { .. } => "reverb",
        }
    }

    /// Sources are the nodes that can be started, stopped and that end.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            NodeKind::Oscillator { .. } | NodeKind::BufferSource { .. }
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Oscillator {
                waveform,
                frequency,
            } => write!(f, "oscillator({waveform}, {frequency:.3}Hz)"),
            NodeKind::BufferSource {
                buffer,
                playback_rate,
                loop_region,
            } => {
                write!(
                    f,
                    "buffer-source({:.3}s, rate {:.4})",
                    buffer.duration(),
                    playback_rate
                )?;
                if let Some(region) = loop_region {
                    write!(f, " loop {:.3}..{:.3}", region.start, region.end)?;
                }
                Ok(())
            }
            NodeKind::Gain { gain } => write!(f, "gain({gain})"),
            NodeKind::Filter {
                filter,
                frequency,
                q,
            } => write!(f, "{}({frequency}Hz, q {q})", filter.as_str()),
            NodeKind::VowelFilter { vowel } => write!(f, "vowel({})", vowel.as_str()),
            NodeKind::Coarse { factor } => write!(f, "coarse({factor})"),
            NodeKind::Crush { bits } => write!(f, "crush({bits})"),
            NodeKind::Shape { amount } => write!(f, "shape({amount})"),
            NodeKind::StereoPanner { pan } => write!(f, "pan({pan})"),
            NodeKind::FeedbackDelay { time, feedback } => {
                write!(f, "delay({time}s, feedback {feedback})")
            }
            NodeKind::Reverb { duration } => write!(f, "reverb({duration}s)"),
        }
    }
}

/// Automatable node parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Gain,
    Frequency,
    Q,
    PlaybackRate,
    Pan,
    DelayTime,
    Feedback,
    ReverbDuration,
}

/// A scheduled parameter change on the audio clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Automation {
    SetValueAtTime { value: f64, time: f64 },
    LinearRampToValueAtTime { value: f64, time: f64 },
    /// Drops every event scheduled at or after `time`.
    CancelScheduledValues { time: f64 },
    /// Drops every event after `time` and holds the value the parameter would
    /// have had at `time`.
    CancelAndHoldAtTime { time: f64 },
}

impl Automation {
    pub fn time(&self) -> f64 {
        match self {
            Automation::SetValueAtTime { time, .. }
            | Automation::LinearRampToValueAtTime { time, .. }
            | Automation::CancelScheduledValues { time }
            | Automation::CancelAndHoldAtTime { time } => *time,
        }
    }
}
