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

use crate::audio::{AudioBackend, Automation, NodeId, Param};
use crate::config::EnvelopeDefaults;

/// An ADSR envelope. Times are in seconds, sustain is a fraction of the peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl From<EnvelopeDefaults> for Envelope {
    fn from(defaults: EnvelopeDefaults) -> Self {
        Envelope {
            attack: defaults.attack,
            decay: defaults.decay,
            sustain: defaults.sustain,
            release: defaults.release,
        }
    }
}

impl Envelope {
    /// Takes each stage from the controls when given, otherwise from `defaults`.
    pub fn from_controls(
        defaults: EnvelopeDefaults,
        attack: Option<f64>,
        decay: Option<f64>,
        sustain: Option<f64>,
        release: Option<f64>,
    ) -> Envelope {
        Envelope {
            attack: attack.unwrap_or(defaults.attack),
            decay: decay.unwrap_or(defaults.decay),
            sustain: sustain.unwrap_or(defaults.sustain),
            release: release.unwrap_or(defaults.release),
        }
    }

    /// Schedules the envelope on the gain of `node` for a note held from
    /// `begin` to `end`. The release runs after `end`.
    pub fn schedule(
        &self,
        backend: &dyn AudioBackend,
        node: NodeId,
        peak: f64,
        begin: f64,
        end: f64,
    ) {
        let sustain = self.sustain * peak;
        let events = [
            Automation::SetValueAtTime {
                value: 0.0,
                time: begin,
            },
            Automation::LinearRampToValueAtTime {
                value: peak,
                time: begin + self.attack,
            },
            Automation::LinearRampToValueAtTime {
                value: sustain,
                time: begin + self.attack + self.decay,
            },
            Automation::SetValueAtTime {
                value: sustain,
                time: end,
            },
            Automation::LinearRampToValueAtTime {
                value: 0.0,
                time: end + self.release,
            },
        ];
        for event in events {
            backend.schedule(node, Param::Gain, event);
        }
    }
}
