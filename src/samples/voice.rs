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

//! Cut groups.
//!
//! A cut group holds at most one sounding voice. Starting a voice in an
//! occupied group fades the previous occupant out over a short crossfade and
//! stops its source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::audio::{AudioBackend, Automation, NodeId, Param};

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// A sample voice that can be cut.
#[derive(Debug, Clone, PartialEq)]
pub struct Voice {
    id: u64,
    /// The sound being played.
    sound: String,
    /// The buffer source node.
    source: NodeId,
    /// The gain node carrying the voice's envelope.
    envelope: NodeId,
    /// When the voice starts on the audio clock.
    start: f64,
}

impl Voice {
    pub fn new(sound: &str, source: NodeId, envelope: NodeId, start: f64) -> Voice {
        Voice {
            id: NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst),
            sound: sound.to_string(),
            source,
            envelope,
            start,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sound(&self) -> &str {
        &self.sound
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    pub fn envelope(&self) -> NodeId {
        self.envelope
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    /// Fades the voice to silence over `crossfade` seconds from `at` and stops
    /// its source once silent. The envelope keeps its level up to `at`.
    pub fn fade_out(&self, backend: &dyn AudioBackend, at: f64, crossfade: f64) {
        backend.schedule(
            self.envelope,
            Param::Gain,
            Automation::CancelAndHoldAtTime { time: at },
        );
        backend.schedule(
            self.envelope,
            Param::Gain,
            Automation::LinearRampToValueAtTime {
                value: 0.0,
                time: at + crossfade,
            },
        );
        backend.stop(self.source, at + crossfade);
    }
}

/// The current occupant of every cut group.
#[derive(Debug, Default)]
pub struct VoiceManager {
    groups: HashMap<i64, Voice>,
}

impl VoiceManager {
    /// Creates a new voice manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `voice` the occupant of `group`, fading out the previous occupant
    /// from `at`. Returns the voice that was cut, if any.
    pub fn claim(
        &mut self,
        backend: &dyn AudioBackend,
        group: i64,
        voice: Voice,
        at: f64,
        crossfade: f64,
    ) -> Option<Voice> {
        let previous = self.groups.insert(group, voice);
        if let Some(previous) = &previous {
            debug!(
                group,
                cut = previous.id(),
                sound = previous.sound(),
                started = previous.start(),
                at,
                "Cutting voice"
            );
            previous.fade_out(backend, at, crossfade);
        }
        previous
    }

    /// Forgets `voice_id` if it still occupies `group`. Returns whether it did.
    pub fn release(&mut self, group: i64, voice_id: u64) -> bool {
        match self.groups.get(&group) {
            Some(voice) if voice.id == voice_id => {
                self.groups.remove(&group);
                true
            }
            _ => false,
        }
    }

    pub fn occupant(&self, group: i64) -> Option<&Voice> {
        self.groups.get(&group)
    }

    /// Number of occupied cut groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::RecordingBackend;
    use crate::audio::{NodeKind, Waveform};

    fn voice(backend: &RecordingBackend, start: f64) -> Voice {
        let source = backend.create_node(NodeKind::Oscillator {
            waveform: Waveform::Sine,
            frequency: 220.0,
        });
        let envelope = backend.create_node(NodeKind::Gain { gain: 0.0 });
        let events = [
            Automation::SetValueAtTime {
                value: 0.0,
                time: start,
            },
            Automation::LinearRampToValueAtTime {
                value: 0.8,
                time: start + 0.125,
            },
            Automation::SetValueAtTime {
                value: 0.8,
                time: start + 10.0,
            },
            Automation::LinearRampToValueAtTime {
                value: 0.0,
                time: start + 10.125,
            },
        ];
        for event in events {
            backend.schedule(envelope, Param::Gain, event);
        }
        backend.connect(source, envelope);
        backend.start(source, start, 0.0);
        backend.stop(source, start + 10.0);
        Voice::new("bd", source, envelope, start)
    }

    #[test]
    fn test_claim_empty_group() {
        let backend = RecordingBackend::new(48000);
        let mut manager = VoiceManager::new();
        let first = voice(&backend, 0.0);

        assert!(manager
            .claim(&backend, 1, first.clone(), 0.0, 0.25)
            .is_none());
        assert_eq!(manager.occupant(1), Some(&first));
        assert_eq!(
            backend
                .node(first.envelope())
                .unwrap()
                .automation_of(Param::Gain)
                .len(),
            4
        );
    }

    #[test]
    fn test_claim_fades_previous_occupant() {
        let backend = RecordingBackend::new(48000);
        let mut manager = VoiceManager::new();
        let first = voice(&backend, 0.0);
        let second = voice(&backend, 1.0);

        manager.claim(&backend, 1, first.clone(), 0.0, 0.25);
        let cut = manager.claim(&backend, 1, second.clone(), 1.0, 0.25);
        assert_eq!(cut, Some(first.clone()));
        assert_eq!(manager.occupant(1), Some(&second));

        let envelope = backend.node(first.envelope()).unwrap();
        assert_eq!(
            envelope.automation_of(Param::Gain)[4..],
            [
                Automation::CancelAndHoldAtTime { time: 1.0 },
                Automation::LinearRampToValueAtTime {
                    value: 0.0,
                    time: 1.25
                },
            ]
        );
        assert_eq!(envelope.value_at(Param::Gain, 0.5), 0.8);
        assert_eq!(envelope.value_at(Param::Gain, 0.999), 0.8);
        assert_eq!(envelope.value_at(Param::Gain, 1.0), 0.8);
        assert_eq!(envelope.value_at(Param::Gain, 1.125), 0.4);
        assert_eq!(envelope.value_at(Param::Gain, 1.25), 0.0);
        assert_eq!(envelope.value_at(Param::Gain, 5.0), 0.0);
        assert_eq!(backend.node(first.source()).unwrap().stopped, Some(1.25));
    }

    #[test]
    fn test_groups_are_independent() {
        let backend = RecordingBackend::new(48000);
        let mut manager = VoiceManager::new();
        let first = voice(&backend, 0.0);
        let second = voice(&backend, 0.5);

        manager.claim(&backend, 1, first.clone(), 0.0, 0.25);
        assert!(manager.claim(&backend, 2, second, 0.5, 0.25).is_none());
        assert_eq!(manager.len(), 2);
        assert_eq!(backend.node(first.source()).unwrap().stopped, Some(10.0));
    }

    #[test]
    fn test_release_only_current_occupant() {
        let backend = RecordingBackend::new(48000);
        let mut manager = VoiceManager::new();
        let first = voice(&backend, 0.0);
        let second = voice(&backend, 1.0);

        manager.claim(&backend, 1, first.clone(), 0.0, 0.25);
        manager.claim(&backend, 1, second.clone(), 1.0, 0.25);

        assert!(!manager.release(1, first.id()));
        assert_eq!(manager.occupant(1), Some(&second));
        assert!(manager.release(1, second.id()));
        assert!(manager.is_empty());
    }
}
