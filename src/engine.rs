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

//! The trigger engine.
//!
//! Each trigger turns one hap into a short-lived chain of audio nodes:
//!
//! ```text
//! source -> envelope -> [lowpass] -> [highpass] -> [bandpass] -> [vowel]
//!        -> [coarse] -> [crush] -> [shape] -> [pan] -> post -> master
//!                                                        |
//!                                                        +-> send -> orbit delay/reverb -> master
//! ```
//!
//! Bracketed stages only exist when their control is present. The chain takes
//! care of itself once scheduled: when the source ends, every node in it is
//! disconnected.

mod buses;
mod controls;
mod envelope;
mod error;

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::audio::{AudioBackend, Automation, LoopRegion, NodeId, NodeKind, Param};
use crate::config::{ConfigError, EngineConfig};
use crate::hap::Hap;
use crate::samples::{SampleLoader, SampleResolver, Voice, VoiceManager};

pub use buses::EffectBusRegistry;
pub use controls::{
    Controls, DelaySend, NoteValue, Playback, ReverbSend, SoundSource, VoiceSpec,
};
pub use envelope::Envelope;
pub use error::TriggerError;

/// State shared by every trigger of one engine.
#[derive(Debug, Default)]
pub struct EngineState {
    buses: Mutex<EffectBusRegistry>,
    cut_groups: Mutex<VoiceManager>,
    master: Mutex<Option<NodeId>>,
}

impl EngineState {
    pub fn buses(&self) -> &Mutex<EffectBusRegistry> {
        &self.buses
    }

    pub fn cut_groups(&self) -> &Mutex<VoiceManager> {
        &self.cut_groups
    }

    /// The master gain node, if one has been built.
    pub fn master(&self) -> Option<NodeId> {
        *self.master.lock()
    }
}

/// The nodes scheduled by one trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredVoice {
    pub source: NodeId,
    /// The chain from the source to the post gain, in order.
    pub chain: Vec<NodeId>,
    /// Send gains into the orbit's effect buses.
    pub sends: Vec<NodeId>,
    pub start: f64,
    pub stop: f64,
}

/// The chain built after a source, before anything is started.
struct Assembled {
    envelope: NodeId,
    chain: Vec<NodeId>,
    sends: Vec<NodeId>,
}

/// Realizes haps as audio on a backend.
pub struct TriggerEngine<B: AudioBackend + 'static> {
    backend: Arc<B>,
    resolver: SampleResolver,
    loader: SampleLoader,
    config: EngineConfig,
    state: Arc<EngineState>,
    /// Seconds.
    crossfade: f64,
    panic_fade: f64,
}

impl<B: AudioBackend + 'static> TriggerEngine<B> {
    /// Creates an engine playing samples from `resolver` on `backend`.
    pub fn new(
        backend: Arc<B>,
        resolver: SampleResolver,
        config: EngineConfig,
    ) -> Result<TriggerEngine<B>, ConfigError> {
        let crossfade = config.crossfade()?.as_secs_f64();
        let panic_fade = config.panic_fade()?.as_secs_f64();
        let loader = SampleLoader::new(backend.sample_rate());
        info!(
            banks = resolver.samples().len(),
            sample_rate = backend.sample_rate(),
            crossfade,
            "Trigger engine ready"
        );
        Ok(TriggerEngine {
            backend,
            resolver,
            loader,
            config,
            state: Arc::new(EngineState::default()),
            crossfade,
            panic_fade,
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn resolver(&self) -> &SampleResolver {
        &self.resolver
    }

    pub fn loader(&self) -> &SampleLoader {
        &self.loader
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    /// Plays `hap` starting `deadline` seconds from now for `duration` seconds.
    /// Failures are logged and only affect this hap.
    pub async fn trigger(&self, hap: &Hap<Value>, deadline: f64, duration: f64) {
        match self.try_trigger(hap, deadline, duration).await {
            Ok(Some(voice)) => debug!(
                source = %voice.source,
                nodes = voice.chain.len(),
                sends = voice.sends.len(),
                start = voice.start,
                stop = voice.stop,
                "Triggered voice"
            ),
            Ok(None) => {}
            Err(e) => warn!(err = %e, hap = %hap.show(), "Trigger dropped"),
        }
    }

    /// Like [`TriggerEngine::trigger`], but hands back what was scheduled.
    /// `Ok(None)` means the hap asked for silence.
    pub async fn try_trigger(
        &self,
        hap: &Hap<Value>,
        deadline: f64,
        duration: f64,
    ) -> Result<Option<TriggeredVoice>, TriggerError> {
        let value = hap.value().ok_or(TriggerError::ValueShape {
            found: "deferred value",
        })?;
        let t = self.backend.current_time() + deadline;
        let velocity = hap.context.velocity.unwrap_or(1.0);
        let voice = Controls::from_value(value)?.into_voice(&self.config, velocity)?;

        match &voice.source {
            SoundSource::Oscillator {
                waveform,
                frequency,
            } => {
                let source = self.backend.create_node(NodeKind::Oscillator {
                    waveform: *waveform,
                    frequency: *frequency,
                });
                let assembled = self.assemble(source, &voice, t);
                let end = t + duration;
                let stop = end + voice.envelope.release;
                voice
                    .envelope
                    .schedule(self.backend.as_ref(), assembled.envelope, voice.level, t, end);
                self.backend.start(source, t, 0.0);
                self.backend.stop(source, stop);
                Ok(Some(self.finish(source, assembled, None, t, stop)))
            }
            SoundSource::Sample {
                sound,
                index,
                note,
                playback,
            } => {
                self.play_sample(&voice, sound, *index, *note, playback, t, duration)
                    .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn play_sample(
        &self,
        voice: &VoiceSpec,
        sound: &str,
        index: i64,
        note: Option<f64>,
        playback: &Playback,
        t: f64,
        duration: f64,
    ) -> Result<Option<TriggeredVoice>, TriggerError> {
        if playback.speed == 0.0 {
            debug!(sound, "Speed is zero, nothing to play");
            return Ok(None);
        }

        // Soundfonts are played by note, so an index stands in for a missing note.
        let note = match note {
            None if index != 0 && self.resolver.soundfont_key(sound).is_some() => {
                Some(index as f64)
            }
            note => note,
        };
        let resolved = self.resolver.resolve(sound, index, note, playback.speed)?;
        let buffer = self.loader.load(Path::new(&resolved.path)).await?;

        let now = self.backend.current_time();
        if now > t {
            return Err(TriggerError::LateTrigger {
                sound: sound.to_string(),
                late_by: now - t,
            });
        }

        let buffer = if resolved.reverse {
            self.loader.reversed(&buffer)
        } else {
            buffer
        };

        let mut rate = playback.speed.abs() * 2f64.powf(resolved.transpose / 12.0);
        if playback.cycle_unit {
            rate *= buffer.duration();
        }
        let full = if resolved.soundfont || playback.clip {
            duration
        } else {
            buffer.duration() / rate
        };
        // Offsets and loop points are in buffer time, unaffected by the rate.
        let offset = playback.begin * full * rate;
        let mut playing = (playback.end - playback.begin) * full;
        let loop_region = playback.loop_count.map(|_| LoopRegion {
            start: offset,
            end: offset + playing * rate,
        });
        if let Some(count) = playback.loop_count {
            playing *= count;
        }

        let start = t + playback.nudge;
        let end = start + playing;
        let stop = end + voice.envelope.release;

        let source = self.backend.create_node(NodeKind::BufferSource {
            buffer,
            playback_rate: rate,
            loop_region,
        });
        let assembled = self.assemble(source, voice, start);
        voice.envelope.schedule(
            self.backend.as_ref(),
            assembled.envelope,
            voice.level,
            start,
            end,
        );

        let cut = playback.cut.map(|group| {
            let claimed = Voice::new(sound, source, assembled.envelope, start);
            let id = claimed.id();
            self.state.cut_groups.lock().claim(
                self.backend.as_ref(),
                group,
                claimed,
                start,
                self.crossfade,
            );
            (group, id)
        });

        self.backend.start(source, start, offset);
        self.backend.stop(source, stop);
        Ok(Some(self.finish(source, assembled, cut, start, stop)))
    }

    /// Builds and wires everything after `source`, including effect sends.
    fn assemble(&self, source: NodeId, voice: &VoiceSpec, at: f64) -> Assembled {
        let backend = self.backend.as_ref();
        let master = self.master();

        let envelope = backend.create_node(NodeKind::Gain { gain: 0.0 });
        let mut chain = vec![source, envelope];
        for stage in &voice.stages {
            chain.push(backend.create_node(stage.clone()));
        }
        let post = backend.create_node(NodeKind::Gain { gain: 1.0 });
        chain.push(post);

        for pair in chain.windows(2) {
            backend.connect(pair[0], pair[1]);
        }
        backend.connect(post, master);

        let mut sends = Vec::new();
        if let Some(delay) = voice.delay {
            let bus = self.state.buses.lock().delay(
                backend,
                master,
                voice.orbit,
                delay.time,
                delay.feedback,
                at,
            );
            sends.push(self.send(post, bus, delay.wet));
        }
        if let Some(reverb) = voice.reverb {
            let bus = self
                .state
                .buses
                .lock()
                .reverb(backend, master, voice.orbit, reverb.size, at);
            sends.push(self.send(post, bus, reverb.wet));
        }

        Assembled {
            envelope,
            chain,
            sends,
        }
    }

    fn send(&self, from: NodeId, bus: NodeId, wet: f64) -> NodeId {
        let send = self.backend.create_node(NodeKind::Gain { gain: wet });
        self.backend.connect(from, send);
        self.backend.connect(send, bus);
        send
    }

    /// Arranges for the chain to be torn down when the source ends.
    fn finish(
        &self,
        source: NodeId,
        assembled: Assembled,
        cut: Option<(i64, u64)>,
        start: f64,
        stop: f64,
    ) -> TriggeredVoice {
        let voice = TriggeredVoice {
            source,
            chain: assembled.chain,
            sends: assembled.sends,
            start,
            stop,
        };

        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let nodes: Vec<NodeId> = voice.chain.iter().chain(&voice.sends).copied().collect();
        self.backend.on_ended(
            source,
            Box::new(move || {
                for node in &nodes {
                    backend.disconnect(*node);
                }
                if let Some((group, id)) = cut {
                    state.cut_groups.lock().release(group, id);
                }
                debug!(source = %source, nodes = nodes.len(), "Voice finished");
            }),
        );
        voice
    }

    /// The master gain every chain and bus feeds, built on first use.
    fn master(&self) -> NodeId {
        let mut master = self.state.master.lock();
        *master.get_or_insert_with(|| {
            let node = self.backend.create_node(NodeKind::Gain { gain: 1.0 });
            self.backend.connect(node, self.backend.destination());
            info!(node = %node, "Created master output");
            node
        })
    }

    /// Fades out everything that is playing. The next trigger builds a new
    /// master output and new effect buses.
    pub fn panic(&self) {
        let master = self.state.master.lock().take();
        self.state.buses.lock().clear();
        let Some(master) = master else {
            return;
        };

        let now = self.backend.current_time();
        self.backend.schedule(
            master,
            Param::Gain,
            Automation::CancelScheduledValues { time: now },
        );
        self.backend.schedule(
            master,
            Param::Gain,
            Automation::SetValueAtTime {
                value: 1.0,
                time: now,
            },
        );
        self.backend.schedule(
            master,
            Param::Gain,
            Automation::LinearRampToValueAtTime {
                value: 0.0,
                time: now + self.panic_fade,
            },
        );
        warn!(master = %master, fade = self.panic_fade, "Panic");
    }
}
