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

//! Per-orbit effect buses.
//!
//! Every orbit has at most one delay and one reverb. Voices send into them, so
//! voices on the same orbit share one tail. A bus is built the first time an
//! orbit asks for it and its parameters are retuned in place afterwards.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::audio::{AudioBackend, Automation, NodeId, NodeKind, Param};

#[derive(Debug, Clone, Copy, PartialEq)]
struct DelayBus {
    node: NodeId,
    time: f64,
    feedback: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ReverbBus {
    node: NodeId,
    size: f64,
}

#[derive(Debug, Default)]
pub struct EffectBusRegistry {
    delays: HashMap<i64, DelayBus>,
    reverbs: HashMap<i64, ReverbBus>,
}

impl EffectBusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the delay bus for `orbit`, building it into `output` if needed.
    /// An existing bus is retuned at `at` when its time or feedback differ.
    pub fn delay(
        &mut self,
        backend: &dyn AudioBackend,
        output: NodeId,
        orbit: i64,
        time: f64,
        feedback: f64,
        at: f64,
    ) -> NodeId {
        match self.delays.get_mut(&orbit) {
            Some(bus) => {
                if bus.time != time {
                    backend.schedule(
                        bus.node,
                        Param::DelayTime,
                        Automation::SetValueAtTime { value: time, time: at },
                    );
                    bus.time = time;
                }
                if bus.feedback != feedback {
                    backend.schedule(
                        bus.node,
                        Param::Feedback,
                        Automation::SetValueAtTime {
                            value: feedback,
                            time: at,
                        },
                    );
                    bus.feedback = feedback;
                }
                bus.node
            }
            None => {
                let node = backend.create_node(NodeKind::FeedbackDelay { time, feedback });
                backend.connect(node, output);
                info!(orbit, node = %node, time, feedback, "Created delay bus");
                self.delays.insert(
                    orbit,
                    DelayBus {
                        node,
                        time,
                        feedback,
                    },
                );
                node
            }
        }
    }

    /// Returns the reverb bus for `orbit`, building it into `output` if needed.
    /// An existing bus is resized at `at` when the size differs.
    pub fn reverb(
        &mut self,
        backend: &dyn AudioBackend,
        output: NodeId,
        orbit: i64,
        size: f64,
        at: f64,
    ) -> NodeId {
        match self.reverbs.get_mut(&orbit) {
            Some(bus) => {
                if bus.size != size {
                    debug!(orbit, from = bus.size, to = size, "Resizing reverb");
                    backend.schedule(
                        bus.node,
                        Param::ReverbDuration,
                        Automation::SetValueAtTime { value: size, time: at },
                    );
                    bus.size = size;
                }
                bus.node
            }
            None => {
                let node = backend.create_node(NodeKind::Reverb { duration: size });
                backend.connect(node, output);
                info!(orbit, node = %node, size, "Created reverb bus");
                self.reverbs.insert(orbit, ReverbBus { node, size });
                node
            }
        }
    }

    pub fn delay_node(&self, orbit: i64) -> Option<NodeId> {
        self.delays.get(&orbit).map(|bus| bus.node)
    }

    pub fn reverb_node(&self, orbit: i64) -> Option<NodeId> {
        self.reverbs.get(&orbit).map(|bus| bus.node)
    }

    /// Forgets every bus, so the next send builds new ones.
    pub fn clear(&mut self) {
        self.delays.clear();
        self.reverbs.clear();
    }
}
