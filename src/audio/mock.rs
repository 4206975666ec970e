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

//! A backend that renders nothing and records everything.
//!
//! The clock only moves when told to. Sources end when the clock passes their
//! stop time (via [`RecordingBackend::run_until`]) or when ended explicitly.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{AudioBackend, Automation, EndedCallback, NodeId, NodeKind, Param};

/// Snapshot of one node as the backend saw it.
#[derive(Debug, Clone)]
pub struct RecordedNode {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Current outgoing connections, in the order they were made.
    pub outputs: Vec<NodeId>,
    /// Every automation event, in the order it was scheduled.
    pub automation: Vec<(Param, Automation)>,
    /// Start time and buffer offset.
    pub started: Option<(f64, f64)>,
    pub stopped: Option<f64>,
    pub disconnected: bool,
    pub ended: bool,
}

impl RecordedNode {
    /// Automation events for one parameter.
    pub fn automation_of(&self, param: Param) -> Vec<Automation> {
        self.automation
            .iter()
            .filter(|(p, _)| *p == param)
            .map(|(_, a)| *a)
            .collect()
    }

    /// The value the parameter has before any automation runs.
    fn initial_value(&self, param: Param) -> f64 {
        match (&self.kind, param) {
            (NodeKind::Gain { gain }, Param::Gain) => *gain,
            (NodeKind::Oscillator { frequency, .. }, Param::Frequency) => *frequency,
            (NodeKind::Filter { frequency, .. }, Param::Frequency) => *frequency,
            (NodeKind::Filter { q, .. }, Param::Q) => *q,
            (NodeKind::BufferSource { playback_rate, .. }, Param::PlaybackRate) => *playback_rate,
            (NodeKind::StereoPanner { pan }, Param::Pan) => *pan,
            (NodeKind::FeedbackDelay { time, .. }, Param::DelayTime) => *time,
            (NodeKind::FeedbackDelay { feedback, .. }, Param::Feedback) => *feedback,
            (NodeKind::Reverb { duration }, Param::ReverbDuration) => *duration,
            _ => 0.0,
        }
    }

    /// Evaluates a parameter's automation timeline at `time`.
    ///
    /// Set events hold their value, linear ramps interpolate from the previous
    /// event, and a cancel drops everything previously scheduled at or after it.
    /// A cancel-and-hold also pins the value the timeline had at its time.
    pub fn value_at(&self, param: Param, time: f64) -> f64 {
        let initial = self.initial_value(param);
        let mut events: Vec<Automation> = Vec::new();
        for automation in self.automation_of(param) {
            match automation {
                Automation::CancelScheduledValues { time: from } => {
                    events.retain(|event| event.time() < from);
                }
                Automation::CancelAndHoldAtTime { time: from } => {
                    let held = evaluate(&events, initial, from);
                    events.retain(|event| event.time() < from);
                    events.push(Automation::SetValueAtTime {
                        value: held,
                        time: from,
                    });
                }
                event => events.push(event),
            }
        }
        evaluate(&events, initial, time)
    }
}

fn evaluate(events: &[Automation], initial: f64, time: f64) -> f64 {
    let mut events = events.to_vec();
    events.sort_by(|a, b| a.time().total_cmp(&b.time()));

    let mut previous = (f64::NEG_INFINITY, initial);
    for event in events {
        match event {
            Automation::SetValueAtTime { value, time: at } => {
                if time < at {
                    return previous.1;
                }
                previous = (at, value);
            }
            Automation::LinearRampToValueAtTime { value, time: at } => {
                if time < at {
                    let (from_time, from_value) = previous;
                    if !from_time.is_finite() || at <= from_time {
                        return from_value;
                    }
                    let progress = (time - from_time) / (at - from_time);
                    return from_value + (value - from_value) * progress;
                }
                previous = (at, value);
            }
            Automation::CancelScheduledValues { .. } | Automation::CancelAndHoldAtTime { .. } => {}
        }
    }
    previous.1
}

struct Recording {
    now: f64,
    next_id: u64,
    nodes: BTreeMap<NodeId, RecordedNode>,
    ended_callbacks: HashMap<NodeId, Vec<EndedCallback>>,
}

/// An audio backend that keeps a log of the graph instead of producing sound.
pub struct RecordingBackend {
    sample_rate: u32,
    destination: NodeId,
    recording: Mutex<Recording>,
}

impl RecordingBackend {
    /// Creates a new recording backend with its clock at zero.
    pub fn new(sample_rate: u32) -> RecordingBackend {
        RecordingBackend {
            sample_rate,
            destination: NodeId(0),
            recording: Mutex::new(Recording {
                now: 0.0,
                next_id: 1,
                nodes: BTreeMap::new(),
                ended_callbacks: HashMap::new(),
            }),
        }
    }

    /// Moves the clock without ending anything.
    pub fn set_time(&self, time: f64) {
        self.recording.lock().now = time;
    }

    /// Moves the clock to `time`, ending every started source whose stop time
    /// has passed, earliest first.
    pub fn run_until(&self, time: f64) {
        let due: Vec<NodeId> = {
            let mut recording = self.recording.lock();
            recording.now = time;
            let mut due: Vec<(f64, NodeId)> = recording
                .nodes
                .values()
                .filter(|node| !node.ended && node.started.is_some())
                .filter_map(|node| node.stopped.map(|stop| (stop, node.id)))
                .filter(|(stop, _)| *stop <= time)
                .collect();
            due.sort_by(|a, b| a.0.total_cmp(&b.0));
            due.into_iter().map(|(_, id)| id).collect()
        };

        for id in due {
            self.end(id);
        }
    }

    /// Ends a source now, running its ended callbacks. Returns false if the
    /// node is unknown or has already ended.
    pub fn end(&self, node: NodeId) -> bool {
        let callbacks = {
            let mut recording = self.recording.lock();
            match recording.nodes.get_mut(&node) {
                Some(recorded) if !recorded.ended => recorded.ended = true,
                _ => return false,
            }
            recording.ended_callbacks.remove(&node).unwrap_or_default()
        };

        debug!(node = %node, callbacks = callbacks.len(), "Source ended");
        // Callbacks reenter the backend, so they run without the lock held.
        for callback in callbacks {
            callback();
        }
        true
    }

    pub fn node(&self, node: NodeId) -> Option<RecordedNode> {
        self.recording.lock().nodes.get(&node).cloned()
    }

    /// Every node created so far, in creation order.
    pub fn nodes(&self) -> Vec<RecordedNode> {
        self.recording.lock().nodes.values().cloned().collect()
    }

    /// Nodes that have not been disconnected.
    pub fn connected_nodes(&self) -> Vec<RecordedNode> {
        self.recording
            .lock()
            .nodes
            .values()
            .filter(|node| !node.disconnected)
            .cloned()
            .collect()
    }

    /// Nodes currently connected into `node`.
    pub fn inputs_of(&self, node: NodeId) -> Vec<NodeId> {
        self.recording
            .lock()
            .nodes
            .values()
            .filter(|candidate| candidate.outputs.contains(&node))
            .map(|candidate| candidate.id)
            .collect()
    }

    /// Follows first outputs from `start` until the destination or a dead end.
    /// The destination itself is not included.
    pub fn chain_from(&self, start: NodeId) -> Vec<NodeId> {
        let recording = self.recording.lock();
        let mut chain = vec![start];
        let mut current = start;
        while let Some(next) = recording
            .nodes
            .get(&current)
            .and_then(|node| node.outputs.first().copied())
        {
            if next == self.destination || chain.contains(&next) {
                break;
            }
            chain.push(next);
            current = next;
        }
        chain
    }

    fn with_node(&self, node: NodeId, action: &str, f: impl FnOnce(&mut RecordedNode)) {
        let mut recording = self.recording.lock();
        match recording.nodes.get_mut(&node) {
            Some(recorded) => f(recorded),
            None => warn!(node = %node, action, "Unknown node"),
        }
    }
}

impl AudioBackend for RecordingBackend {
    fn current_time(&self) -> f64 {
        self.recording.lock().now
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn destination(&self) -> NodeId {
        self.destination
    }

    fn create_node(&self, kind: NodeKind) -> NodeId {
        let mut recording = self.recording.lock();
        let id = NodeId(recording.next_id);
        recording.next_id += 1;
        recording.nodes.insert(
            id,
            RecordedNode {
                id,
                kind,
                outputs: Vec::new(),
                automation: Vec::new(),
                started: None,
                stopped: None,
                disconnected: false,
                ended: false,
            },
        );
        id
    }

    fn connect(&self, from: NodeId, to: NodeId) {
        self.with_node(from, "connect", |node| node.outputs.push(to));
    }

    fn disconnect(&self, node: NodeId) {
        self.with_node(node, "disconnect", |node| {
            node.outputs.clear();
            node.disconnected = true;
        });
    }

    fn schedule(&self, node: NodeId, param: Param, automation: Automation) {
        self.with_node(node, "schedule", |node| {
            node.automation.push((param, automation))
        });
    }

    fn start(&self, node: NodeId, when: f64, offset: f64) {
        self.with_node(node, "start", |node| node.started = Some((when, offset)));
    }

    fn stop(&self, node: NodeId, when: f64) {
        self.with_node(node, "stop", |node| {
            if node.ended {
                return;
            }
            // The earliest requested stop wins, as with a real source.
            node.stopped = Some(node.stopped.map_or(when, |stop| stop.min(when)));
        });
    }

    fn on_ended(&self, node: NodeId, callback: EndedCallback) {
        let mut recording = self.recording.lock();
        if recording.nodes.contains_key(&node) {
            recording
                .ended_callbacks
                .entry(node)
                .or_default()
                .push(callback);
        } else {
            warn!(node = %node, "Ended callback for unknown node");
        }
    }
}

impl fmt::Debug for RecordingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let recording = self.recording.lock();
        f.debug_struct("RecordingBackend")
            .field("now", &recording.now)
            .field("nodes", &recording.nodes.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
