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

//! The audio graph seam.
//!
//! The trigger engine never renders audio itself. It asks a backend to create
//! nodes, wire them together and schedule parameter changes, starts and stops
//! against the backend's clock. The backend owns the clock and tells the engine
//! when a source has finished playing.

pub mod buffer;
pub mod mock;
pub mod node;

pub use buffer::AudioBuffer;
pub use node::{
    Automation, FilterType, LoopRegion, NodeId, NodeKind, Param, UnknownVariant, Vowel, Waveform,
};

/// Called once when a source node finishes playing.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

pub trait AudioBackend: Send + Sync {
    /// Current time of the audio clock, in seconds.
    fn current_time(&self) -> f64;

    /// Output sample rate.
    fn sample_rate(&self) -> u32;

    /// The hardware output every chain eventually feeds.
    fn destination(&self) -> NodeId;

    /// Creates an unconnected node.
    fn create_node(&self, kind: NodeKind) -> NodeId;

    /// Connects the output of `from` to the input of `to`.
    fn connect(&self, from: NodeId, to: NodeId);

    /// Removes every outgoing connection of `node`, releasing it once nothing
    /// else refers to it.
    fn disconnect(&self, node: NodeId);

    /// Schedules a parameter change.
    fn schedule(&self, node: NodeId, param: Param, automation: Automation);

    /// Starts a source at `when`, `offset` seconds into its buffer.
    fn start(&self, node: NodeId, when: f64, offset: f64);

    /// Stops a source at `when`. Stopping an already stopped or ended source is a no-op.
    fn stop(&self, node: NodeId, when: f64);

    /// Registers a callback for the natural end of a source.
    fn on_ended(&self, node: NodeId, callback: EndedCallback);
}
