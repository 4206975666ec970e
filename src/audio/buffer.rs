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

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global buffer ID counter.
static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Decoded audio held in memory, stored planar (one Vec per channel).
///
/// Every buffer gets a unique ID on creation so caches can key on buffer
/// identity rather than on contents.
pub struct AudioBuffer {
    id: u64,
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Creates a buffer from planar channel data.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> AudioBuffer {
        AudioBuffer {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::SeqCst),
            channels,
            sample_rate,
        }
    }

    /// Creates a buffer from interleaved samples.
    pub fn from_interleaved(samples: &[f32], channel_count: u16, sample_rate: u32) -> AudioBuffer {
        let num_channels = channel_count as usize;
        let num_frames = if num_channels > 0 {
            samples.len() / num_channels
        } else {
            0
        };

        let mut planar = vec![Vec::with_capacity(num_frames); num_channels];
        for frame in samples.chunks_exact(num_channels.max(1)).take(num_frames) {
            for (channel, sample) in planar.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }

        AudioBuffer::new(planar, sample_rate)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Duration in seconds at the buffer's own sample rate.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    /// Returns a time-reversed copy with a fresh identity.
    pub fn reversed(&self) -> AudioBuffer {
        let channels = self
            .channels
            .iter()
            .map(|channel| channel.iter().rev().copied().collect())
            .collect();
        AudioBuffer::new(channels, self.sample_rate)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.channels.iter().map(|c| c.len()).sum::<usize>() * std::mem::size_of::<f32>()
    }
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("id", &self.id)
            .field("channels", &self.channels.len())
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_interleaved() {
        let buffer = AudioBuffer::from_interleaved(&[1.0, -1.0, 0.5, -0.5, 0.25, -0.25], 2, 4);
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 3);
        assert_eq!(buffer.channel(0), Some(&[1.0, 0.5, 0.25][..]));
        assert_eq!(buffer.channel(1), Some(&[-1.0, -0.5, -0.25][..]));
        assert_eq!(buffer.duration(), 0.75);
    }

    #[test]
    fn test_reversed_has_new_identity() {
        let buffer = AudioBuffer::new(vec![vec![1.0, 2.0, 3.0]], 48000);
        let reversed = buffer.reversed();
        assert_ne!(buffer.id(), reversed.id());
        assert_eq!(reversed.channel(0), Some(&[3.0, 2.0, 1.0][..]));
        assert_eq!(reversed.sample_rate(), 48000);
    }

    #[test]
    fn test_memory_size() {
        let buffer = AudioBuffer::new(vec![vec![0.0; 10], vec![0.0; 10]], 44100);
        assert_eq!(buffer.memory_size(), 80);
    }
}
