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

//! Sample decoding and caching.
//!
//! Samples are decoded on the blocking pool the first time they are asked for
//! and kept in memory afterwards. Concurrent requests for the same file share a
//! single decode.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::audio::AudioBuffer;

/// Error types for sample loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Unable to open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Unable to decode {path}: {source}")]
    Decode {
        path: String,
        source: SymphoniaError,
    },

    #[error("No audio track found in {path}")]
    NoTrack { path: String },

    #[error("{path} contains no audio")]
    Empty { path: String },

    #[error("Sample loading task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

type CacheSlot = Arc<OnceCell<Arc<AudioBuffer>>>;

/// Manages loading and caching of sample data.
pub struct SampleLoader {
    /// Decoded samples by file path.
    cache: Mutex<HashMap<PathBuf, CacheSlot>>,
    /// Reversed copies by the ID of the buffer they were made from.
    reversed: Mutex<HashMap<u64, Arc<AudioBuffer>>>,
    /// Target sample rate for transcoding (matches audio output).
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            reversed: Mutex::new(HashMap::new()),
            target_sample_rate,
        }
    }

    /// Loads a sample, decoding it on first use.
    pub async fn load(&self, path: &Path) -> Result<Arc<AudioBuffer>, LoadError> {
        let slot = self
            .cache
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone();

        if let Some(buffer) = slot.get() {
            debug!(path = ?path, "Using cached sample");
            return Ok(buffer.clone());
        }

        let buffer = slot
            .get_or_try_init(|| async {
                info!(path = ?path, "Loading sample into memory");
                let owned = path.to_path_buf();
                let target_sample_rate = self.target_sample_rate;
                let buffer =
                    tokio::task::spawn_blocking(move || decode_file(&owned, target_sample_rate))
                        .await??;
                info!(
                    path = ?path,
                    channels = buffer.channel_count(),
                    sample_rate = buffer.sample_rate(),
                    duration_ms = (buffer.duration() * 1000.0) as u64,
                    memory_kb = buffer.memory_size() / 1024,
                    "Sample loaded"
                );
                Ok::<_, LoadError>(Arc::new(buffer))
            })
            .await?;

        Ok(buffer.clone())
    }

    /// Puts an already decoded buffer in the cache under `path`.
    pub fn insert(&self, path: &Path, buffer: AudioBuffer) -> Arc<AudioBuffer> {
        let buffer = Arc::new(buffer);
        let slot = Arc::new(OnceCell::from(buffer.clone()));
        self.cache.lock().insert(path.to_path_buf(), slot);
        buffer
    }

    /// Returns a reversed copy of `buffer`, building it once per buffer.
    pub fn reversed(&self, buffer: &Arc<AudioBuffer>) -> Arc<AudioBuffer> {
        self.reversed
            .lock()
            .entry(buffer.id())
            .or_insert_with(|| Arc::new(buffer.reversed()))
            .clone()
    }

    /// Number of decoded samples in the cache.
    pub fn cached_count(&self) -> usize {
        self.cache
            .lock()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    /// Returns the total memory used by cached samples, reversed copies included.
    pub fn total_memory_usage(&self) -> usize {
        let decoded: usize = self
            .cache
            .lock()
            .values()
            .filter_map(|slot| slot.get())
            .map(|buffer| buffer.memory_size())
            .sum();
        let reversed: usize = self
            .reversed
            .lock()
            .values()
            .map(|buffer| buffer.memory_size())
            .sum();
        decoded + reversed
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_samples", &self.cached_count())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Decodes a whole file into memory at the target sample rate.
fn decode_file(path: &Path, target_sample_rate: u32) -> Result<AudioBuffer, LoadError> {
    let name = path.display().to_string();
    let decode_error = |source: SymphoniaError| LoadError::Decode {
        path: name.clone(),
        source,
    };

    let file = File::open(path).map_err(|source| LoadError::Io {
        path: name.clone(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_error)?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::NoTrack {
            path: name.clone(),
        })?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let mut decoder = get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(decode_error)?;

    let mut sample_rate = params.sample_rate;
    let mut channels = params.channels.map(|c| c.count());
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            // Some decoders return DecodeError at EOF instead of IoError
            Err(SymphoniaError::DecodeError(_)) => break,
            Err(e) => return Err(decode_error(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = %name, error = %e, "Skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(decode_error(e)),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count());

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    let (Some(source_rate), Some(channel_count)) = (sample_rate, channels) else {
        return Err(LoadError::Empty { path: name });
    };
    if samples.is_empty() || channel_count == 0 {
        return Err(LoadError::Empty { path: name });
    }

    let channel_count = channel_count as u16;
    if source_rate != target_sample_rate {
        info!(
            source_rate,
            target_rate = target_sample_rate,
            "Transcoding sample"
        );
        let transcoded =
            transcode_samples(&samples, channel_count, source_rate, target_sample_rate);
        return Ok(AudioBuffer::from_interleaved(
            &transcoded,
            channel_count,
            target_sample_rate,
        ));
    }

    Ok(AudioBuffer::from_interleaved(
        &samples,
        channel_count,
        source_rate,
    ))
}

/// Transcodes interleaved samples from one sample rate to another using linear
/// interpolation, which is enough for drum hits and one-shots.
fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channel_count as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let s0 = samples
                .get(source_frame * channels + channel)
                .copied()
                .unwrap_or(0.0);
            let s1 = samples
                .get((source_frame + 1) * channels + channel)
                .copied()
                .unwrap_or(s0);
            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}
