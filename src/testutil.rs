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
use std::fs::File;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

/// Writes interleaved float samples to a 32-bit float WAV file.
pub fn write_wav(path: &Path, channels: u16, sample_rate: u32, interleaved: &[f32]) {
    let file = File::create(path).expect("create wav file");
    let mut writer = WavWriter::new(
        file,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )
    .expect("create wav writer");

    for sample in interleaved {
        writer.write_sample(*sample).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Writes `seconds` of a constant mono signal.
pub fn write_tone(path: &Path, sample_rate: u32, seconds: f64) {
    let frames = (sample_rate as f64 * seconds).round() as usize;
    write_wav(path, 1, sample_rate, &vec![0.5; frames]);
}
