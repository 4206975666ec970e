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

//! Sample playback support.
//!
//! This module provides:
//! - Sample decoding and caching (in memory, shared between voices)
//! - Sample and soundfont resolution by sound name, index and note
//! - Cut groups, which keep at most one voice sounding per group

mod loader;
mod resolver;
mod voice;

pub use loader::{LoadError, SampleLoader};
pub use resolver::{ResolveError, ResolvedSample, SampleResolver};
pub use voice::{Voice, VoiceManager};
