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
//! Pad sample playback.
//!
//! This module provides:
//! - An index of the sample library grouped by drum category
//! - Sample loading and caching (in-memory for zero-latency playback)
//! - Generation-tagged per-pad buffers
//! - Voice management with hard-cut retrigger
//! - Integration with the audio mixer

mod cache;
mod engine;
mod index;
mod loader;
mod voice;

pub use cache::{BufferCache, Generation, Install};
pub use engine::SampleEngine;
pub use index::{canonical_category, DrumCategory, SampleFile, SampleIndex, SampleIndexer};
pub use loader::{LoadedSample, SampleLoader};
pub use voice::{Voice, VoiceManager};
