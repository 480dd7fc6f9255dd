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
//! Voice tracking for pad playback.
//!
//! Each pad plays at most one voice. Retriggering a pad cuts the voice that is playing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::cancel::CancelHandle;
use crate::layout::PadId;

/// Represents a voice handed to the mixer.
pub struct Voice {
    /// The mixer source ID of the voice.
    source_id: u64,
    /// Cancel handle for stopping this voice without lock contention.
    cancel_handle: CancelHandle,
    /// Set by the mixer once the voice has played out.
    is_finished: Arc<AtomicBool>,
}

impl Voice {
    /// Creates a new voice.
    pub fn new(source_id: u64, cancel_handle: CancelHandle, is_finished: Arc<AtomicBool>) -> Self {
        Self {
            source_id,
            cancel_handle,
            is_finished,
        }
    }

    pub fn source_id(&self) -> u64 {
        self.source_id
    }

    /// Returns true once the mixer is done with the voice.
    pub fn is_finished(&self) -> bool {
        self.is_finished.load(Ordering::Relaxed) || self.cancel_handle.is_cancelled()
    }

    /// Stops the voice.
    pub fn stop(&self) {
        self.cancel_handle.cancel();
    }
}

/// Manages the voice of each pad.
#[derive(Default)]
pub struct VoiceManager {
    voices: HashMap<PadId, Voice>,
}

impl VoiceManager {
    /// Creates a new voice manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the pad's new voice, cutting the one it replaces.
    /// Returns true if a voice was cut.
    pub fn add_voice(&mut self, pad: PadId, voice: Voice) -> bool {
        match self.voices.insert(pad, voice) {
            Some(previous) if !previous.is_finished() => {
                previous.stop();
                debug!(pad = %pad, source_id = previous.source_id(), "Cut voice on retrigger");
                true
            }
            Some(previous) => {
                previous.stop();
                false
            }
            None => false,
        }
    }

    /// Stops the pad's voice. Returns true if a voice was playing.
    pub fn stop(&mut self, pad: PadId) -> bool {
        match self.voices.remove(&pad) {
            Some(voice) => {
                let playing = !voice.is_finished();
                voice.stop();
                playing
            }
            None => false,
        }
    }

    /// Stops every voice.
    pub fn clear(&mut self) {
        for (_, voice) in self.voices.drain() {
            voice.stop();
        }
    }

    /// Number of voices still playing. Finished voices are forgotten.
    pub fn active_count(&mut self) -> usize {
        self.voices.retain(|_, voice| !voice.is_finished());
        self.voices.len()
    }
}
