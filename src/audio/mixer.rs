// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
// Core audio mixing logic that can be used by both CPAL and test implementations
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::audio::sample_source::MemorySampleSource;
use crate::cancel::CancelHandle;
use crate::layout::PadId;

/// Core audio mixing logic that's independent of any audio backend
#[derive(Clone)]
pub struct AudioMixer {
    /// Active audio sources currently playing
    active_sources: Arc<Mutex<Vec<ActiveSource>>>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
}

/// Represents an active audio source in the mixer
pub struct ActiveSource {
    /// Unique ID for this source
    pub id: u64,
    /// The pad that triggered this source.
    pub pad: PadId,
    /// The source, already in the mixer's channel count and sample rate.
    pub source: MemorySampleSource,
    /// Whether this source has finished playing
    pub is_finished: Arc<AtomicBool>,
    /// Cancel handle for this source
    pub cancel_handle: CancelHandle,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            active_sources: Arc::new(Mutex::new(Vec::new())),
            num_channels,
            sample_rate,
        }
    }

    /// Adds a new audio source to the mixer
    pub fn add_source(&self, source: ActiveSource) {
        trace!(source = source.id, pad = %source.pad, "Mixing source");
        self.active_sources.lock().push(source);
    }

    /// Mixes `num_frames` frames of every active source into the interleaved `output`.
    /// The output is cleared first. Sources that run out or were cancelled are dropped.
    pub fn process_into_output(&self, output: &mut [f32], num_frames: usize) {
        let channels = self.num_channels as usize;
        let len = (num_frames * channels).min(output.len());
        output[..len].fill(0.0);
        let num_frames = len / channels.max(1);

        let mut sources = self.active_sources.lock();
        sources.retain_mut(|active_source| {
            if active_source.is_finished.load(Ordering::Relaxed)
                || active_source.cancel_handle.is_cancelled()
            {
                active_source.is_finished.store(true, Ordering::Relaxed);
                return false;
            }

            let mixed = active_source.source.mix_into(&mut output[..len], num_frames);
            if mixed < num_frames || active_source.source.is_finished() {
                active_source.is_finished.store(true, Ordering::Relaxed);
                return false;
            }
            true
        });
    }

    /// Mixes `num_frames` frames into a new buffer.
    pub fn process_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0; num_frames * self.num_channels as usize];
        self.process_into_output(&mut frames, num_frames);
        frames
    }

    /// Number of sources still playing.
    pub fn active_count(&self) -> usize {
        self.active_sources.lock().len()
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_source(id: u64, samples: Vec<f32>, volume: f32) -> ActiveSource {
        ActiveSource {
            id,
            pad: PadId::new(0).unwrap(),
            source: MemorySampleSource::from_shared(Arc::new(samples), 2, volume),
            is_finished: Arc::new(AtomicBool::new(false)),
            cancel_handle: CancelHandle::new(),
        }
    }

    #[test]
    fn test_basic_mixing() {
        let mixer = AudioMixer::new(2, 44100);
        mixer.add_source(create_test_source(1, vec![0.5, 0.8, 0.1, 0.2], 1.0));

        let frames = mixer.process_frames(2);
        assert_eq!(frames, vec![0.5, 0.8, 0.1, 0.2]);

        // The source ran out exactly at the end of the buffer.
        assert_eq!(mixer.active_count(), 0);
        assert_eq!(mixer.process_frames(1), vec![0.0, 0.0]);
    }

    #[test]
    fn test_multiple_source_mixing() {
        let mixer = AudioMixer::new(2, 44100);
        mixer.add_source(create_test_source(1, vec![0.5, 0.3, 0.5, 0.3], 1.0));
        mixer.add_source(create_test_source(2, vec![0.4, 0.2, 0.4, 0.2], 0.5));

        let frame = mixer.process_frames(1);
        assert_eq!(frame.len(), 2);
        assert!((frame[0] - 0.7).abs() < 1e-6);
        assert!((frame[1] - 0.4).abs() < 1e-6);
        assert_eq!(mixer.active_count(), 2);
    }

    #[test]
    fn test_cancelled_source_is_dropped() {
        let mixer = AudioMixer::new(2, 44100);
        let source = create_test_source(1, vec![1.0; 64], 1.0);
        let cancel_handle = source.cancel_handle.clone();
        let is_finished = source.is_finished.clone();
        mixer.add_source(source);

        assert_eq!(mixer.process_frames(1), vec![1.0, 1.0]);
        cancel_handle.cancel();
        assert_eq!(mixer.process_frames(1), vec![0.0, 0.0]);
        assert_eq!(mixer.active_count(), 0);
        assert!(is_finished.load(Ordering::Relaxed));
    }

    #[test]
    fn test_output_is_cleared() {
        let mixer = AudioMixer::new(2, 44100);
        let mut output = vec![1.0; 4];
        mixer.process_into_output(&mut output, 2);
        assert_eq!(output, vec![0.0; 4]);
    }
}
