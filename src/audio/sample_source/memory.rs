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
use std::sync::Arc;

/// A voice's view of a decoded pad buffer. The interleaved data is shared between all
/// voices playing the same buffer; each voice only carries its own position and gain.
pub struct MemorySampleSource {
    data: Arc<Vec<f32>>,
    channel_count: u16,
    /// Read position in interleaved samples.
    position: usize,
    volume: f32,
}

impl MemorySampleSource {
    /// Creates a source over interleaved samples owned by someone else.
    pub fn from_shared(data: Arc<Vec<f32>>, channel_count: u16, volume: f32) -> Self {
        Self {
            data,
            channel_count,
            position: 0,
            volume,
        }
    }

    /// Adds up to `frames` frames of this source into the interleaved `output`, scaled by the
    /// source's volume. `output` must use the same channel count as the source.
    /// Returns the number of frames mixed; anything less than `frames` means the source is done.
    pub fn mix_into(&mut self, output: &mut [f32], frames: usize) -> usize {
        let channels = self.channel_count as usize;
        if channels == 0 {
            return 0;
        }
        let remaining = (self.data.len() - self.position) / channels;
        let frames = frames.min(remaining).min(output.len() / channels);
        let len = frames * channels;

        let src = &self.data[self.position..self.position + len];
        for (dst, sample) in output[..len].iter_mut().zip(src.iter()) {
            *dst += sample * self.volume;
        }
        self.position += len;
        frames
    }

    /// Returns true once every frame has been mixed.
    pub fn is_finished(&self) -> bool {
        self.position >= self.data.len()
    }
}
