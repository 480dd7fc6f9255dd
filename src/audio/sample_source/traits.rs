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
use std::path::Path;

use super::audio::AudioSampleSource;
use super::error::DecodeError;

/// A decoder that hands out planar f32 audio a chunk at a time.
pub trait SampleSource: Send {
    /// Clears each channel of `output` and fills it with up to `max_frames` frames.
    /// `output` must hold one Vec per channel. Returns the frames written, 0 at the end.
    fn next_chunk(&mut self, output: &mut [Vec<f32>], max_frames: usize)
        -> Result<usize, DecodeError>;

    fn channel_count(&self) -> u16;

    fn sample_rate(&self) -> u32;

    /// Total frames in the source, if the container says.
    fn frames_hint(&self) -> Option<u64> {
        None
    }

    /// Decodes everything that's left, one Vec per channel.
    fn read_planar(&mut self, chunk_frames: usize) -> Result<Vec<Vec<f32>>, DecodeError> {
        let capacity = self
            .frames_hint()
            .and_then(|frames| usize::try_from(frames).ok())
            .unwrap_or(0);
        let channels = self.channel_count() as usize;
        let mut planar: Vec<Vec<f32>> = vec![Vec::with_capacity(capacity); channels];
        let mut chunk: Vec<Vec<f32>> = vec![Vec::with_capacity(chunk_frames); channels];

        loop {
            let frames = self.next_chunk(&mut chunk, chunk_frames)?;
            if frames == 0 {
                return Ok(planar);
            }
            for (dst, src) in planar.iter_mut().zip(&chunk) {
                dst.extend_from_slice(&src[..frames]);
            }
        }
    }
}

/// Opens a sample file with whichever decoder handles it.
pub fn open(path: &Path) -> Result<Box<dyn SampleSource>, DecodeError> {
    Ok(Box::new(AudioSampleSource::from_file(path)?))
}
