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
//! Sample loading and caching for pad samples.
//!
//! Samples are decoded entirely into memory and converted to the output format up front,
//! so triggering a pad never touches the disk or the resampler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::audio::sample_source::{
    self, remap_channels, resample_planar, DecodeError, MemorySampleSource, SampleSource,
};
use crate::audio::TargetFormat;

/// Frames read from the decoder per chunk.
const DECODE_CHUNK_FRAMES: usize = 4096;

/// A loaded sample that can be played back.
/// The sample data is stored in an Arc for efficient sharing between voices.
#[derive(Clone, Debug)]
pub struct LoadedSample {
    /// The sample data as interleaved f32 samples in the output format.
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSample {
    /// Creates a new MemorySampleSource for playback with the given volume.
    pub fn create_source(&self, volume: f32) -> MemorySampleSource {
        MemorySampleSource::from_shared(self.data.clone(), self.channel_count, volume)
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames in the sample.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count.max(1) as usize
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate.max(1) as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }

    #[cfg(test)]
    pub fn from_interleaved(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        Self {
            data: Arc::new(data),
            channel_count,
            sample_rate,
        }
    }
}

/// Decodes files into the output format and caches the results by path.
pub struct SampleLoader {
    /// Cache of loaded samples by file path.
    cache: Mutex<HashMap<PathBuf, LoadedSample>>,
    /// The format every sample is converted to.
    target_format: TargetFormat,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(target_format: TargetFormat) -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
            target_format,
        }
    }

    /// Loads a sample from a file into memory.
    /// Returns a cached version if already loaded.
    pub fn load(&self, path: &Path) -> Result<LoadedSample, DecodeError> {
        if let Some(sample) = self.cache.lock().get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        let loaded = self.decode(path)?;
        self.cache.lock().insert(path.to_path_buf(), loaded.clone());
        Ok(loaded)
    }

    fn decode(&self, path: &Path) -> Result<LoadedSample, DecodeError> {
        let mut source = sample_source::open(path)?;
        let source_rate = source.sample_rate();
        let source_channels = source.channel_count();

        let planar = source.read_planar(DECODE_CHUNK_FRAMES)?;
        if planar.first().map_or(true, |channel| channel.is_empty()) {
            return Err(DecodeError::Empty(path.display().to_string()));
        }

        let target_rate = self.target_format.sample_rate;
        let target_channels = self.target_format.channels;
        let planar = resample_planar(&planar, source_rate, target_rate)?;
        let planar = remap_channels(planar, target_channels);

        let loaded = LoadedSample {
            data: Arc::new(interleave(&planar)),
            channel_count: target_channels,
            sample_rate: target_rate,
        };

        info!(
            path = ?path,
            source_rate,
            source_channels,
            sample_rate = target_rate,
            channels = target_channels,
            duration_ms = loaded.duration().as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sample loaded"
        );
        Ok(loaded)
    }

    /// Drops the cached files `keep` rejects. Returns the number dropped.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&Path) -> bool,
    {
        let mut cache = self.cache.lock();
        let before = cache.len();
        cache.retain(|path, _| keep(path));
        before - cache.len()
    }

    /// Drops every cached sample. Voices and pads holding a sample keep their copy.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Returns the number of cached files.
    pub fn cached_files(&self) -> usize {
        self.cache.lock().len()
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.lock().values().map(|s| s.memory_size()).sum()
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_samples", &self.cached_files())
            .field("target_format", &self.target_format)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Interleaves planar channels of equal length.
fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let channels = planar.len();
    let frames = planar.first().map(|c| c.len()).unwrap_or(0);
    let mut interleaved = Vec::with_capacity(frames * channels);
    for frame in 0..frames {
        for channel in planar {
            interleaved.push(channel[frame]);
        }
    }
    interleaved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleFormat;
    use crate::testutil::write_wav_i16;

    #[test]
    fn test_interleave() {
        let planar = vec![vec![1.0, 2.0], vec![-1.0, -2.0]];
        assert_eq!(interleave(&planar), vec![1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_load_converts_to_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kick.wav");
        write_wav_i16(&path, &[vec![i16::MAX / 2; 2205]], 22050).unwrap();

        let format = TargetFormat::new(44100, 2, SampleFormat::Float, 32).unwrap();
        let loader = SampleLoader::new(format);
        let sample = loader.load(&path).unwrap();

        assert_eq!(sample.channel_count(), 2);
        assert_eq!(sample.sample_rate(), 44100);
        assert_eq!(sample.frames(), 4410);
        assert_eq!(sample.memory_size(), 4410 * 2 * 4);
        assert_eq!(loader.cached_files(), 1);
    }

    #[test]
    fn test_load_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snare.wav");
        write_wav_i16(&path, &[vec![1000; 100], vec![-1000; 100]], 44100).unwrap();

        let loader = SampleLoader::new(TargetFormat::default());
        let first = loader.load(&path).unwrap();

        // Once cached, the file isn't read again.
        std::fs::remove_file(&path).unwrap();
        let second = loader.load(&path).unwrap();
        assert!(Arc::ptr_eq(&first.data, &second.data));

        loader.clear_cache();
        assert_eq!(loader.cached_files(), 0);
        assert!(loader.load(&path).is_err());
    }

    #[test]
    fn test_retain() {
        let dir = tempfile::tempdir().unwrap();
        let kick = dir.path().join("kick.wav");
        let snare = dir.path().join("snare.wav");
        write_wav_i16(&kick, &[vec![1000; 10]], 44100).unwrap();
        write_wav_i16(&snare, &[vec![1000; 10]], 44100).unwrap();

        let loader = SampleLoader::new(TargetFormat::default());
        let kept = loader.load(&kick).unwrap();
        loader.load(&snare).unwrap();
        assert_eq!(loader.cached_files(), 2);

        assert_eq!(loader.retain(|path| path == kick), 1);
        assert_eq!(loader.cached_files(), 1);
        assert_eq!(loader.total_memory_usage(), kept.memory_size());
        assert_eq!(loader.retain(|path| path == kick), 0);
    }

    #[test]
    fn test_load_same_format_is_exact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hat.wav");
        write_wav_i16(&path, &[vec![16384, -16384, 0]], 44100).unwrap();

        let format = TargetFormat::new(44100, 1, SampleFormat::Float, 32).unwrap();
        let sample = SampleLoader::new(format).load(&path).unwrap();
        assert_eq!(sample.frames(), 3);
        assert!((sample.data[0] - 0.5).abs() < 1e-3);
        assert!((sample.data[1] + 0.5).abs() < 1e-3);
        assert_eq!(sample.data[2], 0.0);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let loader = SampleLoader::new(TargetFormat::default());
        assert!(loader.load(&path).is_err());
        assert_eq!(loader.cached_files(), 0);
    }
}
