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
use std::error::Error;

use serde::Deserialize;

use crate::audio::{SampleFormat, TargetFormat};

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_BITS_PER_SAMPLE: u16 = 32;
const MAX_DEFAULT_LOAD_THREADS: usize = 4;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The audio device. "default" picks the host's default output, names starting with
    /// "mock" pick a mock device.
    device: Option<String>,

    /// Output sample rate in Hz (default: 44100)
    sample_rate: Option<u32>,

    /// Output channel count (default: 2)
    channels: Option<u16>,

    /// Output sample format, "float" or "int" (default: "float")
    sample_format: Option<SampleFormat>,

    /// Output bits per sample (default: 32)
    bits_per_sample: Option<u16>,

    /// Number of worker threads decoding samples.
    /// Defaults to the number of CPUs, capped at a small value; must be >= 1.
    load_threads: Option<usize>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            ..Default::default()
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the output sample rate (default: 44100)
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the output channel count (default: 2)
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS)
    }

    /// Returns the output sample format (default: Float)
    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format.unwrap_or(SampleFormat::Float)
    }

    /// Returns the output bits per sample (default: 32)
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample.unwrap_or(DEFAULT_BITS_PER_SAMPLE)
    }

    /// Returns the number of sample decoding threads.
    pub fn load_threads(&self) -> usize {
        self.load_threads
            .unwrap_or_else(|| num_cpus::get().min(MAX_DEFAULT_LOAD_THREADS))
            .max(1)
    }

    /// The format the device should mix in.
    pub fn target_format(&self) -> Result<TargetFormat, Box<dyn Error>> {
        TargetFormat::new(
            self.sample_rate(),
            self.channels(),
            self.sample_format(),
            self.bits_per_sample(),
        )
    }
}
