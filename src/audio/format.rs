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

use std::{error::Error, fmt, str::FromStr};

use serde::Deserialize;

/// How samples are handed to the output stream. The mixer itself always runs in f32.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    #[serde(alias = "Int")]
    Int,
    #[serde(alias = "Float")]
    Float,
}

impl SampleFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SampleFormat::Float => "float",
            SampleFormat::Int => "int",
        }
    }

    /// Bit depths the output stream can be opened with.
    fn supports_bits(self, bits: u16) -> bool {
        match self {
            SampleFormat::Float => bits == 32,
            SampleFormat::Int => bits == 16 || bits == 32,
        }
    }
}

impl FromStr for SampleFormat {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [SampleFormat::Float, SampleFormat::Int]
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unsupported sample format: {}", s).into())
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The format that the output device mixes in. All pad buffers are converted to
/// this sample rate and channel count when they are loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetFormat {
    pub sample_rate: u32,
    /// Number of interleaved output channels.
    pub channels: u16,
    pub sample_format: SampleFormat,
    pub bits_per_sample: u16,
}

impl TargetFormat {
    pub fn new(
        sample_rate: u32,
        channels: u16,
        sample_format: SampleFormat,
        bits_per_sample: u16,
    ) -> Result<Self, Box<dyn Error>> {
        if sample_rate == 0 {
            return Err("sample rate must be positive".into());
        }
        if channels == 0 {
            return Err("channel count must be positive".into());
        }
        if !sample_format.supports_bits(bits_per_sample) {
            return Err(format!(
                "Unsupported bit depth {} for {} samples",
                bits_per_sample, sample_format
            )
            .into());
        }

        Ok(TargetFormat {
            sample_rate,
            channels,
            sample_format,
            bits_per_sample,
        })
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}Hz {}ch {}{}",
            self.sample_rate, self.channels, self.sample_format, self.bits_per_sample
        )
    }
}

impl Default for TargetFormat {
    /// 44.1kHz stereo float.
    fn default() -> Self {
        TargetFormat {
            sample_rate: 44100,
            channels: 2,
            sample_format: SampleFormat::Float,
            bits_per_sample: 32,
        }
    }
}
