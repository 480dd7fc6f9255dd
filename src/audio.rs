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
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::{error::Error, fmt, sync::Arc};

use crate::config;

pub mod cpal;
pub mod format;
pub mod mixer;
pub mod mock;
pub mod sample_source;

pub use format::{SampleFormat, TargetFormat};

/// Sender half used to hand new voices to the device's mixer without locking it.
pub type SourceSender = crossbeam_channel::Sender<mixer::ActiveSource>;

/// Global atomic counter for generating unique source IDs.
static SOURCE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Returns a new unique mixer source ID.
pub fn next_source_id() -> u64 {
    SOURCE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// An audio output with a single mixed bus. Pads hand it voices through the source sender.
pub trait Device: Any + fmt::Display + Send + Sync {
    /// The format the device mixes in. Decoded samples are converted to this format.
    fn target_format(&self) -> TargetFormat;

    /// Returns a sender that delivers voices to the device's mixer.
    fn source_sender(&self) -> SourceSender;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device for the given configuration. Devices whose name starts with "mock" are
/// mock devices that only render when asked to.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device, config.target_format()?)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
