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
#[cfg(test)]
use std::error::Error;
use std::{fmt, sync::Arc};

use crossbeam_channel::{Receiver, Sender};
use tracing::info;

use super::mixer::{ActiveSource, AudioMixer};
use super::{SourceSender, TargetFormat};

/// A mock device. Doesn't play anything; the mix is only rendered when asked for.
#[derive(Clone)]
pub struct Device {
    name: String,
    format: TargetFormat,
    mixer: AudioMixer,
    source_tx: Sender<ActiveSource>,
    source_rx: Receiver<ActiveSource>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str, format: TargetFormat) -> Device {
        info!(device = name, format = %format, "Using mock audio device.");
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        Device {
            name: name.to_string(),
            mixer: AudioMixer::new(format.channels, format.sample_rate),
            format,
            source_tx,
            source_rx,
        }
    }

    /// Renders the given number of frames from whatever is playing, the same way the
    /// output callback of a real device would.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        self.drain_pending();
        self.mixer.process_frames(frames)
    }

    /// Number of voices the mixer is currently playing.
    pub fn active_sources(&self) -> usize {
        self.drain_pending();
        self.mixer.active_count()
    }

    fn drain_pending(&self) {
        for source in self.source_rx.try_iter() {
            self.mixer.add_source(source);
        }
    }
}

impl super::Device for Device {
    fn target_format(&self) -> TargetFormat {
        self.format.clone()
    }

    fn source_sender(&self) -> SourceSender {
        self.source_tx.clone()
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::audio::next_source_id;
    use crate::audio::sample_source::MemorySampleSource;
    use crate::audio::Device as _;
    use crate::layout::PadId;
    use crate::cancel::CancelHandle;

    #[test]
    fn test_render_sent_sources() {
        let device = Device::get("mock-device", TargetFormat::default());
        assert_eq!(device.to_string(), "mock-device (Mock)");

        device
            .source_sender()
            .send(ActiveSource {
                id: next_source_id(),
                pad: PadId::new(3).unwrap(),
                source: MemorySampleSource::from_shared(Arc::new(vec![0.25; 8]), 2, 1.0),
                is_finished: Arc::new(AtomicBool::new(false)),
                cancel_handle: CancelHandle::new(),
            })
            .unwrap();

        // Clones share the same mixer.
        let clone = device.to_mock().unwrap();
        assert_eq!(clone.active_sources(), 1);
        assert_eq!(device.render(2), vec![0.25; 4]);
        assert_eq!(device.render(4), vec![0.25, 0.25, 0.25, 0.25, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(clone.active_sources(), 0);
    }
}
