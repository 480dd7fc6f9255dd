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
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info};

use crate::layout::{self, Pad};
use crate::samples::{SampleEngine, SampleIndex, SampleIndexer};
use crate::touch::grid::{self, PadChange, TouchPadMap, Trigger};
use crate::touch::TouchFrame;

/// What a touch frame did.
#[derive(Debug, Default, PartialEq)]
pub struct FrameEffects {
    /// Pads that were triggered. A pad without a sample is listed but plays nothing.
    pub triggers: Vec<Trigger>,
    /// Pads whose pressed state or pressure changed.
    pub changes: Vec<PadChange>,
}

/// The drum instrument: the pads, what's touching them, and the engine playing them.
///
/// Everything here is owned by a single task. Touch frames, controller commands and load
/// completions are all fed through it one at a time.
pub struct Instrument {
    indexer: SampleIndexer,
    index: Arc<SampleIndex>,
    pads: Vec<Pad>,
    touch_map: TouchPadMap,
    engine: SampleEngine,
    powered: bool,
}

impl Instrument {
    /// Creates a powered on instrument and lays out its pads.
    pub fn new(mut indexer: SampleIndexer, engine: SampleEngine) -> Instrument {
        let index = indexer.index();
        let mut instrument = Instrument {
            indexer,
            pads: layout::generate(&SampleIndex::default()),
            index,
            touch_map: TouchPadMap::new(),
            engine,
            powered: true,
        };
        instrument.generate_layout();
        instrument
    }

    /// Lays the pads out from the current sample index and loads their samples. Pads whose
    /// sample didn't change keep their buffer. Doesn't touch the disk.
    pub fn generate_layout(&mut self) {
        self.relayout(false);
    }

    /// Scans the sample directory again, forgets every decoded file and lays the pads out
    /// from scratch. The scan runs on the calling thread.
    pub fn reload_samples(&mut self) {
        let index = self.indexer.rescan();
        self.install_index(index);
    }

    /// The directory reload_samples scans.
    pub fn sample_root(&self) -> &Path {
        self.indexer.root()
    }

    /// Finishes a reload with an index scanned elsewhere: forgets every decoded file and lays
    /// the pads out from scratch.
    pub fn install_index(&mut self, index: Arc<SampleIndex>) {
        self.indexer.install(index.clone());
        self.index = index;
        self.engine.clear_file_cache();
        self.relayout(true);
        info!(samples = self.index.len(), "Reloaded samples");
    }

    /// Assigns a random sample to every pad. Returns the number of pads that got one.
    pub fn randomize_samples<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let assignments = layout::randomize(&self.index, &self.pads, rng);
        let count = assignments.len();
        for (id, file) in assignments {
            let pad = &mut self.pads[id.index()];
            debug!(pad = %id, sample = file.display_name, "Randomized pad");
            self.engine.load(id, file.path.clone());
            pad.sample = Some(file);
        }
        info!(pads = count, "Randomized samples");
        count
    }

    /// Flips the power. Powering off releases every pad and stops all voices; while off,
    /// touch frames are ignored. Returns whether the instrument is now on.
    pub fn toggle_power(&mut self) -> bool {
        self.powered = !self.powered;
        if !self.powered {
            self.pads.iter_mut().for_each(Pad::release);
            self.touch_map.clear();
            self.engine.stop_all();
        }
        info!(powered = self.powered, "Toggled power");
        self.powered
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Read-only view of the pads, ordered by id.
    pub fn pads(&self) -> &[Pad] {
        &self.pads
    }

    pub fn index(&self) -> &SampleIndex {
        &self.index
    }

    /// Hit tests a frame, triggers the pads it landed on and updates the pad state.
    pub fn process_touch_frame(&mut self, frame: &TouchFrame) -> FrameEffects {
        if !self.powered {
            return FrameEffects::default();
        }

        let outcome = grid::process_frame(&frame.touches, &self.touch_map);
        for trigger in &outcome.triggers {
            self.engine.trigger(trigger.pad, trigger.velocity);
        }
        let changes = outcome.apply(&mut self.pads);
        self.touch_map = outcome.map;

        FrameEffects {
            triggers: outcome.triggers,
            changes,
        }
    }

    /// Installs finished sample loads. Returns the number installed.
    pub fn apply_completed_loads(&mut self) -> usize {
        self.engine.apply_completed_loads()
    }

    pub fn pending_loads(&self) -> usize {
        self.engine.pending_loads()
    }

    pub fn active_voice_count(&mut self) -> usize {
        self.engine.active_voice_count()
    }

    pub fn memory_usage(&self) -> usize {
        self.engine.memory_usage()
    }

    fn relayout(&mut self, force: bool) {
        let mut pads = layout::generate(&self.index);
        for (pad, previous) in pads.iter_mut().zip(self.pads.iter()) {
            pad.pressed = previous.pressed;
            pad.pressure = previous.pressure;

            let unchanged = pad.sample.as_ref().map(|s| &s.path)
                == previous.sample.as_ref().map(|s| &s.path)
                && self.engine.has_buffer(pad.id);
            if unchanged && !force {
                continue;
            }
            match &pad.sample {
                Some(sample) => {
                    self.engine.load(pad.id, sample.path.clone());
                }
                None => {
                    self.engine.unload(pad.id);
                }
            }
        }
        self.pads = pads;

        let assigned = self.pads.iter().filter(|pad| pad.sample.is_some()).count();
        info!(
            assigned,
            silent = self.pads.len() - assigned,
            "Generated pad layout"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::audio::{mock, TargetFormat};
    use crate::testutil::{eventually, write_wav_i16};
    use crate::touch::{Touch, TouchId, TouchState};

    fn instrument(root: &Path) -> (Instrument, Arc<mock::Device>) {
        let device = Arc::new(mock::Device::get("mock-instrument", TargetFormat::default()));
        let engine = SampleEngine::new(device.clone(), 2).unwrap();
        let instrument = Instrument::new(SampleIndexer::new(root.to_path_buf()), engine);
        (instrument, device)
    }

    fn wait_for_loads(instrument: &mut Instrument) {
        eventually(
            || {
                instrument.apply_completed_loads();
                instrument.pending_loads() == 0
            },
            "loads never finished",
        );
    }

    fn write_sample(root: &Path, file: &str) {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        write_wav_i16(&path, &[vec![16384; 2000], vec![16384; 2000]], 44100).unwrap();
    }

    fn frame(sequence: u64, touches: Vec<Touch>) -> TouchFrame {
        TouchFrame { sequence, touches }
    }

    fn kick_touch(pressure: f32, state: TouchState) -> Touch {
        Touch {
            id: TouchId(1),
            x: 0.1,
            y: 0.9,
            pressure,
            state,
        }
    }

    #[test]
    fn test_touch_triggers_pad() {
        let dir = tempfile::tempdir().unwrap();
        write_sample(dir.path(), "Kick/kick.wav");
        let (mut instrument, device) = instrument(dir.path());
        wait_for_loads(&mut instrument);
        assert_eq!(
            instrument.pads()[0].sample.as_ref().unwrap().display_name,
            "kick"
        );

        let effects =
            instrument.process_touch_frame(&frame(1, vec![kick_touch(0.4, TouchState::Entering)]));
        assert_eq!(effects.triggers.len(), 1);
        assert!(instrument.pads()[0].pressed);
        let rendered = device.render(1);
        assert!((rendered[0] - 0.3).abs() < 1e-3, "level {}", rendered[0]);

        // Holding the pad doesn't retrigger.
        let effects =
            instrument.process_touch_frame(&frame(2, vec![kick_touch(0.8, TouchState::Active)]));
        assert!(effects.triggers.is_empty());
        assert_eq!(instrument.pads()[0].pressure, 0.8);

        let effects = instrument.process_touch_frame(&frame(3, vec![]));
        assert_eq!(effects.changes.len(), 1);
        assert!(!instrument.pads()[0].pressed);
        assert_eq!(instrument.pads()[0].pressure, 0.0);
    }

    #[test]
    fn test_silent_pad_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let (mut instrument, device) = instrument(dir.path());
        wait_for_loads(&mut instrument);

        let effects =
            instrument.process_touch_frame(&frame(1, vec![kick_touch(1.0, TouchState::Entering)]));
        assert_eq!(effects.triggers.len(), 1);
        assert!(instrument.pads()[0].pressed);
        assert_eq!(device.active_sources(), 0);
    }

    #[test]
    fn test_power_off() {
        let dir = tempfile::tempdir().unwrap();
        write_sample(dir.path(), "Kick/kick.wav");
        let (mut instrument, device) = instrument(dir.path());
        wait_for_loads(&mut instrument);

        instrument.process_touch_frame(&frame(1, vec![kick_touch(0.5, TouchState::Entering)]));
        assert!(!instrument.toggle_power());
        assert!(!instrument.is_powered());
        assert!(instrument.pads().iter().all(|pad| !pad.pressed && pad.pressure == 0.0));
        assert_eq!(instrument.active_voice_count(), 0);
        assert_eq!(device.render(1), vec![0.0, 0.0]);

        let effects =
            instrument.process_touch_frame(&frame(2, vec![kick_touch(0.5, TouchState::Active)]));
        assert_eq!(effects, FrameEffects::default());
        assert!(!instrument.pads()[0].pressed);

        // Back on, the held touch counts as a new arrival.
        assert!(instrument.toggle_power());
        let effects =
            instrument.process_touch_frame(&frame(3, vec![kick_touch(0.5, TouchState::Active)]));
        assert_eq!(effects.triggers.len(), 1);
    }

    #[test]
    fn test_reload_picks_up_new_files() {
        let dir = tempfile::tempdir().unwrap();
        write_sample(dir.path(), "Snare/snare.wav");
        let (mut instrument, _device) = instrument(dir.path());
        wait_for_loads(&mut instrument);
        assert!(instrument.pads()[0].sample.is_none());

        write_sample(dir.path(), "Kick/kick.wav");
        instrument.generate_layout();
        assert!(instrument.pads()[0].sample.is_none());

        instrument.reload_samples();
        wait_for_loads(&mut instrument);
        assert_eq!(
            instrument.pads()[0].sample.as_ref().unwrap().display_name,
            "kick"
        );
        assert_eq!(instrument.memory_usage(), 2 * 2000 * 2 * 4);
    }

    #[test]
    fn test_install_index() {
        let dir = tempfile::tempdir().unwrap();
        write_sample(dir.path(), "Snare/snare.wav");
        let (mut instrument, _device) = instrument(dir.path());
        wait_for_loads(&mut instrument);
        assert_eq!(instrument.sample_root(), dir.path());

        write_sample(dir.path(), "Kick/kick.wav");
        let index = Arc::new(SampleIndex::scan(instrument.sample_root()));
        instrument.install_index(index.clone());
        wait_for_loads(&mut instrument);

        assert!(std::ptr::eq(instrument.index(), index.as_ref()));
        assert_eq!(
            instrument.pads()[0].sample.as_ref().unwrap().display_name,
            "kick"
        );
        assert_eq!(instrument.memory_usage(), 2 * 2000 * 2 * 4);
    }

    #[test]
    fn test_randomize() {
        let dir = tempfile::tempdir().unwrap();
        write_sample(dir.path(), "Kick/a.wav");
        write_sample(dir.path(), "Kick/b.wav");
        let (mut instrument, _device) = instrument(dir.path());
        wait_for_loads(&mut instrument);

        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(instrument.randomize_samples(&mut rng), 12);
        wait_for_loads(&mut instrument);
        assert!(instrument
            .pads()
            .iter()
            .all(|pad| pad.sample.as_ref().is_some_and(|s| s.category == "Kick")));
    }
}
