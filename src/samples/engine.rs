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
//! Main sample engine that coordinates sample loading and pad playback.

use std::error::Error;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use super::cache::{BufferCache, Generation, Install};
use super::loader::{LoadedSample, SampleLoader};
use super::voice::{Voice, VoiceManager};
use crate::audio::mixer::ActiveSource;
use crate::audio::sample_source::DecodeError;
use crate::audio::{self, SourceSender};
use crate::cancel::CancelHandle;
use crate::layout::PadId;

/// A finished background load.
struct CompletedLoad {
    pad: PadId,
    generation: Generation,
    path: PathBuf,
    result: Result<LoadedSample, DecodeError>,
}

/// The sample engine owns the decoded pad buffers and starts voices on the device.
///
/// It's driven from a single task. Loads are decoded on a worker pool and only become
/// visible once that task calls apply_completed_loads.
pub struct SampleEngine {
    /// The device voices are played on. Holding it keeps the output stream open.
    device: Arc<dyn audio::Device>,
    /// Channel for adding sources without lock contention.
    source_tx: SourceSender,
    /// Sample loader for decoding and converting files.
    loader: Arc<SampleLoader>,
    /// Workers that decode samples.
    pool: rayon::ThreadPool,
    cache: BufferCache,
    voices: VoiceManager,
    completed_tx: Sender<CompletedLoad>,
    completed_rx: Receiver<CompletedLoad>,
    /// Loads handed to the pool that haven't been collected yet.
    pending: usize,
    /// The file each pad last asked for. Decoded files no pad asks for are dropped.
    requested: HashMap<PadId, PathBuf>,
}

impl SampleEngine {
    /// Creates a new sample engine playing on the given device.
    pub fn new(
        device: Arc<dyn audio::Device>,
        load_threads: usize,
    ) -> Result<Self, Box<dyn Error>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(load_threads.max(1))
            .thread_name(|i| format!("sample-loader-{}", i))
            .build()?;
        let (completed_tx, completed_rx) = crossbeam_channel::unbounded();
        let target_format = device.target_format();

        info!(
            device = %device,
            format = %target_format,
            load_threads,
            "Sample engine ready"
        );

        Ok(Self {
            source_tx: device.source_sender(),
            device,
            loader: Arc::new(SampleLoader::new(target_format)),
            pool,
            cache: BufferCache::new(),
            voices: VoiceManager::new(),
            completed_tx,
            completed_rx,
            pending: 0,
            requested: HashMap::new(),
        })
    }

    /// Starts loading the file into the pad in the background. The pad keeps playing its
    /// current buffer until the load is applied.
    pub fn load(&mut self, pad: PadId, path: PathBuf) -> Generation {
        let generation = self.cache.begin_load(pad);
        let loader = self.loader.clone();
        let completed_tx = self.completed_tx.clone();
        self.pending += 1;
        self.requested.insert(pad, path.clone());

        debug!(pad = %pad, path = ?path, "Queued sample load");
        self.pool.spawn(move || {
            let result = loader.load(&path);
            // The engine may be gone by now, in which case nobody wants the result.
            let _ = completed_tx.send(CompletedLoad {
                pad,
                generation,
                path,
                result,
            });
        });
        generation
    }

    /// Installs every finished load that is still current. A pad whose buffer is replaced
    /// has its voice stopped. A failed load is logged and the pad keeps its prior buffer.
    /// Returns the number of buffers installed.
    pub fn apply_completed_loads(&mut self) -> usize {
        let mut installed = 0;
        let mut collected = 0;
        for completed in self.completed_rx.try_iter() {
            collected += 1;
            self.pending = self.pending.saturating_sub(1);
            let CompletedLoad {
                pad,
                generation,
                path,
                result,
            } = completed;

            let sample = match result {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(pad = %pad, path = ?path, err = %e, "Failed to load sample");
                    continue;
                }
            };

            match self.cache.install(pad, generation, sample) {
                Install::Installed { replaced } => {
                    if replaced {
                        self.voices.stop(pad);
                    }
                    installed += 1;
                    debug!(
                        pad = %pad,
                        path = ?path,
                        sample_rate = self.cache.get(pad).map(LoadedSample::sample_rate),
                        replaced,
                        "Installed sample"
                    );
                }
                Install::Stale => {
                    debug!(pad = %pad, path = ?path, "Discarded stale sample load");
                }
            }
        }
        if collected > 0 {
            self.trim_file_cache();
        }
        installed
    }

    /// Removes the pad's buffer and stops its voice. Loads in flight for the pad are
    /// discarded when they finish.
    pub fn unload(&mut self, pad: PadId) -> bool {
        self.voices.stop(pad);
        self.requested.remove(&pad);
        self.trim_file_cache();
        self.cache.evict(pad)
    }

    /// Keeps the decoded file cache down to the files pads currently ask for. Installed pad
    /// buffers hold their own copy.
    fn trim_file_cache(&self) {
        let removed = self
            .loader
            .retain(|path| self.requested.values().any(|wanted| wanted == path));
        if removed > 0 {
            debug!(removed, "Dropped decoded files no pad uses");
        }
    }

    /// Plays the pad's buffer at the given gain, cutting the pad's current voice.
    /// A pad without a buffer does nothing. Returns true if a voice was started.
    pub fn trigger(&mut self, pad: PadId, velocity: f32) -> bool {
        let Some(sample) = self.cache.get(pad) else {
            return false;
        };

        let source_id = audio::next_source_id();
        let cancel_handle = CancelHandle::new();
        let is_finished = Arc::new(AtomicBool::new(false));
        let source = ActiveSource {
            id: source_id,
            pad,
            source: sample.create_source(velocity),
            is_finished: is_finished.clone(),
            cancel_handle: cancel_handle.clone(),
        };

        self.voices.add_voice(
            pad,
            Voice::new(source_id, cancel_handle.clone(), is_finished),
        );
        if let Err(e) = self.source_tx.send(source) {
            warn!(
                device = %self.device,
                pad = %pad,
                err = %e,
                "Audio device is gone, dropping trigger"
            );
            cancel_handle.cancel();
            return false;
        }

        debug!(pad = %pad, velocity, source_id, "Triggered pad");
        true
    }

    /// Stops every voice.
    pub fn stop_all(&mut self) {
        self.voices.clear();
    }

    /// Number of voices still playing.
    pub fn active_voice_count(&mut self) -> usize {
        self.voices.active_count()
    }

    /// Returns true if the pad has a buffer to play.
    pub fn has_buffer(&self, pad: PadId) -> bool {
        self.cache.get(pad).is_some()
    }

    /// Loads queued but not yet collected by apply_completed_loads.
    pub fn pending_loads(&self) -> usize {
        self.pending
    }

    /// Bytes held by the installed pad buffers.
    pub fn memory_usage(&self) -> usize {
        self.cache.memory_usage()
    }

    /// Forgets decoded files so the next load of a path reads it from disk again.
    pub fn clear_file_cache(&self) {
        self.loader.clear_cache();
    }
}
