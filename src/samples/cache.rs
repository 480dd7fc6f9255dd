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
//! The per-pad decoded buffers.
//!
//! Every load is tagged with a generation taken when the load starts. A finished load is
//! only installed if nothing newer was installed for the pad in the meantime, so a slow
//! decode can never overwrite the result of a later one.

use std::collections::HashMap;

use super::loader::LoadedSample;
use crate::layout::PadId;

/// Orders the loads of a single pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

/// The result of offering a finished load to the cache.
#[derive(Debug, PartialEq)]
pub enum Install {
    /// The buffer is now the pad's. Carries whether a previous buffer was replaced.
    Installed { replaced: bool },
    /// A newer load was installed or the pad was evicted; the buffer was dropped.
    Stale,
}

#[derive(Default)]
struct Slot {
    /// The generation handed out by the most recent begin_load or evict.
    latest: Generation,
    /// The generation of the installed buffer.
    installed: Generation,
    sample: Option<LoadedSample>,
}

/// Holds at most one decoded buffer per pad.
#[derive(Default)]
pub struct BufferCache {
    slots: HashMap<PadId, Slot>,
}

impl BufferCache {
    pub fn new() -> BufferCache {
        BufferCache::default()
    }

    /// Starts a load for the pad and returns the generation to tag it with.
    pub fn begin_load(&mut self, pad: PadId) -> Generation {
        let slot = self.slots.entry(pad).or_default();
        slot.latest = Generation(slot.latest.0 + 1);
        slot.latest
    }

    /// Installs a finished load if its generation is newer than the installed one. Evicting
    /// moves the installed generation past every load started before it.
    pub fn install(&mut self, pad: PadId, generation: Generation, sample: LoadedSample) -> Install {
        let slot = self.slots.entry(pad).or_default();
        if generation <= slot.installed {
            return Install::Stale;
        }
        slot.installed = generation;
        let replaced = slot.sample.replace(sample).is_some();
        Install::Installed { replaced }
    }

    /// Removes the pad's buffer. Loads started before this call will be discarded.
    /// Returns true if a buffer was removed.
    pub fn evict(&mut self, pad: PadId) -> bool {
        let slot = self.slots.entry(pad).or_default();
        slot.latest = Generation(slot.latest.0 + 1);
        slot.installed = slot.latest;
        slot.sample.take().is_some()
    }

    /// Returns the pad's buffer.
    pub fn get(&self, pad: PadId) -> Option<&LoadedSample> {
        self.slots.get(&pad).and_then(|slot| slot.sample.as_ref())
    }

    /// The generation of the buffer currently installed for the pad.
    pub fn installed_generation(&self, pad: PadId) -> Generation {
        self.slots
            .get(&pad)
            .map(|slot| slot.installed)
            .unwrap_or_default()
    }

    /// Number of pads holding a buffer.
    pub fn len(&self) -> usize {
        self.slots.values().filter(|slot| slot.sample.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes held by installed buffers.
    pub fn memory_usage(&self) -> usize {
        self.slots
            .values()
            .filter_map(|slot| slot.sample.as_ref())
            .map(|sample| sample.memory_size())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad(id: u8) -> PadId {
        PadId::new(id).unwrap()
    }

    fn sample(frames: usize) -> LoadedSample {
        LoadedSample::from_interleaved(vec![0.0; frames * 2], 2, 44100)
    }

    #[test]
    fn test_install_in_order() {
        let mut cache = BufferCache::new();
        let first = cache.begin_load(pad(0));
        assert_eq!(
            cache.install(pad(0), first, sample(10)),
            Install::Installed { replaced: false }
        );
        let second = cache.begin_load(pad(0));
        assert_eq!(
            cache.install(pad(0), second, sample(20)),
            Install::Installed { replaced: true }
        );
        assert_eq!(cache.get(pad(0)).unwrap().frames(), 20);
        assert_eq!(cache.installed_generation(pad(0)), second);
    }

    #[test]
    fn test_out_of_order_completion_is_stale() {
        let mut cache = BufferCache::new();
        let slow = cache.begin_load(pad(3));
        let fast = cache.begin_load(pad(3));

        assert_eq!(
            cache.install(pad(3), fast, sample(2)),
            Install::Installed { replaced: false }
        );
        assert_eq!(cache.install(pad(3), slow, sample(1)), Install::Stale);
        assert_eq!(cache.get(pad(3)).unwrap().frames(), 2);
    }

    #[test]
    fn test_evict_invalidates_in_flight_loads() {
        let mut cache = BufferCache::new();
        let generation = cache.begin_load(pad(1));
        cache.install(pad(1), generation, sample(5));

        let in_flight = cache.begin_load(pad(1));
        assert!(cache.evict(pad(1)));
        assert!(cache.get(pad(1)).is_none());
        assert_eq!(cache.install(pad(1), in_flight, sample(5)), Install::Stale);
        assert!(!cache.evict(pad(1)));

        // A load started after the eviction goes through.
        let after = cache.begin_load(pad(1));
        assert_eq!(
            cache.install(pad(1), after, sample(5)),
            Install::Installed { replaced: false }
        );
    }

    #[test]
    fn test_pads_are_independent() {
        let mut cache = BufferCache::new();
        let a = cache.begin_load(pad(0));
        let b = cache.begin_load(pad(11));
        cache.install(pad(11), b, sample(4));
        cache.install(pad(0), a, sample(4));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.memory_usage(), 2 * 4 * 2 * 4);
        assert!(cache.get(pad(5)).is_none());
    }
}
