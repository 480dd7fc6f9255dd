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
//! The 12 pad grid and the assignment of samples to pads.
//!
//! Pads are laid out as 4 columns by 3 rows. Pad 0 is the bottom left pad, pad 11 the top
//! right one.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::samples::{SampleFile, SampleIndex};

/// Multiplier used to spread the default file choice across a category.
const FILE_SELECTION_STRIDE: usize = 37;

/// Identifies one of the twelve pads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PadId(u8);

impl PadId {
    pub const COUNT: usize = 12;

    /// Returns the pad id, or None if it's out of range.
    pub fn new(id: u8) -> Option<PadId> {
        if (id as usize) < PadId::COUNT {
            Some(PadId(id))
        } else {
            None
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// All pad ids in order.
    pub fn all() -> impl Iterator<Item = PadId> {
        (0..PadId::COUNT as u8).map(PadId)
    }
}

impl fmt::Display for PadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The color the presentation layer draws a pad in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadColor {
    Red,
    Blue,
    Yellow,
    Orange,
    Purple,
    Green,
    Gray,
}

impl PadColor {
    /// Picks a color from keywords in the category key.
    pub fn for_category(category: &str) -> PadColor {
        let category = category.to_lowercase();
        let has = |keyword: &str| category.contains(keyword);
        if has("kick") {
            PadColor::Red
        } else if has("snare") {
            PadColor::Blue
        } else if has("hihat") {
            PadColor::Yellow
        } else if has("clap") {
            PadColor::Orange
        } else if has("tom") {
            PadColor::Purple
        } else if has("cymbal") || has("crash") || has("ride") {
            PadColor::Green
        } else {
            PadColor::Gray
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PadColor::Red => "red",
            PadColor::Blue => "blue",
            PadColor::Yellow => "yellow",
            PadColor::Orange => "orange",
            PadColor::Purple => "purple",
            PadColor::Green => "green",
            PadColor::Gray => "gray",
        }
    }
}

/// Display name and category key for each pad, by pad id.
const TEMPLATE: [(&str, &str); PadId::COUNT] = [
    ("Kick", "Kick"),
    ("Snare", "Snare"),
    ("Hi-Hat", "Hihat"),
    ("Clap", "Clap"),
    ("Low Tom", "Tom"),
    ("Mid Tom", "Tom"),
    ("High Tom", "Tom"),
    ("Crash", "Cymbal"),
    ("Ride", "Ride"),
    ("Ride Bell", "Ride"),
    ("Percussion", "Percussion"),
    ("Cowbell", "Bell"),
];

/// A single pad and its live touch state.
#[derive(Debug, Clone, PartialEq)]
pub struct Pad {
    pub id: PadId,
    pub name: &'static str,
    /// The category key the pad draws its samples from.
    pub category: &'static str,
    pub color: PadColor,
    /// The assigned sample. A pad without one is silent.
    pub sample: Option<SampleFile>,
    pub pressed: bool,
    pub pressure: f32,
}

impl Pad {
    fn from_template(id: PadId) -> Pad {
        let (name, category) = TEMPLATE[id.index()];
        Pad {
            id,
            name,
            category,
            color: PadColor::for_category(category),
            sample: None,
            pressed: false,
            pressure: 0.0,
        }
    }

    /// Clears the touch state of the pad.
    pub fn release(&mut self) {
        self.pressed = false;
        self.pressure = 0.0;
    }
}

/// Builds the twelve pads, ordered by id. Each pad gets file (id * 37) mod count of its
/// category, so the layout only depends on the index.
pub fn generate(index: &SampleIndex) -> Vec<Pad> {
    PadId::all()
        .map(|id| {
            let mut pad = Pad::from_template(id);
            pad.sample = index
                .lookup(pad.category)
                .filter(|files| !files.is_empty())
                .map(|files| files[(id.index() * FILE_SELECTION_STRIDE) % files.len()].clone());
            pad
        })
        .collect()
}

/// Picks a new random sample for every pad. A pad gets a random file from its own category
/// when the index has one, otherwise a random file from a random category. Returns the new
/// assignments; with an empty index nothing is assigned.
pub fn randomize<R: Rng + ?Sized>(
    index: &SampleIndex,
    pads: &[Pad],
    rng: &mut R,
) -> Vec<(PadId, SampleFile)> {
    let categories: Vec<&str> = index.categories().collect();

    pads.iter()
        .filter_map(|pad| {
            let files = match index.lookup(pad.category).filter(|files| !files.is_empty()) {
                Some(files) => files,
                None => {
                    let category = categories.choose(rng)?;
                    index.get(category)?
                }
            };
            files.choose(rng).map(|file| (pad.id, file.clone()))
        })
        .collect()
}
