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
//! Maps touches to pads and turns the stream of frames into pad triggers.
//!
//! A touch triggers a pad on the first frame it's seen on that pad. Staying on the pad only
//! updates its pressure, and sliding onto another pad triggers that one.

use std::collections::{BTreeMap, HashMap};

use super::{Touch, TouchId, TouchState};
use crate::layout::{Pad, PadId};

pub const COLUMNS: usize = 4;
pub const ROWS: usize = 3;

const VELOCITY_BOOST: f32 = 1.5;
const MIN_VELOCITY: f32 = 0.2;
const MAX_VELOCITY: f32 = 1.0;

/// Which pad each touch was on in the last frame.
pub type TouchPadMap = HashMap<TouchId, PadId>;

/// Returns the pad under a point of the unit square, origin top left. Row 0 is the top row,
/// which holds pads 8 to 11.
pub fn hit_test(x: f32, y: f32) -> Option<PadId> {
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    let col = (x * COLUMNS as f32).floor();
    let row = (y * ROWS as f32).floor();
    if col < 0.0 || col >= COLUMNS as f32 || row < 0.0 || row >= ROWS as f32 {
        return None;
    }
    let (col, row) = (col as usize, row as usize);
    PadId::new(((ROWS - 1 - row) * COLUMNS + col) as u8)
}

/// The gain a touch of the given pressure plays at.
pub fn velocity(pressure: f32) -> f32 {
    if pressure.is_nan() {
        return MIN_VELOCITY;
    }
    (pressure * VELOCITY_BOOST).clamp(MIN_VELOCITY, MAX_VELOCITY)
}

/// A touch landing on a pad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub pad: PadId,
    pub touch: TouchId,
    pub velocity: f32,
}

/// The change a frame made to a pad's touch state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadChange {
    pub pad: PadId,
    pub pressed: bool,
    pub pressure: f32,
}

/// What one frame did to the grid.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameOutcome {
    /// The touch to pad map to carry into the next frame.
    pub map: TouchPadMap,
    /// The pads touched in this frame and the highest pressure on each.
    pub occupied: BTreeMap<PadId, f32>,
    /// Pads to trigger, in frame order.
    pub triggers: Vec<Trigger>,
}

/// Hit tests every touch of a frame against the previous frame's map.
pub fn process_frame(touches: &[Touch], previous: &TouchPadMap) -> FrameOutcome {
    let mut outcome = FrameOutcome::default();

    for touch in touches {
        let Some(pad) = hit_test(touch.x, touch.y) else {
            continue;
        };
        outcome.map.insert(touch.id, pad);

        let pressure = if touch.pressure.is_finite() {
            touch.pressure.max(0.0)
        } else {
            0.0
        };
        outcome
            .occupied
            .entry(pad)
            .and_modify(|current| *current = current.max(pressure))
            .or_insert(pressure);

        let starting = matches!(touch.state, TouchState::Entering | TouchState::Active);
        if starting && previous.get(&touch.id) != Some(&pad) {
            outcome.triggers.push(Trigger {
                pad,
                touch: touch.id,
                velocity: velocity(touch.pressure),
            });
        }
    }

    outcome
}

impl FrameOutcome {
    /// Applies the frame to the pads: occupied pads are pressed with the frame's pressure,
    /// every other pad is released. Returns the pads whose state changed.
    pub fn apply(&self, pads: &mut [Pad]) -> Vec<PadChange> {
        let mut changes = Vec::new();
        for pad in pads.iter_mut() {
            let (pressed, pressure) = match self.occupied.get(&pad.id) {
                Some(&pressure) => (true, pressure),
                None => (false, 0.0),
            };
            if pad.pressed != pressed || pad.pressure != pressure {
                pad.pressed = pressed;
                pad.pressure = pressure;
                changes.push(PadChange {
                    pad: pad.id,
                    pressed,
                    pressure,
                });
            }
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout;
    use crate::samples::SampleIndex;

    fn touch(id: i32, x: f32, y: f32, pressure: f32, state: TouchState) -> Touch {
        Touch {
            id: TouchId(id),
            x,
            y,
            pressure,
            state,
        }
    }

    fn pad(id: u8) -> PadId {
        PadId::new(id).unwrap()
    }

    #[test]
    fn test_hit_test_corners() {
        // Bottom left is pad 0, top right is pad 11.
        assert_eq!(hit_test(0.0, 0.99), Some(pad(0)));
        assert_eq!(hit_test(0.99, 0.0), Some(pad(11)));
        assert_eq!(hit_test(0.1, 0.1), Some(pad(8)));
        assert_eq!(hit_test(0.3, 0.5), Some(pad(5)));
        assert_eq!(hit_test(0.74, 0.67), Some(pad(2)));
    }

    #[test]
    fn test_hit_test_documented_points() {
        assert_eq!(hit_test(0.1, 0.05), Some(pad(8)));
        assert_eq!(hit_test(0.95, 0.99), Some(pad(3)));
    }

    #[test]
    fn test_hit_test_partitions_the_square() {
        let mut seen = BTreeMap::new();
        for row in 0..ROWS {
            for col in 0..COLUMNS {
                let expected = pad(((ROWS - 1 - row) * COLUMNS + col) as u8);
                for dx in [0.02, 0.5, 0.98] {
                    for dy in [0.02, 0.5, 0.98] {
                        let x = (col as f32 + dx) / COLUMNS as f32;
                        let y = (row as f32 + dy) / ROWS as f32;
                        assert_eq!(hit_test(x, y), Some(expected), "({}, {})", x, y);
                    }
                }
                assert!(seen.insert(expected, (col, row)).is_none());
            }
        }
        assert_eq!(seen.len(), COLUMNS * ROWS);
    }

    #[test]
    fn test_hit_test_out_of_range() {
        assert_eq!(hit_test(1.0, 0.5), None);
        assert_eq!(hit_test(0.5, 1.0), None);
        assert_eq!(hit_test(-0.01, 0.5), None);
        assert_eq!(hit_test(0.5, -0.2), None);
        assert_eq!(hit_test(f32::NAN, 0.5), None);
        assert_eq!(hit_test(0.5, f32::INFINITY), None);
    }

    #[test]
    fn test_velocity() {
        assert_eq!(velocity(0.0), 0.2);
        assert_eq!(velocity(0.1), 0.2);
        assert!((velocity(0.4) - 0.6).abs() < 1e-6);
        assert_eq!(velocity(0.8), 1.0);
        assert_eq!(velocity(5.0), 1.0);
        assert_eq!(velocity(f32::NAN), 0.2);
    }

    #[test]
    fn test_trigger_once_per_occupancy() {
        let map = TouchPadMap::new();
        let first = process_frame(&[touch(1, 0.1, 0.9, 0.4, TouchState::Entering)], &map);
        assert_eq!(first.triggers.len(), 1);
        assert_eq!(first.triggers[0].pad, pad(0));
        assert!((first.triggers[0].velocity - 0.6).abs() < 1e-6);

        let second = process_frame(&[touch(1, 0.12, 0.9, 0.9, TouchState::Active)], &first.map);
        assert!(second.triggers.is_empty());
        assert_eq!(second.occupied.get(&pad(0)), Some(&0.9));

        // Sliding onto the neighbour triggers it.
        let third = process_frame(&[touch(1, 0.3, 0.9, 0.9, TouchState::Active)], &second.map);
        assert_eq!(third.triggers.len(), 1);
        assert_eq!(third.triggers[0].pad, pad(1));

        // Lifting off and landing again triggers again.
        let released = process_frame(&[], &third.map);
        assert!(released.map.is_empty());
        let again = process_frame(&[touch(1, 0.3, 0.9, 0.5, TouchState::Entering)], &released.map);
        assert_eq!(again.triggers.len(), 1);
    }

    #[test]
    fn test_ending_touch_does_not_trigger() {
        let outcome = process_frame(
            &[touch(3, 0.5, 0.5, 0.5, TouchState::Ending)],
            &TouchPadMap::new(),
        );
        assert!(outcome.triggers.is_empty());
        assert_eq!(outcome.map.get(&TouchId(3)), Some(&pad(6)));
        assert!(outcome.occupied.contains_key(&pad(6)));
    }

    #[test]
    fn test_two_touches_on_one_pad() {
        let outcome = process_frame(
            &[
                touch(1, 0.1, 0.1, 0.2, TouchState::Entering),
                touch(2, 0.15, 0.2, 0.6, TouchState::Entering),
                touch(3, 0.1, 1.5, 0.9, TouchState::Entering),
            ],
            &TouchPadMap::new(),
        );
        assert_eq!(outcome.triggers.len(), 2);
        assert_eq!(outcome.occupied.len(), 1);
        assert_eq!(outcome.occupied.get(&pad(8)), Some(&0.6));
        assert!(!outcome.map.contains_key(&TouchId(3)));
    }

    #[test]
    fn test_apply_releases_immediately() {
        let mut pads = layout::generate(&SampleIndex::default());
        let pressed = process_frame(
            &[touch(1, 0.1, 0.9, 0.7, TouchState::Entering)],
            &TouchPadMap::new(),
        );
        let changes = pressed.apply(&mut pads);
        assert_eq!(
            changes,
            vec![PadChange {
                pad: pad(0),
                pressed: true,
                pressure: 0.7
            }]
        );
        assert!(pads[0].pressed);

        // Unchanged frames produce no changes.
        assert!(pressed.apply(&mut pads).is_empty());

        let released = process_frame(&[], &pressed.map);
        let changes = released.apply(&mut pads);
        assert_eq!(changes.len(), 1);
        assert!(!pads[0].pressed);
        assert_eq!(pads[0].pressure, 0.0);
    }
}
