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
use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc::Sender, task::JoinHandle};

use crate::cancel::CancelHandle;

pub mod grid;
pub mod mock;
pub mod normalizer;
pub mod replay;

pub use normalizer::TouchNormalizer;

/// Identifies a finger for as long as it stays on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TouchId(pub i32);

impl fmt::Display for TouchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a touch is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TouchState {
    /// Reported by the hardware but not touching the surface.
    Idle,
    /// First frame of contact.
    Entering,
    /// Resting on or moving across the surface.
    Active,
    /// Lifting off.
    Ending,
}

/// A touch as reported by a driver. The origin is the bottom left corner of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawTouch {
    pub id: TouchId,
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
    pub state: TouchState,
}

/// A touch in presentation coordinates: the unit square with its origin at the top left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    pub id: TouchId,
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
    pub state: TouchState,
}

/// Every touch on the surface at one point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TouchFrame {
    /// Counts the frames published since the normalizer started.
    pub sequence: u64,
    pub touches: Vec<Touch>,
}

/// A source of multitouch frames.
pub trait Driver: Send + Sync + 'static {
    /// Streams raw frames into frames_tx until cancelled or until the receiver goes away.
    fn monitor_touches(
        &self,
        frames_tx: Sender<Vec<RawTouch>>,
        cancel: CancelHandle,
    ) -> JoinHandle<Result<(), io::Error>>;
}
