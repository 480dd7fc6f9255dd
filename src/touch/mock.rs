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
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, info, span, Level};

use super::RawTouch;
use crate::cancel::CancelHandle;

/// How often an idle mock driver checks whether it should stop.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A touch driver that sends a fixed script of frames every time it's started, then stays
/// quiet until it's cancelled.
pub struct Driver {
    frames: Arc<Vec<Vec<RawTouch>>>,
    starts: Arc<AtomicUsize>,
}

impl Driver {
    pub fn new(frames: Vec<Vec<RawTouch>>) -> Driver {
        Driver {
            frames: Arc::new(frames),
            starts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times the driver has been started.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::Relaxed)
    }
}

impl super::Driver for Driver {
    fn monitor_touches(
        &self,
        frames_tx: Sender<Vec<RawTouch>>,
        cancel: CancelHandle,
    ) -> JoinHandle<Result<(), io::Error>> {
        let frames = self.frames.clone();
        self.starts.fetch_add(1, Ordering::Relaxed);

        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "mock touch driver");
            let _enter = span.enter();

            info!(frames = frames.len(), "Mock touch driver started.");
            for frame in frames.iter() {
                if cancel.is_cancelled() || frames_tx.blocking_send(frame.clone()).is_err() {
                    return Ok(());
                }
            }

            debug!("Mock touch script finished.");
            while !frames_tx.is_closed() && !cancel.wait_timeout(POLL_INTERVAL) {}
            Ok(())
        })
    }
}
