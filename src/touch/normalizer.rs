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
use std::sync::Arc;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{error, info, span, Instrument, Level};

use super::{Driver, RawTouch, Touch, TouchFrame, TouchState};
use crate::cancel::CancelHandle;

/// Frames buffered between the driver and the normalizer, and between the normalizer and
/// its consumer.
const FRAME_BUFFER: usize = 64;

/// Converts a raw frame to presentation coordinates. Idle touches are dropped. When
/// invert_y is set the y axis is flipped, as the hardware origin is the bottom left corner.
/// Coordinates outside of the unit square are kept.
pub fn normalize(raw: &[RawTouch], invert_y: bool) -> Vec<Touch> {
    raw.iter()
        .filter(|touch| touch.state != TouchState::Idle)
        .map(|touch| Touch {
            id: touch.id,
            x: touch.x,
            y: if invert_y { 1.0 - touch.y } else { touch.y },
            pressure: touch.pressure,
            state: touch.state,
        })
        .collect()
}

struct Running {
    cancel: CancelHandle,
    forwarder: JoinHandle<()>,
}

/// Runs a touch driver and publishes each normalized frame.
pub struct TouchNormalizer {
    driver: Arc<dyn Driver>,
    invert_y: bool,
    frames_tx: Sender<TouchFrame>,
    running: Option<Running>,
}

impl TouchNormalizer {
    /// Creates a stopped normalizer and the receiver its frames are published on.
    pub fn new(driver: Arc<dyn Driver>, invert_y: bool) -> (TouchNormalizer, Receiver<TouchFrame>) {
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_BUFFER);
        (
            TouchNormalizer {
                driver,
                invert_y,
                frames_tx,
                running: None,
            },
            frames_rx,
        )
    }

    /// Starts the driver. Returns false if it was already running.
    pub fn start(&mut self) -> bool {
        if self.running.is_some() {
            return false;
        }

        let (raw_tx, mut raw_rx) = mpsc::channel::<Vec<RawTouch>>(FRAME_BUFFER);
        let cancel = CancelHandle::new();
        let monitor = self.driver.monitor_touches(raw_tx, cancel.clone());
        let frames_tx = self.frames_tx.clone();
        let invert_y = self.invert_y;

        let forwarder = tokio::spawn(
            async move {
                info!("Touch normalizer started.");
                let mut sequence = 0;
                while let Some(raw) = raw_rx.recv().await {
                    sequence += 1;
                    let frame = TouchFrame {
                        sequence,
                        touches: normalize(&raw, invert_y),
                    };
                    if frames_tx.send(frame).await.is_err() {
                        break;
                    }
                }

                // Let the driver see the closed channel before waiting on it.
                drop(raw_rx);
                match monitor.await {
                    Ok(Ok(())) => info!("Touch driver stopped."),
                    Ok(Err(e)) => error!(err = %e, "Touch driver failed"),
                    Err(e) => error!(err = %e, "Error waiting for touch driver to stop"),
                }
            }
            .instrument(span!(Level::INFO, "touch normalizer")),
        );

        self.running = Some(Running { cancel, forwarder });
        true
    }

    /// Stops the driver. No frames are published after this returns. Returns false if it
    /// wasn't running.
    pub fn stop(&mut self) -> bool {
        match self.running.take() {
            Some(running) => {
                running.cancel.cancel();
                running.forwarder.abort();
                info!("Touch normalizer stopped.");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for TouchNormalizer {
    fn drop(&mut self) {
        self.stop();
    }
}
