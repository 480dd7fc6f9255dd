// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, Instrument as _, Level};

use crate::instrument::Instrument;
use crate::layout::Pad;
use crate::samples::SampleIndex;
use crate::touch::{TouchFrame, TouchNormalizer};

pub mod keyboard;

/// How often finished sample loads are installed.
const LOAD_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Controller events that will trigger behavior in the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Assigns a random sample to every pad.
    Randomize,

    /// Rescans the sample directory and lays the pads out again.
    Reload,

    /// Turns the instrument on or off. While off, touch input is stopped.
    Power,

    /// Lays the pads out again from the current sample index.
    Layout,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// A snapshot of the instrument for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentState {
    pub powered: bool,
    pub pads: Vec<Pad>,
}

impl InstrumentState {
    fn of(instrument: &Instrument) -> InstrumentState {
        InstrumentState {
            powered: instrument.is_powered(),
            pads: instrument.pads().to_vec(),
        }
    }
}

/// A sample rescan running off the controller task, tagged with the reload that asked for it.
struct Rescan {
    latest: u64,
    index_tx: mpsc::Sender<(u64, SampleIndex)>,
}

impl Rescan {
    fn start(&mut self, instrument: &Instrument) {
        self.latest += 1;
        let reload = self.latest;
        let root = instrument.sample_root().to_path_buf();
        let index_tx = self.index_tx.clone();
        tokio::task::spawn_blocking(move || {
            // The controller may be gone by the time the scan finishes.
            let _ = index_tx.blocking_send((reload, SampleIndex::scan(&root)));
        });
    }
}

/// Drives an instrument. The instrument is owned by a single task which takes touch frames,
/// controller events, finished sample loads and finished rescans one at a time. Nothing on
/// that task reads the disk.
pub struct Controller {
    handle: JoinHandle<Instrument>,
    state_rx: watch::Receiver<InstrumentState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl Controller {
    /// Creates a new controller with the given driver. Touch input starts right away if the
    /// instrument is powered on.
    pub fn new(
        instrument: Instrument,
        normalizer: TouchNormalizer,
        frames_rx: mpsc::Receiver<TouchFrame>,
        driver: Arc<dyn Driver>,
    ) -> Controller {
        let (state_tx, state_rx) = watch::channel(InstrumentState::of(&instrument));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(
            Controller::run(
                instrument,
                normalizer,
                frames_rx,
                driver,
                state_tx,
                shutdown_rx,
            )
            .instrument(span!(Level::INFO, "controller")),
        );
        Controller {
            handle,
            state_rx,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Watches the pads and the power state.
    pub fn subscribe(&self) -> watch::Receiver<InstrumentState> {
        self.state_rx.clone()
    }

    /// Asks the controller to stop. Touch input is stopped before the instrument is handed
    /// back from join.
    pub fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            // The task may have already finished.
            let _ = shutdown_tx.send(());
        }
    }

    /// Join will block until the controller finishes, returning the instrument.
    pub async fn join(self) -> Result<Instrument, JoinError> {
        self.handle.await
    }

    async fn run(
        mut instrument: Instrument,
        mut normalizer: TouchNormalizer,
        mut frames_rx: mpsc::Receiver<TouchFrame>,
        driver: Arc<dyn Driver>,
        state_tx: watch::Sender<InstrumentState>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> Instrument {
        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);
        let mut events_open = true;
        let (index_tx, mut index_rx) = mpsc::channel(1);
        let mut rescan = Rescan {
            latest: 0,
            index_tx,
        };

        if instrument.is_powered() {
            normalizer.start();
        }
        let mut load_tick = tokio::time::interval(LOAD_POLL_INTERVAL);

        info!(
            powered = instrument.is_powered(),
            samples = instrument.index().len(),
            "Controller started."
        );

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Controller shutting down.");
                    break;
                }
                event = events_rx.recv(), if events_open => match event {
                    Some(event) => {
                        info!(event = format!("{:?}", event), "Received event.");
                        Controller::handle_event(
                            &mut instrument,
                            &mut normalizer,
                            &mut frames_rx,
                            &mut rescan,
                            event,
                        );
                        state_tx.send_replace(InstrumentState::of(&instrument));
                    }
                    None => {
                        info!("Controller events closed.");
                        events_open = false;
                    }
                },
                frame = frames_rx.recv() => {
                    let Some(frame) = frame else {
                        break;
                    };
                    let effects = instrument.process_touch_frame(&frame);
                    for trigger in &effects.triggers {
                        debug!(
                            pad = %trigger.pad,
                            touch = %trigger.touch,
                            velocity = trigger.velocity,
                            "Triggered pad"
                        );
                    }
                    if !effects.changes.is_empty() {
                        state_tx.send_replace(InstrumentState::of(&instrument));
                    }
                }
                Some((reload, index)) = index_rx.recv() => {
                    if reload == rescan.latest {
                        instrument.install_index(Arc::new(index));
                        state_tx.send_replace(InstrumentState::of(&instrument));
                    } else {
                        debug!(reload, latest = rescan.latest, "Dropped superseded rescan");
                    }
                }
                _ = load_tick.tick() => {
                    if instrument.apply_completed_loads() > 0 {
                        state_tx.send_replace(InstrumentState::of(&instrument));
                    }
                }
            }
        }

        normalizer.stop();
        if !events_open {
            match join_handle.await {
                Ok(Err(e)) => error!("Controller driver failed: {}", e),
                Err(e) => error!("Error waiting for event monitor to stop: {}", e),
                Ok(Ok(())) => {}
            }
        }
        instrument
    }

    fn handle_event(
        instrument: &mut Instrument,
        normalizer: &mut TouchNormalizer,
        frames_rx: &mut mpsc::Receiver<TouchFrame>,
        rescan: &mut Rescan,
        event: Event,
    ) {
        match event {
            Event::Randomize => {
                instrument.randomize_samples(&mut rand::thread_rng());
            }
            Event::Reload => rescan.start(instrument),
            Event::Layout => instrument.generate_layout(),
            Event::Power => {
                if instrument.toggle_power() {
                    normalizer.start();
                } else {
                    normalizer.stop();
                    // Frames published before the stop belong to the old session.
                    while frames_rx.try_recv().is_ok() {}
                }
            }
        }
    }
}
