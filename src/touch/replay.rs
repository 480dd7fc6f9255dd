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
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::RawTouch;
use crate::cancel::CancelHandle;

/// Replays frames recorded as JSON lines. Each line holds one frame: an array of raw touches,
/// e.g. [{"id":1,"x":0.1,"y":0.9,"pressure":0.5,"state":"active"}]. Blank lines are skipped.
pub struct Driver {
    path: PathBuf,
    frame_interval: Duration,
    looping: bool,
}

/// How a pass over the recording ended.
#[derive(Debug, PartialEq)]
enum Replay {
    /// Reached the end of the recording after sending this many frames.
    Finished(usize),
    Stopped,
}

impl Driver {
    pub fn new(path: PathBuf, frame_interval: Duration, looping: bool) -> Driver {
        Driver {
            path,
            frame_interval,
            looping,
        }
    }

    /// Parses one line of a recording. Returns None for blank lines.
    fn parse_line(line: &str) -> Result<Option<Vec<RawTouch>>, serde_json::Error> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(line).map(Some)
    }

    fn monitor_io<R>(
        frames_tx: &Sender<Vec<RawTouch>>,
        reader: R,
        frame_interval: Duration,
        cancel: &CancelHandle,
    ) -> Result<Replay, io::Error>
    where
        R: BufRead,
    {
        let mut sent = 0;
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let frame = match Self::parse_line(&line) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    warn!(line = number + 1, err = %e, "Skipping malformed touch frame");
                    continue;
                }
            };

            if cancel.is_cancelled() || frames_tx.blocking_send(frame).is_err() {
                return Ok(Replay::Stopped);
            }
            sent += 1;
            if !frame_interval.is_zero() && cancel.wait_timeout(frame_interval) {
                return Ok(Replay::Stopped);
            }
        }
        Ok(Replay::Finished(sent))
    }
}

impl super::Driver for Driver {
    fn monitor_touches(
        &self,
        frames_tx: Sender<Vec<RawTouch>>,
        cancel: CancelHandle,
    ) -> JoinHandle<Result<(), io::Error>> {
        let path = self.path.clone();
        let frame_interval = self.frame_interval;
        let looping = self.looping;

        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "replay touch driver");
            let _enter = span.enter();

            info!(path = ?path, looping, "Replay touch driver started.");
            loop {
                let reader = BufReader::new(File::open(&path)?);
                let replay = Self::monitor_io(&frames_tx, reader, frame_interval, &cancel)?;
                if !looping || !matches!(replay, Replay::Finished(sent) if sent > 0) {
                    info!(path = ?path, "Replay touch driver finished.");
                    return Ok(());
                }
            }
        })
    }
}
