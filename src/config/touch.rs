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
use std::{error::Error, path::PathBuf, sync::Arc, time::Duration};

use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::touch;

const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(8);

/// A YAML representation of the touch input configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Touch {
    /// The touch driver: "replay" or "mock" (default: "mock").
    driver: Option<String>,

    /// The recorded frames file for the replay driver.
    file: Option<PathBuf>,

    /// Time between replayed frames (default: 8ms).
    frame_interval: Option<String>,

    /// Whether the replay driver starts over at the end of the file.
    #[serde(rename = "loop")]
    looping: Option<bool>,

    /// Whether the hardware y axis points up and must be flipped (default: true).
    invert_y: Option<bool>,
}

impl Touch {
    /// Returns the configured driver name.
    pub fn driver_name(&self) -> &str {
        self.driver.as_deref().unwrap_or("mock")
    }

    /// Returns the time between replayed frames.
    pub fn frame_interval(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.frame_interval {
            Some(interval) => Ok(DurationString::from_string(interval.clone())?.into()),
            None => Ok(DEFAULT_FRAME_INTERVAL),
        }
    }

    pub fn looping(&self) -> bool {
        self.looping.unwrap_or(false)
    }

    pub fn invert_y(&self) -> bool {
        self.invert_y.unwrap_or(true)
    }

    /// Builds the configured touch driver.
    pub fn driver(&self) -> Result<Arc<dyn touch::Driver>, Box<dyn Error>> {
        match self.driver_name() {
            "replay" => {
                let file = self.file.clone().ok_or(ConfigError::Invalid {
                    field: "touch.file",
                    reason: "the replay driver needs a frames file".to_string(),
                })?;
                Ok(Arc::new(touch::replay::Driver::new(
                    file,
                    self.frame_interval()?,
                    self.looping(),
                )))
            }
            "mock" => Ok(Arc::new(touch::mock::Driver::new(Vec::new()))),
            other => Err(ConfigError::Invalid {
                field: "touch.driver",
                reason: format!("unknown touch driver {}", other),
            }
            .into()),
        }
    }
}
