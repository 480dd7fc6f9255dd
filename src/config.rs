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
use std::path::{Path, PathBuf};

use ::config::{Environment, File};
use serde::Deserialize;

mod audio;
mod error;
mod touch;

pub use self::audio::Audio;
pub use self::error::ConfigError;
pub use self::touch::Touch;

/// Prefix for environment overrides, e.g. PADKIT__AUDIO__DEVICE=mock.
const ENV_PREFIX: &str = "PADKIT";

/// The top level instrument configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    /// Root of the sample tree. Each directory's name is the category of the files in it.
    samples: PathBuf,

    #[serde(default)]
    audio: Audio,

    #[serde(default)]
    touch: Touch,
}

impl Config {
    /// Loads the configuration from the given YAML file, applying environment overrides.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let config = ::config::Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Creates a configuration in code.
    pub fn new(samples: PathBuf, audio: Audio, touch: Touch) -> Config {
        Config {
            samples,
            audio,
            touch,
        }
    }

    pub fn samples(&self) -> &Path {
        &self.samples
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn touch(&self) -> &Touch {
        &self.touch
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padkit.yaml");
        fs::write(
            &path,
            r#"
samples: /srv/samples/drums
audio:
  device: mock-device
  sample_rate: 48000
touch:
  driver: replay
  file: frames.jsonl
  frame_interval: 4ms
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.samples(), Path::new("/srv/samples/drums"));
        assert_eq!(config.audio().device(), "mock-device");
        assert_eq!(config.audio().sample_rate(), 48000);
        assert_eq!(config.audio().channels(), 2);
        assert_eq!(config.touch().driver_name(), "replay");
    }

    #[test]
    fn test_load_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padkit.yml");
        fs::write(&path, "samples: drums\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.samples(), Path::new("drums"));
        assert_eq!(config.audio().device(), "default");
        assert_eq!(config.touch().driver_name(), "mock");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/padkit.yaml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
