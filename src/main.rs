// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use padkit::controller::{keyboard, Controller};
use padkit::instrument::Instrument;
use padkit::samples::{SampleEngine, SampleIndex, SampleIndexer};
use padkit::touch::{grid, TouchNormalizer};
use padkit::{audio, config, layout};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A pressure sensitive drum pad instrument."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the sample categories and files found under the given directory.
    Index {
        /// The path to the sample directory.
        path: String,
    },
    /// Prints the pad layout the given sample directory produces.
    Layout {
        /// The path to the sample directory.
        path: String,
    },
    /// Prints the pad under a point of the unit square, origin top left.
    HitTest {
        /// The horizontal coordinate, 0 is the left edge.
        x: f32,
        /// The vertical coordinate, 0 is the top edge.
        y: f32,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Start will start the instrument.
    Start {
        /// The path to the instrument config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index { path } => {
            let index = SampleIndex::scan(&PathBuf::from(&path));

            if index.is_empty() {
                println!("No samples found in {}.", path);
                return Ok(());
            }

            println!("Samples (count: {}):", index.len());
            for category in index.categories() {
                let files = index.get(category).unwrap_or_default();
                println!("- {} ({})", category, files.len());
                for file in files {
                    println!("  - {}", file.display_name);
                }
            }
        }
        Commands::Layout { path } => {
            let index = SampleIndex::scan(&PathBuf::from(&path));
            for pad in layout::generate(&index) {
                let sample = pad
                    .sample
                    .as_ref()
                    .map(|sample| sample.display_name.as_str())
                    .unwrap_or("(silent)");
                println!(
                    "{:>2} {:<12} {:<7} {}",
                    pad.id.to_string(),
                    pad.name,
                    pad.color.as_str(),
                    sample
                );
            }
        }
        Commands::HitTest { x, y } => match grid::hit_test(x, y) {
            Some(id) => println!("{}", id),
            None => println!("No pad at ({}, {})", x, y),
        },
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Start { config_path } => {
            let config = config::Config::load(&PathBuf::from(&config_path))?;

            let device = audio::get_device(config.audio())?;
            let engine = SampleEngine::new(device, config.audio().load_threads())?;
            let instrument = Instrument::new(
                SampleIndexer::new(config.samples().to_path_buf()),
                engine,
            );
            let (normalizer, frames_rx) =
                TouchNormalizer::new(config.touch().driver()?, config.touch().invert_y());

            let mut controller = Controller::new(
                instrument,
                normalizer,
                frames_rx,
                Arc::new(keyboard::Driver::new()),
            );

            tokio::signal::ctrl_c().await?;
            info!("Interrupted, shutting down.");
            controller.shutdown();
            controller.join().await?;

            // The keyboard driver may still be blocked on stdin.
            std::process::exit(0);
        }
    }

    Ok(())
}
