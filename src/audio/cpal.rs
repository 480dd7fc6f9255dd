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
use std::{
    error::Error,
    fmt,
    sync::mpsc,
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{error, info, span, warn, Level};

use crate::audio::mixer::{ActiveSource, AudioMixer};
use crate::audio::{Device as AudioDevice, SampleFormat, SourceSender, TargetFormat};
use crate::cancel::CancelHandle;
use crate::config;

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The target format for this device.
    target_format: TargetFormat,
    /// The output stream manager. Only started for devices returned by get.
    output_manager: OutputManager,
}

/// Owns the mixer and the thread that keeps the cpal stream alive.
struct OutputManager {
    /// The core audio mixer
    mixer: AudioMixer,
    /// Channel for receiving new audio sources to play.
    source_tx: Sender<ActiveSource>,
    /// Channel receiver drained by the output callback.
    source_rx: Receiver<ActiveSource>,
    /// Stops the output thread.
    shutdown: CancelHandle,
    /// Handle to the output thread (keeps it alive).
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// Builds the stream callback. New voices are picked up at the start of every buffer, the
/// mix always runs in f32 and is converted to the stream's sample type afterwards.
fn create_callback<T>(
    mixer: AudioMixer,
    source_rx: Receiver<ActiveSource>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let num_channels = mixer.num_channels().max(1) as usize;
    let mut scratch: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        for source in source_rx.try_iter() {
            mixer.add_source(source);
        }

        if scratch.len() < data.len() {
            scratch.resize(data.len(), 0.0);
        }
        let frames = data.len() / num_channels;
        let scratch = &mut scratch[..data.len()];
        mixer.process_into_output(scratch, frames);

        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src.clamp(-1.0, 1.0));
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: AudioMixer,
    source_rx: Receiver<ActiveSource>,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device.build_output_stream(
        config,
        create_callback::<T>(mixer, source_rx),
        |err| error!(err = err.to_string(), "CPAL output stream error"),
        None,
    )
}

impl Drop for OutputManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

impl OutputManager {
    /// Creates a new output manager.
    fn new(num_channels: u16, sample_rate: u32) -> OutputManager {
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        OutputManager {
            mixer: AudioMixer::new(num_channels, sample_rate),
            source_tx,
            source_rx,
            shutdown: CancelHandle::new(),
            output_thread: None,
        }
    }

    /// Starts the output thread that creates and owns the cpal stream. Returns once the
    /// stream is playing or has failed to start.
    fn start_output_thread(
        &mut self,
        device: cpal::Device,
        target_format: TargetFormat,
    ) -> Result<(), Box<dyn Error>> {
        let mixer = self.mixer.clone();
        let source_rx = self.source_rx.clone();
        let shutdown = self.shutdown.clone();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), String>>();

        let output_thread = thread::spawn(move || {
            let span = span!(Level::INFO, "audio output");
            let _enter = span.enter();

            let config = cpal::StreamConfig {
                channels: target_format.channels,
                sample_rate: cpal::SampleRate(target_format.sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let stream_result = match (target_format.sample_format, target_format.bits_per_sample)
            {
                (SampleFormat::Float, _) => build_stream::<f32>(&device, &config, mixer, source_rx),
                (SampleFormat::Int, 16) => build_stream::<i16>(&device, &config, mixer, source_rx),
                (SampleFormat::Int, 32) => build_stream::<i32>(&device, &config, mixer, source_rx),
                (SampleFormat::Int, bits) => {
                    let _ = ready_tx.send(Err(format!("unsupported integer bit depth {}", bits)));
                    return;
                }
            };

            let stream = match stream_result {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("failed to create stream: {}", e)));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(format!("failed to start stream: {}", e)));
                return;
            }
            info!(format = %target_format, "CPAL output stream started");
            let _ = ready_tx.send(Ok(()));

            // Keep the stream alive until the device goes away.
            while !shutdown.wait_timeout(Duration::from_millis(100)) {}
            info!("CPAL output stream stopped");
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.output_thread = Some(output_thread);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = output_thread.join();
                Err(e.into())
            }
            Err(_) => Err("audio output thread exited unexpectedly".into()),
        }
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal output devices.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|output_config| output_config.channels())
                    .max()
                    .unwrap_or(0);
                if max_channels == 0 {
                    continue;
                }
                let Ok(name) = device.name() else {
                    continue;
                };

                let target_format = TargetFormat::default();
                devices.push(Device {
                    name,
                    max_channels,
                    host_id,
                    device,
                    output_manager: OutputManager::new(
                        target_format.channels,
                        target_format.sample_rate,
                    ),
                    target_format,
                });
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the cpal device with the configured name and starts its output stream. The name
    /// "default" selects the default output device of the default host.
    pub fn get(config: &config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device();
        let mut device = if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or("no default output device")?;
            let max_channels = device
                .supported_output_configs()?
                .map(|output_config| output_config.channels())
                .max()
                .unwrap_or(0);
            Device {
                name: device.name()?,
                max_channels,
                host_id: host.id(),
                device,
                target_format: TargetFormat::default(),
                output_manager: OutputManager::new(0, 0),
            }
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
                .ok_or_else(|| format!("no device found with name {}", name))?
        };

        let target_format = config.target_format()?;
        if target_format.channels > device.max_channels {
            warn!(
                device = device.name,
                requested = target_format.channels,
                max_channels = device.max_channels,
                "Device reports fewer channels than requested"
            );
        }

        let mut output_manager =
            OutputManager::new(target_format.channels, target_format.sample_rate);
        output_manager.start_output_thread(device.device.clone(), target_format.clone())?;

        device.output_manager = output_manager;
        device.target_format = target_format;
        Ok(device)
    }
}

impl AudioDevice for Device {
    fn target_format(&self) -> TargetFormat {
        self.target_format.clone()
    }

    fn source_sender(&self) -> SourceSender {
        self.output_manager.source_tx.clone()
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<std::sync::Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}
