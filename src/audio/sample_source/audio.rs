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
use std::path::Path;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use super::error::DecodeError;
use super::traits::SampleSource;

/// A sample source that decodes audio files (WAV, AIFF, MP3, etc.) with symphonia and
/// provides planar f32 samples scaled to [-1, 1].
pub struct AudioSampleSource {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    is_finished: bool,
    /// Decoded planar samples that haven't been handed out yet.
    pending: Vec<Vec<f32>>,
    /// Read position (in frames) into pending.
    pending_pos: usize,
    channels: u16,
    sample_rate: u32,
    n_frames: Option<u64>,
}

impl SampleSource for AudioSampleSource {
    fn next_chunk(
        &mut self,
        output: &mut [Vec<f32>],
        max_frames: usize,
    ) -> Result<usize, DecodeError> {
        let num_channels = self.channels as usize;
        if output.len() != num_channels {
            return Err(DecodeError::Unplayable(format!(
                "Output has {} channels, expected {}",
                output.len(),
                num_channels
            )));
        }

        for ch in output.iter_mut() {
            ch.clear();
        }

        let mut written = 0;
        while written < max_frames {
            let available = self.pending_frames().saturating_sub(self.pending_pos);
            if available == 0 {
                if self.is_finished || !self.refill()? {
                    self.is_finished = true;
                    break;
                }
                continue;
            }

            let to_copy = available.min(max_frames - written);
            for (out_ch, pending_ch) in output.iter_mut().zip(self.pending.iter()) {
                out_ch.extend_from_slice(&pending_ch[self.pending_pos..self.pending_pos + to_copy]);
            }
            self.pending_pos += to_copy;
            written += to_copy;
        }

        Ok(written)
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frames_hint(&self) -> Option<u64> {
        self.n_frames
    }
}

impl AudioSampleSource {
    /// Opens and probes an audio file. Supports every format symphonia was built with.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DecodeError> {
        // Include the path in errors so the log shows which pad file failed.
        let path_ref = path.as_ref();
        let file_path = path_ref.to_string_lossy().to_string();
        let file = File::open(path_ref).map_err(|e| {
            DecodeError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path_ref.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path_ref.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| DecodeError::Unplayable(format!("'{}': {}", file_path, e)))?;

        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                DecodeError::Unplayable(format!("'{}': no audio track found", file_path))
            })?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| {
                DecodeError::Unplayable(format!("'{}': sample rate not specified", file_path))
            })?;

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder = get_codecs()
            .make(&params, &decoder_opts)
            .map_err(|e| DecodeError::Unplayable(format!("'{}': {}", file_path, e)))?;

        // Prefer container metadata for the channel count. Some MP3s don't carry it, so in
        // that case decode the first packet and take the count from the decoded buffer.
        let (channels, pending) = match params.channels.map(|c| c.count() as u16) {
            Some(channels) if channels > 0 => (channels, vec![Vec::new(); channels as usize]),
            _ => match Self::decode_next_packet(
                format_reader.as_mut(),
                decoder.as_mut(),
                track_id,
            )? {
                Some(planar) => (planar.len() as u16, planar),
                None => return Err(DecodeError::Empty(file_path)),
            },
        };

        Ok(Self {
            format_reader,
            decoder,
            track_id,
            is_finished: false,
            pending,
            pending_pos: 0,
            channels,
            sample_rate,
            n_frames: params.n_frames,
        })
    }

    fn pending_frames(&self) -> usize {
        self.pending.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Replaces the pending buffer with the next decoded packet. Returns false at EOF.
    fn refill(&mut self) -> Result<bool, DecodeError> {
        match Self::decode_next_packet(
            self.format_reader.as_mut(),
            self.decoder.as_mut(),
            self.track_id,
        )? {
            Some(planar) => {
                if planar.len() != self.channels as usize {
                    return Err(DecodeError::Unplayable(format!(
                        "channel count changed mid-stream: {} -> {}",
                        self.channels,
                        planar.len()
                    )));
                }
                self.pending = planar;
                self.pending_pos = 0;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reads the next packet with common error handling.
    /// Returns `Ok(None)` at the end of the stream. ResetRequired is propagated so the
    /// caller can reset the decoder.
    fn read_next_packet(
        format_reader: &mut dyn FormatReader,
    ) -> Result<Option<Packet>, DecodeError> {
        match format_reader.next_packet() {
            Ok(packet) => Ok(Some(packet)),
            Err(SymphoniaError::ResetRequired) => {
                Err(DecodeError::Codec(SymphoniaError::ResetRequired))
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(None)
            }
            // Some demuxers report a malformed packet at EOF instead of an io error.
            Err(SymphoniaError::DecodeError(_)) => Ok(None),
            Err(e) => Err(DecodeError::Codec(e)),
        }
    }

    /// Reads and decodes packets for the given track until one yields audio.
    fn decode_next_packet(
        format_reader: &mut dyn FormatReader,
        decoder: &mut dyn Decoder,
        track_id: u32,
    ) -> Result<Option<Vec<Vec<f32>>>, DecodeError> {
        loop {
            let packet = match Self::read_next_packet(format_reader) {
                Ok(Some(packet)) => packet,
                Ok(None) => return Ok(None),
                Err(DecodeError::Codec(SymphoniaError::ResetRequired)) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e),
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    decoder.decode(&packet)?
                }
                // A corrupt packet in the middle of a file is skipped rather than
                // failing the whole pad.
                Err(SymphoniaError::DecodeError(_)) => continue,
                Err(e) => return Err(DecodeError::Codec(e)),
            };
            let planar = Self::decode_buffer_to_planar(decoded);
            if !planar.is_empty() && planar.iter().any(|ch| !ch.is_empty()) {
                return Ok(Some(planar));
            }
        }
    }

    /// Converts a decoded AudioBufferRef into planar f32 samples.
    fn decode_buffer_to_planar(decoded: AudioBufferRef) -> Vec<Vec<f32>> {
        match decoded {
            AudioBufferRef::F32(buf) => Self::convert_planes(&buf, |sample| sample),
            AudioBufferRef::F64(buf) => Self::convert_planes(&buf, |sample| sample as f32),
            AudioBufferRef::S8(buf) => Self::convert_planes(&buf, Self::scale_s8),
            AudioBufferRef::S16(buf) => Self::convert_planes(&buf, Self::scale_s16),
            AudioBufferRef::S24(buf) => {
                Self::convert_planes(&buf, |sample| Self::scale_s24(sample.inner()))
            }
            AudioBufferRef::S32(buf) => Self::convert_planes(&buf, Self::scale_s32),
            AudioBufferRef::U8(buf) => Self::convert_planes(&buf, Self::scale_u8),
            AudioBufferRef::U16(buf) => Self::convert_planes(&buf, Self::scale_u16),
            AudioBufferRef::U24(buf) => {
                Self::convert_planes(&buf, |sample| Self::scale_u24(sample.inner()))
            }
            AudioBufferRef::U32(buf) => Self::convert_planes(&buf, Self::scale_u32),
        }
    }

    fn convert_planes<T, F>(buf: &AudioBuffer<T>, convert: F) -> Vec<Vec<f32>>
    where
        T: symphonia::core::sample::Sample,
        F: Fn(T) -> f32,
    {
        let frames = buf.frames();
        let channels = buf.spec().channels.count();
        (0..channels)
            .map(|ch| buf.chan(ch)[..frames].iter().map(|s| convert(*s)).collect())
            .collect()
    }

    #[inline]
    pub(crate) fn scale_s8(sample: i8) -> f32 {
        sample as f32 / (1i64 << 7) as f32
    }

    #[inline]
    pub(crate) fn scale_s16(sample: i16) -> f32 {
        sample as f32 / (1i64 << 15) as f32
    }

    #[inline]
    pub(crate) fn scale_s24(sample: i32) -> f32 {
        sample as f32 / (1i64 << 23) as f32
    }

    #[inline]
    pub(crate) fn scale_s32(sample: i32) -> f32 {
        sample as f32 / (1i64 << 31) as f32
    }

    #[inline]
    pub(crate) fn scale_u8(sample: u8) -> f32 {
        (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u16(sample: u16) -> f32 {
        (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u24(sample: u32) -> f32 {
        let max = (1u32 << 24) - 1;
        (sample as f32 / max as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u32(sample: u32) -> f32 {
        (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}
