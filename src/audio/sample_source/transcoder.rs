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
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use super::error::DecodeError;

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Upper bound on flush iterations once the input is exhausted.
const MAX_FLUSH_BLOCKS: usize = 64;

/// Resamples a whole planar buffer from one sample rate to another.
///
/// Pad samples are short one-shots that are held in memory anyway, so this works on the
/// complete buffer instead of streaming. The resampler's output delay is trimmed so the
/// result lines up with the input, and the result is exactly `ceil(frames * ratio)` frames.
pub fn resample_planar(
    input: &[Vec<f32>],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<Vec<f32>>, DecodeError> {
    let channels = input.len();
    let input_frames = input.first().map(|c| c.len()).unwrap_or(0);
    if source_rate == target_rate || channels == 0 || input_frames == 0 {
        return Ok(input.to_vec());
    }

    let failed = || DecodeError::Resample {
        from: source_rate,
        to: target_rate,
    };

    let ratio = target_rate as f64 / source_rate as f64;
    let expected_frames = (input_frames as f64 * ratio).ceil() as usize;

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_params, INPUT_BLOCK_SIZE, channels)
        .map_err(|_e| failed())?;

    let delay = resampler.output_delay();
    let wanted = delay + expected_frames;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(wanted); channels];
    let mut scratch = resampler.output_buffer_allocate(true);

    let push = |output: &mut Vec<Vec<f32>>, scratch: &[Vec<f32>], frames: usize| {
        for (dst, src) in output.iter_mut().zip(scratch.iter()) {
            dst.extend_from_slice(&src[..frames]);
        }
    };

    let mut position = 0;
    loop {
        let needed = resampler.input_frames_next();
        if input_frames - position < needed {
            break;
        }
        let window: Vec<&[f32]> = input
            .iter()
            .map(|ch| &ch[position..position + needed])
            .collect();
        let (consumed, produced) = resampler
            .process_into_buffer(&window, &mut scratch, None)
            .map_err(|_e| failed())?;
        push(&mut output, &scratch, produced);
        position += consumed;
    }

    if position < input_frames {
        let window: Vec<&[f32]> = input.iter().map(|ch| &ch[position..]).collect();
        let (_consumed, produced) = resampler
            .process_partial_into_buffer(Some(window.as_slice()), &mut scratch, None)
            .map_err(|_e| failed())?;
        push(&mut output, &scratch, produced);
    }

    // Flush the tail still held inside the filter.
    let mut flushes = 0;
    while output[0].len() < wanted && flushes < MAX_FLUSH_BLOCKS {
        let (_consumed, produced) = resampler
            .process_partial_into_buffer(None::<&[Vec<f32>]>, &mut scratch, None)
            .map_err(|_e| failed())?;
        push(&mut output, &scratch, produced);
        flushes += 1;
    }

    for ch in output.iter_mut() {
        ch.drain(..delay.min(ch.len()));
        ch.resize(expected_frames, 0.0);
    }

    debug!(
        source_rate,
        target_rate,
        input_frames,
        output_frames = expected_frames,
        "Resampled sample"
    );

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::audio_test_utils::calculate_rms;

    fn sine(frequency: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_same_rate_is_passthrough() {
        let input = vec![vec![0.1, 0.2, 0.3]];
        let output = resample_planar(&input, 48000, 48000).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_upsample_length() {
        let input = vec![sine(440.0, 44100, 4410)];
        let output = resample_planar(&input, 44100, 48000).unwrap();
        let expected_len = (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].len(), expected_len);
    }

    #[test]
    fn test_downsample_preserves_level() {
        let input = vec![sine(440.0, 48000, 9600), sine(880.0, 48000, 9600)];
        let output = resample_planar(&input, 48000, 44100).unwrap();
        assert_eq!(output.len(), 2);

        // A sine well below Nyquist should come out at roughly the same RMS. Skip the
        // edges where the filter ramps in and out.
        for (input_ch, output_ch) in input.iter().zip(output.iter()) {
            let len = output_ch.len();
            let in_rms = calculate_rms(&input_ch[1000..8000]);
            let out_rms = calculate_rms(&output_ch[1000..len - 1000]);
            assert!(
                (in_rms - out_rms).abs() < 0.05,
                "rms drifted: {} vs {}",
                in_rms,
                out_rms
            );
        }
    }

    #[test]
    fn test_short_input() {
        // Shorter than a single resampler block.
        let input = vec![vec![0.5; 100]];
        let output = resample_planar(&input, 22050, 44100).unwrap();
        assert_eq!(output[0].len(), 200);
    }
}
