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

/// Remaps planar audio to the given number of output channels.
///
/// - Same channel count: unchanged.
/// - Mono output: all source channels are averaged.
/// - Mono source: the channel is copied to every output.
/// - Fewer source channels than outputs: outputs cycle through the sources (L R L R ...).
/// - More source channels than outputs: the extra source channels are dropped.
pub fn remap_channels(planar: Vec<Vec<f32>>, target_channels: u16) -> Vec<Vec<f32>> {
    let source_channels = planar.len();
    let target = target_channels as usize;
    if source_channels == target || source_channels == 0 || target == 0 {
        return planar;
    }

    let frames = planar[0].len();
    if target == 1 {
        let scale = 1.0 / source_channels as f32;
        let mixed = (0..frames)
            .map(|frame| planar.iter().map(|ch| ch[frame]).sum::<f32>() * scale)
            .collect();
        return vec![mixed];
    }

    (0..target)
        .map(|out_ch| planar[out_ch % source_channels].clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_to_stereo() {
        let out = remap_channels(vec![vec![0.1, 0.2]], 2);
        assert_eq!(out, vec![vec![0.1, 0.2], vec![0.1, 0.2]]);
    }

    #[test]
    fn test_stereo_to_mono() {
        let out = remap_channels(vec![vec![1.0, 0.0], vec![0.0, 1.0]], 1);
        assert_eq!(out, vec![vec![0.5, 0.5]]);
    }

    #[test]
    fn test_stereo_to_quad_and_back() {
        let stereo = vec![vec![1.0], vec![-1.0]];
        let quad = remap_channels(stereo.clone(), 4);
        assert_eq!(quad, vec![vec![1.0], vec![-1.0], vec![1.0], vec![-1.0]]);
        assert_eq!(remap_channels(quad, 2), stereo);
    }
}
