//! Modified-Local-Difference-Binary (MLDB) descriptor extraction.
//!
//! Each keypoint gets a fixed-length bit string built from mean comparisons
//! over a rotated, scale-proportional patch sampled from the keypoint's own
//! scale-space level. The patch is divided into 2x2, 3x3 and 4x4 grids; for
//! every ordered pair of grid cells and every enabled channel one bit records
//! whether the first cell's mean exceeds the second's.

use akaze_core::{AkazeConfig, BinaryDescriptor, ConfigError, Keypoint};
use akaze_nld::{scharr_horizontal, scharr_vertical, ScaleSpace, ScaleSpaceLevel};
use log::debug;
use rayon::prelude::*;

/// Subdivision factors of the sampling patch. The pairwise comparisons per
/// grid are 6, 36 and 120, so a full descriptor holds 162 bits per channel.
const GRID_DIVISIONS: [usize; 3] = [2, 3, 4];

/// Pairwise comparisons offered by the full comparison pattern, per channel
pub const PAIRS_PER_CHANNEL: usize = 6 + 36 + 120;

const MAX_CHANNELS: usize = 3;

/// MLDB extractor configured once per run.
///
/// Pure over its inputs: the same scale space, keypoints and configuration
/// always produce identical descriptors, in keypoint order.
#[derive(Debug, Clone)]
pub struct MldbExtractor {
    channels: usize,
    bit_len: usize,
    pattern_size: usize,
}

impl MldbExtractor {
    /// Build an extractor from the configuration.
    ///
    /// A `descriptor_size` of zero selects the full pattern length; a
    /// request beyond what the pattern offers is clamped down to it.
    pub fn new(config: &AkazeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let full = PAIRS_PER_CHANNEL * config.descriptor_channels;
        let bit_len = if config.descriptor_size == 0 {
            full
        } else {
            config.descriptor_size.min(full)
        };
        Ok(Self {
            channels: config.descriptor_channels,
            bit_len,
            pattern_size: config.descriptor_pattern_size,
        })
    }

    /// Descriptor length in bits
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Compute one descriptor per keypoint, in keypoint order.
    ///
    /// Gradient channels read the level's `lx`/`ly` images; call
    /// [`compute_descriptors`] or run the detector first so they are filled.
    pub fn describe(
        &self,
        scale_space: &ScaleSpace,
        keypoints: &[Keypoint],
    ) -> Vec<BinaryDescriptor> {
        keypoints
            .par_iter()
            .map(|keypoint| self.describe_one(scale_space, keypoint))
            .collect()
    }

    fn describe_one(&self, scale_space: &ScaleSpace, keypoint: &Keypoint) -> BinaryDescriptor {
        let level = &scale_space.levels()[keypoint.class_id];
        let ratio = level.ratio();
        let scale = (0.5 * keypoint.size / ratio).round().max(1.0);
        let xf = keypoint.x / ratio;
        let yf = keypoint.y / ratio;
        let (si, co) = keypoint.angle.sin_cos();

        let mut descriptor = BinaryDescriptor::zeroed(self.bit_len);
        let mut bit = 0usize;
        'pattern: for &grid in &GRID_DIVISIONS {
            let means = self.cell_means(level, xf, yf, scale, co, si, grid);
            let cells = grid * grid;
            for channel in 0..self.channels {
                for first in 0..cells {
                    for second in first + 1..cells {
                        if bit >= self.bit_len {
                            break 'pattern;
                        }
                        if means[first][channel] > means[second][channel] {
                            descriptor.set_bit(bit);
                        }
                        bit += 1;
                    }
                }
            }
        }
        descriptor
    }

    /// Per-channel mean over each cell of a `grid`x`grid` subdivision of the
    /// rotated sampling patch.
    ///
    /// Channel 0 is intensity. With two channels the second is gradient
    /// magnitude; with three, channels 1 and 2 are the gradient projected
    /// onto the patch's rotated x and y axes.
    fn cell_means(
        &self,
        level: &ScaleSpaceLevel,
        xf: f32,
        yf: f32,
        scale: f32,
        co: f32,
        si: f32,
        grid: usize,
    ) -> Vec<[f32; MAX_CHANNELS]> {
        let pattern = self.pattern_size as i32;
        let step = (2 * self.pattern_size).div_ceil(grid) as i32;
        let mut means = vec![[0.0f32; MAX_CHANNELS]; grid * grid];

        for (cell_y, y0) in (-pattern..pattern).step_by(step as usize).enumerate() {
            for (cell_x, x0) in (-pattern..pattern).step_by(step as usize).enumerate() {
                let mut sums = [0.0f32; MAX_CHANNELS];
                let mut count = 0u32;
                for l in y0..(y0 + step).min(pattern) {
                    for k in x0..(x0 + step).min(pattern) {
                        let sample_x = xf + (k as f32 * co - l as f32 * si) * scale;
                        let sample_y = yf + (k as f32 * si + l as f32 * co) * scale;
                        let sx = sample_x.round() as i64;
                        let sy = sample_y.round() as i64;
                        sums[0] += level.lt.get_clamped(sx, sy);
                        if self.channels > 1 {
                            let gx = level.lx.get_clamped(sx, sy);
                            let gy = level.ly.get_clamped(sx, sy);
                            if self.channels == 2 {
                                sums[1] += (gx * gx + gy * gy).sqrt();
                            } else {
                                sums[1] += gx * co + gy * si;
                                sums[2] += gy * co - gx * si;
                            }
                        }
                        count += 1;
                    }
                }
                let mean = &mut means[cell_y * grid + cell_x];
                for channel in 0..MAX_CHANNELS {
                    mean[channel] = sums[channel] / count as f32;
                }
            }
        }
        means
    }
}

/// Extract descriptors for a keypoint sequence.
///
/// Fills any missing first-order derivative images before sampling, so this
/// works on a scale space whether or not the detector ran on it.
pub fn compute_descriptors(
    scale_space: &mut ScaleSpace,
    keypoints: &[Keypoint],
    config: &AkazeConfig,
) -> Result<Vec<BinaryDescriptor>, ConfigError> {
    let extractor = MldbExtractor::new(config)?;
    if config.descriptor_channels > 1 {
        ensure_gradients(scale_space);
    }
    debug!(
        "Extracting {}-bit descriptors for {} keypoints",
        extractor.bit_len(),
        keypoints.len()
    );
    Ok(extractor.describe(scale_space, keypoints))
}

fn ensure_gradients(scale_space: &mut ScaleSpace) {
    scale_space.levels_mut().par_iter_mut().for_each(|level| {
        if level.lx.is_empty() {
            level.lx = scharr_horizontal(&level.lsmooth, level.sigma_size);
            level.ly = scharr_vertical(&level.lsmooth, level.sigma_size);
        }
    });
}
