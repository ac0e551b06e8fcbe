use crate::derivatives::{scharr_horizontal, scharr_vertical};
use akaze_core::{AkazeConfig, GrayFloatImage};
use log::debug;

/// Fallback contrast factor for near-constant images. Keeps the diffusivity
/// well defined when there is no gradient energy to estimate from.
pub const CONTRAST_FLOOR: f64 = 0.03;

/// Estimate the edge contrast factor k from the gradient magnitude histogram.
///
/// The image is pre-smoothed with `derivative_smoothing`, gradients are taken
/// with the Scharr filter, and k is the magnitude below which
/// `contrast_percentile` of the nonzero-gradient pixels fall. Pure function;
/// degenerate images yield [`CONTRAST_FLOOR`] instead of an error.
pub fn compute_contrast_factor(image: &GrayFloatImage, config: &AkazeConfig) -> f64 {
    let smoothed = image.gaussian_blur(config.derivative_smoothing as f32);
    let lx = scharr_horizontal(&smoothed, 1);
    let ly = scharr_vertical(&smoothed, 1);

    let width = image.width();
    let height = image.height();
    if width < 3 || height < 3 {
        return CONTRAST_FLOOR;
    }

    // Maximum magnitude over the interior fixes the histogram range
    let mut max_magnitude = 0.0f64;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = lx.get(x, y) as f64;
            let gy = ly.get(x, y) as f64;
            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude > max_magnitude {
                max_magnitude = magnitude;
            }
        }
    }
    if max_magnitude <= f64::EPSILON {
        return CONTRAST_FLOOR;
    }

    let nbins = config.contrast_nbins;
    let mut histogram = vec![0usize; nbins];
    let mut total_points = 0usize;
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let gx = lx.get(x, y) as f64;
            let gy = ly.get(x, y) as f64;
            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude > 0.0 {
                let bin = ((magnitude / max_magnitude) * nbins as f64) as usize;
                histogram[bin.min(nbins - 1)] += 1;
                total_points += 1;
            }
        }
    }
    if total_points == 0 {
        return CONTRAST_FLOOR;
    }

    let threshold_points = (config.contrast_percentile * total_points as f64) as usize;
    let mut accumulated = 0usize;
    let mut bin = 0usize;
    while bin < nbins && accumulated < threshold_points {
        accumulated += histogram[bin];
        bin += 1;
    }
    let contrast = max_magnitude * bin as f64 / nbins as f64;
    debug!(
        "Contrast factor {} from {} gradient points (max magnitude {})",
        contrast, total_points, max_magnitude
    );
    if contrast > 0.0 {
        contrast
    } else {
        CONTRAST_FLOOR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_image_returns_floor() {
        let mut img = GrayFloatImage::new(64, 64);
        for v in img.buffer_mut() {
            *v = 0.42;
        }
        let config = AkazeConfig::new(64, 64);
        assert_eq!(compute_contrast_factor(&img, &config), CONTRAST_FLOOR);
    }

    #[test]
    fn test_tiny_image_returns_floor() {
        let img = GrayFloatImage::new(2, 2);
        let config = AkazeConfig::new(2, 2);
        assert_eq!(compute_contrast_factor(&img, &config), CONTRAST_FLOOR);
    }

    #[test]
    fn test_edge_image_returns_positive_contrast() {
        let mut img = GrayFloatImage::new(64, 64);
        for y in 0..64 {
            for x in 32..64 {
                img.put(x, y, 1.0);
            }
        }
        let config = AkazeConfig::new(64, 64);
        let k = compute_contrast_factor(&img, &config);
        assert!(k > 0.0);
        assert!(k.is_finite());
    }

    #[test]
    fn test_stronger_edges_raise_contrast() {
        let mut weak = GrayFloatImage::new(64, 64);
        let mut strong = GrayFloatImage::new(64, 64);
        for y in 0..64 {
            for x in 0..64 {
                let step = if x >= 32 { 1.0 } else { 0.0 };
                weak.put(x, y, 0.45 + 0.1 * step);
                strong.put(x, y, step);
            }
        }
        let config = AkazeConfig::new(64, 64);
        let k_weak = compute_contrast_factor(&weak, &config);
        let k_strong = compute_contrast_factor(&strong, &config);
        assert!(k_strong > k_weak);
    }
}
