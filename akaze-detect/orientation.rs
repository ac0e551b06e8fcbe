use akaze_core::Keypoint;
use akaze_nld::ScaleSpace;
use rayon::prelude::*;

const ORIENTATION_BINS: usize = 36;

/// Assign a dominant orientation to every keypoint.
///
/// Gradients from the keypoint's own level are accumulated into a direction
/// histogram over a circular neighborhood of radius six times the keypoint's
/// derivative scale, each sample weighted by a Gaussian falloff and its
/// gradient magnitude. The angle is the vector sum of the single bin with
/// strictly greatest weight; on an exact tie the first such bin in scan
/// order wins.
pub fn compute_orientations(scale_space: &ScaleSpace, keypoints: &mut [Keypoint]) {
    keypoints
        .par_iter_mut()
        .for_each(|keypoint| keypoint.angle = dominant_orientation(scale_space, keypoint));
}

fn dominant_orientation(scale_space: &ScaleSpace, keypoint: &Keypoint) -> f32 {
    let level = &scale_space.levels()[keypoint.class_id];
    let ratio = level.ratio();
    let scale = (0.5 * keypoint.size / ratio).round().max(1.0);
    let xf = keypoint.x / ratio;
    let yf = keypoint.y / ratio;
    let falloff = 2.0 * (2.5 * scale) * (2.5 * scale);

    let mut weight = [0.0f32; ORIENTATION_BINS];
    let mut sum_x = [0.0f32; ORIENTATION_BINS];
    let mut sum_y = [0.0f32; ORIENTATION_BINS];
    for j in -6i32..=6 {
        for i in -6i32..=6 {
            if i * i + j * j >= 36 {
                continue;
            }
            let sx = (xf + i as f32 * scale).round() as i64;
            let sy = (yf + j as f32 * scale).round() as i64;
            let gx = level.lx.get_clamped(sx, sy);
            let gy = level.ly.get_clamped(sx, sy);
            let magnitude = (gx * gx + gy * gy).sqrt();
            if magnitude <= 0.0 {
                continue;
            }
            let distance2 = ((i * i + j * j) as f32) * scale * scale;
            let gauss = (-distance2 / falloff).exp();

            let angle = gy.atan2(gx);
            let turn = (angle + std::f32::consts::PI) / (2.0 * std::f32::consts::PI);
            let bin = ((turn * ORIENTATION_BINS as f32) as usize).min(ORIENTATION_BINS - 1);
            weight[bin] += gauss * magnitude;
            sum_x[bin] += gauss * gx;
            sum_y[bin] += gauss * gy;
        }
    }

    let mut best = 0usize;
    for bin in 1..ORIENTATION_BINS {
        if weight[bin] > weight[best] {
            best = bin;
        }
    }
    if weight[best] <= 0.0 {
        return 0.0;
    }
    sum_y[best].atan2(sum_x[best])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::compute_detector_response;
    use akaze_core::{AkazeConfig, GrayFloatImage};
    use akaze_nld::build_scale_space;

    fn ramp_image(width: usize, height: usize, gx: f32, gy: f32) -> GrayFloatImage {
        let mut img = GrayFloatImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.put(x, y, 0.5 + gx * x as f32 + gy * y as f32);
            }
        }
        img
    }

    fn orientation_on(img: &GrayFloatImage, x: f32, y: f32) -> f32 {
        let config = AkazeConfig::new(img.width(), img.height());
        let mut scale_space = build_scale_space(img, &config).unwrap();
        compute_detector_response(&mut scale_space);
        let mut keypoints = vec![Keypoint {
            x,
            y,
            size: 3.2,
            angle: 0.0,
            response: 1.0,
            octave: 0,
            class_id: 0,
        }];
        compute_orientations(&scale_space, &mut keypoints);
        keypoints[0].angle
    }

    #[test]
    fn test_horizontal_ramp_points_along_x() {
        let img = ramp_image(64, 64, 0.005, 0.0);
        let angle = orientation_on(&img, 32.0, 32.0);
        assert!(angle.abs() < 0.2, "angle {} not along +x", angle);
    }

    #[test]
    fn test_vertical_ramp_points_along_y() {
        let img = ramp_image(64, 64, 0.0, 0.005);
        let angle = orientation_on(&img, 32.0, 32.0);
        assert!(
            (angle - std::f32::consts::FRAC_PI_2).abs() < 0.2,
            "angle {} not along +y",
            angle
        );
    }

    #[test]
    fn test_flat_region_yields_zero_angle() {
        let img = ramp_image(64, 64, 0.0, 0.0);
        let angle = orientation_on(&img, 32.0, 32.0);
        assert_eq!(angle, 0.0);
    }
}
