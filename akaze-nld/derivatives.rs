use akaze_core::GrayFloatImage;
use rayon::prelude::*;

/// Scharr derivative filters at an arbitrary integer scale.
///
/// For scale s the separable kernels are a three-tap central difference
/// [-1, 0, 1] at offsets +/-s along the derivative axis and a smoothing tap
/// [norm, w*norm, norm] at offsets +/-s across it, with w = 10/3 and
/// norm = 1 / (2*s*(w + 2)). Scale 1 reduces to the standard Scharr filter.
pub fn scharr_horizontal(img: &GrayFloatImage, scale: u32) -> GrayFloatImage {
    let smoothed = smooth_pass(img, scale, false);
    derivative_pass(&smoothed, scale, true)
}

pub fn scharr_vertical(img: &GrayFloatImage, scale: u32) -> GrayFloatImage {
    let smoothed = smooth_pass(img, scale, true);
    derivative_pass(&smoothed, scale, false)
}

fn smooth_weights(scale: u32) -> (f32, f32) {
    let w = 10.0f32 / 3.0;
    let norm = 1.0 / (2.0 * scale as f32 * (w + 2.0));
    (norm, w * norm)
}

/// Three-tap smoothing at offsets +/-scale, horizontal or vertical
fn smooth_pass(img: &GrayFloatImage, scale: u32, horizontal: bool) -> GrayFloatImage {
    let (side, center) = smooth_weights(scale);
    let s = scale as i64;
    let width = img.width();
    let mut out = GrayFloatImage::new(width, img.height());
    out.buffer_mut()
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                let (x, y) = (x as i64, y as i64);
                let (a, b) = if horizontal {
                    (img.get_clamped(x - s, y), img.get_clamped(x + s, y))
                } else {
                    (img.get_clamped(x, y - s), img.get_clamped(x, y + s))
                };
                *px = side * (a + b) + center * img.get_clamped(x, y);
            }
        });
    out
}

/// Central difference at offsets +/-scale, horizontal or vertical
fn derivative_pass(img: &GrayFloatImage, scale: u32, horizontal: bool) -> GrayFloatImage {
    let s = scale as i64;
    let width = img.width();
    let mut out = GrayFloatImage::new(width, img.height());
    out.buffer_mut()
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                let (x, y) = (x as i64, y as i64);
                *px = if horizontal {
                    img.get_clamped(x + s, y) - img.get_clamped(x - s, y)
                } else {
                    img.get_clamped(x, y + s) - img.get_clamped(x, y - s)
                };
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_x(width: usize, height: usize, slope: f32) -> GrayFloatImage {
        let mut img = GrayFloatImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.put(x, y, slope * x as f32);
            }
        }
        img
    }

    #[test]
    fn test_horizontal_derivative_of_ramp() {
        let img = ramp_x(16, 16, 0.1);
        let lx = scharr_horizontal(&img, 1);
        // Away from the clamped borders the response of a linear ramp is
        // exactly twice the per-pixel slope (central difference span 2).
        for y in 2..14 {
            for x in 2..14 {
                assert!((lx.get(x, y) - 0.2).abs() < 1e-5, "at ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_vertical_derivative_of_x_ramp_is_zero() {
        let img = ramp_x(16, 16, 0.1);
        let ly = scharr_vertical(&img, 1);
        for y in 2..14 {
            for x in 2..14 {
                assert!(ly.get(x, y).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_scaled_derivative_of_ramp() {
        let img = ramp_x(32, 32, 0.05);
        let lx = scharr_horizontal(&img, 3);
        // Span is 2*scale pixels
        for y in 8..24 {
            for x in 8..24 {
                assert!((lx.get(x, y) - 0.3).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_constant_image_has_zero_derivatives() {
        let mut img = GrayFloatImage::new(12, 12);
        for v in img.buffer_mut() {
            *v = 0.7;
        }
        let lx = scharr_horizontal(&img, 2);
        let ly = scharr_vertical(&img, 2);
        for i in 0..lx.buffer().len() {
            assert!(lx.buffer()[i].abs() < 1e-6);
            assert!(ly.buffer()[i].abs() < 1e-6);
        }
    }
}
