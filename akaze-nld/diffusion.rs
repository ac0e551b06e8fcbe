use akaze_core::{Diffusivity, GrayFloatImage};
use rayon::prelude::*;

/// Per-pixel conductivity map from first-order derivatives and the contrast
/// factor
pub fn conductivity_map(
    lx: &GrayFloatImage,
    ly: &GrayFloatImage,
    contrast: f32,
    diffusivity: Diffusivity,
) -> GrayFloatImage {
    let width = lx.width();
    let mut out = GrayFloatImage::new(width, lx.height());
    out.buffer_mut()
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                *px = diffusivity.conductivity(lx.get(x, y), ly.get(x, y), contrast);
            }
        });
    out
}

/// One explicit diffusion substep of the given size.
///
/// Updates `image` by the discretized divergence of conductivity * gradient.
/// Clamped border sampling zeroes the flux across the image boundary, which
/// matches the one-sided border handling of the reference scheme.
pub fn diffusion_step(image: &mut GrayFloatImage, flow: &GrayFloatImage, step_size: f32) {
    let width = image.width();
    let height = image.height();
    if width == 0 || height == 0 {
        return;
    }
    let mut delta = GrayFloatImage::new(width, height);
    delta
        .buffer_mut()
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for (x, px) in row.iter_mut().enumerate() {
                let x = x as i64;
                let center_value = image.get_clamped(x, y);
                let center_flow = flow.get_clamped(x, y);
                let east = (center_flow + flow.get_clamped(x + 1, y))
                    * (image.get_clamped(x + 1, y) - center_value);
                let west = (flow.get_clamped(x - 1, y) + center_flow)
                    * (center_value - image.get_clamped(x - 1, y));
                let south = (center_flow + flow.get_clamped(x, y + 1))
                    * (image.get_clamped(x, y + 1) - center_value);
                let north = (flow.get_clamped(x, y - 1) + center_flow)
                    * (center_value - image.get_clamped(x, y - 1));
                *px = 0.5 * step_size * (east - west + south - north);
            }
        });
    image
        .buffer_mut()
        .par_iter_mut()
        .zip(delta.buffer().par_iter())
        .for_each(|(v, d)| *v += d);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_flow(width: usize, height: usize) -> GrayFloatImage {
        let mut flow = GrayFloatImage::new(width, height);
        for v in flow.buffer_mut() {
            *v = 1.0;
        }
        flow
    }

    #[test]
    fn test_constant_image_is_a_fixed_point() {
        let mut img = GrayFloatImage::new(16, 16);
        for v in img.buffer_mut() {
            *v = 0.3;
        }
        let flow = uniform_flow(16, 16);
        diffusion_step(&mut img, &flow, 0.25);
        for &v in img.buffer() {
            assert!((v - 0.3).abs() < 1e-6);
        }
    }

    #[test]
    fn test_step_smooths_an_impulse() {
        let mut img = GrayFloatImage::new(9, 9);
        img.put(4, 4, 1.0);
        let flow = uniform_flow(9, 9);
        diffusion_step(&mut img, &flow, 0.2);
        // Mass moves from the peak into the 4-neighborhood
        assert!(img.get(4, 4) < 1.0);
        assert!(img.get(3, 4) > 0.0);
        assert!(img.get(4, 3) > 0.0);
    }

    #[test]
    fn test_step_preserves_total_mass() {
        let mut img = GrayFloatImage::new(12, 12);
        img.put(3, 7, 0.8);
        img.put(8, 2, 0.5);
        let before: f32 = img.buffer().iter().sum();
        let flow = uniform_flow(12, 12);
        diffusion_step(&mut img, &flow, 0.2);
        let after: f32 = img.buffer().iter().sum();
        assert!((before - after).abs() < 1e-4);
    }

    #[test]
    fn test_low_conductivity_blocks_diffusion() {
        let mut img = GrayFloatImage::new(9, 9);
        img.put(4, 4, 1.0);
        let zero_flow = GrayFloatImage::new(9, 9);
        diffusion_step(&mut img, &zero_flow, 0.25);
        assert!((img.get(4, 4) - 1.0).abs() < 1e-6);
        assert_eq!(img.get(3, 4), 0.0);
    }

    #[test]
    fn test_conductivity_map_matches_pointwise_function() {
        let mut lx = GrayFloatImage::new(4, 4);
        let mut ly = GrayFloatImage::new(4, 4);
        lx.put(1, 2, 0.1);
        ly.put(1, 2, -0.2);
        let map = conductivity_map(&lx, &ly, 0.05, Diffusivity::PmG2);
        let expected = Diffusivity::PmG2.conductivity(0.1, -0.2, 0.05);
        assert!((map.get(1, 2) - expected).abs() < 1e-6);
        assert_eq!(map.get(0, 0), 1.0);
    }
}
