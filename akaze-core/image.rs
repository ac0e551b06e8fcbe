use rayon::prelude::*;

/// Row-major single-channel f32 image, intensities nominally in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct GrayFloatImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl GrayFloatImage {
    /// Create a zero-filled image
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Wrap an existing row-major buffer. Returns `None` on a length mismatch.
    pub fn from_raw(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        if data.len() != width * height {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn buffer(&self) -> &[f32] {
        &self.data
    }

    pub fn buffer_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn put(&mut self, x: usize, y: usize, value: f32) {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.width + x] = value;
    }

    /// Sample with coordinates clamped to the image bounds
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> f32 {
        let cx = x.clamp(0, self.width as i64 - 1) as usize;
        let cy = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[cy * self.width + cx]
    }

    /// Bilinear interpolation at fractional coordinates, clamped at the borders
    pub fn bilinear(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;

        let x0 = x0 as i64;
        let y0 = y0 as i64;
        let p00 = self.get_clamped(x0, y0);
        let p10 = self.get_clamped(x0 + 1, y0);
        let p01 = self.get_clamped(x0, y0 + 1);
        let p11 = self.get_clamped(x0 + 1, y0 + 1);

        let top = p00 * (1.0 - fx) + p10 * fx;
        let bottom = p01 * (1.0 - fx) + p11 * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Downsample by a factor of two with 2x2 area averaging.
    ///
    /// Output dimensions are floor(width/2) x floor(height/2); a trailing odd
    /// row or column does not contribute.
    pub fn half_size(&self) -> GrayFloatImage {
        let half_width = self.width / 2;
        let half_height = self.height / 2;
        let mut out = GrayFloatImage::new(half_width, half_height);
        out.data
            .par_chunks_mut(half_width.max(1))
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    let sx = 2 * x;
                    let sy = 2 * y;
                    *px = 0.25
                        * (self.get(sx, sy)
                            + self.get(sx + 1, sy)
                            + self.get(sx, sy + 1)
                            + self.get(sx + 1, sy + 1));
                }
            });
        out
    }

    /// Separable Gaussian blur with border clamping.
    ///
    /// The kernel radius is 3 sigma rounded up, which keeps well over 99% of
    /// the Gaussian mass.
    pub fn gaussian_blur(&self, sigma: f32) -> GrayFloatImage {
        if sigma <= 0.0 || self.is_empty() {
            return self.clone();
        }
        let radius = (3.0 * sigma).ceil().max(1.0) as i64;
        let kernel = gaussian_kernel(sigma, radius as usize);

        // Horizontal pass
        let mut tmp = GrayFloatImage::new(self.width, self.height);
        tmp.data
            .par_chunks_mut(self.width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    let mut acc = 0.0;
                    for (k, &w) in kernel.iter().enumerate() {
                        let sx = x as i64 + k as i64 - radius;
                        acc += w * self.get_clamped(sx, y as i64);
                    }
                    *px = acc;
                }
            });

        // Vertical pass
        let mut out = GrayFloatImage::new(self.width, self.height);
        out.data
            .par_chunks_mut(self.width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    let mut acc = 0.0;
                    for (k, &w) in kernel.iter().enumerate() {
                        let sy = y as i64 + k as i64 - radius;
                        acc += w * tmp.get_clamped(x as i64, sy);
                    }
                    *px = acc;
                }
            });
        out
    }
}

fn gaussian_kernel(sigma: f32, radius: usize) -> Vec<f32> {
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let d = i as f32 - radius as f32;
            (-d * d / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= sum;
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_image(width: usize, height: usize) -> GrayFloatImage {
        let mut img = GrayFloatImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                img.put(x, y, x as f32 / width as f32);
            }
        }
        img
    }

    #[test]
    fn test_from_raw_length_check() {
        assert!(GrayFloatImage::from_raw(4, 4, vec![0.0; 16]).is_some());
        assert!(GrayFloatImage::from_raw(4, 4, vec![0.0; 15]).is_none());
    }

    #[test]
    fn test_half_size_dimensions() {
        let img = GrayFloatImage::new(101, 64);
        let half = img.half_size();
        assert_eq!(half.width(), 50);
        assert_eq!(half.height(), 32);
    }

    #[test]
    fn test_half_size_averages() {
        let mut img = GrayFloatImage::new(2, 2);
        img.put(0, 0, 0.0);
        img.put(1, 0, 1.0);
        img.put(0, 1, 1.0);
        img.put(1, 1, 0.0);
        let half = img.half_size();
        assert!((half.get(0, 0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_bilinear_matches_grid_points() {
        let img = gradient_image(8, 8);
        assert!((img.bilinear(3.0, 4.0) - img.get(3, 4)).abs() < 1e-6);
        // Midpoint between two columns
        let mid = img.bilinear(3.5, 4.0);
        let expected = 0.5 * (img.get(3, 4) + img.get(4, 4));
        assert!((mid - expected).abs() < 1e-6);
    }

    #[test]
    fn test_gaussian_blur_preserves_constant() {
        let mut img = GrayFloatImage::new(16, 16);
        for v in img.buffer_mut() {
            *v = 0.5;
        }
        let blurred = img.gaussian_blur(1.6);
        for &v in blurred.buffer() {
            assert!((v - 0.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_gaussian_blur_smooths_edges() {
        let mut img = GrayFloatImage::new(16, 16);
        for y in 0..16 {
            for x in 8..16 {
                img.put(x, y, 1.0);
            }
        }
        let blurred = img.gaussian_blur(2.0);
        let at_edge = blurred.get(8, 8);
        assert!(at_edge > 0.1 && at_edge < 0.9);
    }
}
