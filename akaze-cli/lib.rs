mod keyfile;

use akaze_core::{init_thread_pool, AkazeConfig, BinaryDescriptor, ConfigError, GrayFloatImage, Keypoint};
use akaze_nld::{build_scale_space, ScaleSpace, ScaleSpaceError};
use log::debug;

pub use akaze_core::{
    self, AkazeConfig as Config, BinaryDescriptor as AkazeDescriptor, GrayFloatImage as AkazeImage,
    Keypoint as AkazeKeypoint,
};
pub use keyfile::{
    decode_keyfile, encode_binary, encode_text, read_keyfile, write_keyfile, KeyfileFormat,
};

#[derive(Debug)]
pub enum AkazeError {
    ScaleSpace(ScaleSpaceError),
    Config(ConfigError),
    ThreadPool(rayon::ThreadPoolBuildError),
    Io(std::io::Error),
    /// Malformed persisted keypoint file
    Keyfile { line: usize, message: String },
}

impl std::fmt::Display for AkazeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AkazeError::ScaleSpace(e) => write!(f, "Scale space error: {}", e),
            AkazeError::Config(e) => write!(f, "Configuration error: {}", e),
            AkazeError::ThreadPool(e) => write!(f, "Thread pool error: {}", e),
            AkazeError::Io(e) => write!(f, "I/O error: {}", e),
            AkazeError::Keyfile { line, message } => {
                write!(f, "Keypoint file error at line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for AkazeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AkazeError::ScaleSpace(e) => Some(e),
            AkazeError::Config(e) => Some(e),
            AkazeError::ThreadPool(e) => Some(e),
            AkazeError::Io(e) => Some(e),
            AkazeError::Keyfile { .. } => None,
        }
    }
}

impl From<ScaleSpaceError> for AkazeError {
    fn from(err: ScaleSpaceError) -> Self {
        AkazeError::ScaleSpace(err)
    }
}

impl From<ConfigError> for AkazeError {
    fn from(err: ConfigError) -> Self {
        AkazeError::Config(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for AkazeError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        AkazeError::ThreadPool(err)
    }
}

impl From<std::io::Error> for AkazeError {
    fn from(err: std::io::Error) -> Self {
        AkazeError::Io(err)
    }
}

pub type AkazeResult<T> = Result<T, AkazeError>;

/// High-level AKAZE extractor combining nonlinear scale-space construction,
/// Hessian feature detection and MLDB description
pub struct Akaze {
    config: AkazeConfig,
}

impl Akaze {
    /// Create an extractor with the given configuration
    pub fn new(config: AkazeConfig) -> AkazeResult<Self> {
        config.validate()?;
        // The global pool can only be built once per process; later
        // extractors reuse it
        if init_thread_pool(config.n_threads).is_err() {
            debug!("Thread pool already initialized, reusing it");
        }
        Ok(Self { config })
    }

    /// Default configuration for the given image dimensions
    pub fn with_dimensions(width: usize, height: usize) -> AkazeResult<Self> {
        Self::new(AkazeConfig::new(width, height))
    }

    /// Build the nonlinear scale space for an image
    pub fn build_scale_space(&self, img: &GrayFloatImage) -> AkazeResult<ScaleSpace> {
        Ok(build_scale_space(img, &self.config)?)
    }

    /// Detect keypoints only
    pub fn detect_keypoints(&self, img: &GrayFloatImage) -> AkazeResult<Vec<Keypoint>> {
        let mut scale_space = self.build_scale_space(img)?;
        Ok(akaze_detect::detect_features(&mut scale_space, &self.config))
    }

    /// Detect keypoints and extract their descriptors in one step
    pub fn extract(
        &self,
        img: &GrayFloatImage,
    ) -> AkazeResult<(Vec<Keypoint>, Vec<BinaryDescriptor>)> {
        let t0 = std::time::Instant::now();
        let mut scale_space = self.build_scale_space(img)?;
        let t1 = std::time::Instant::now();
        let keypoints = akaze_detect::detect_features(&mut scale_space, &self.config);
        let t2 = std::time::Instant::now();
        let descriptors =
            akaze_mldb::compute_descriptors(&mut scale_space, &keypoints, &self.config)?;
        debug!(
            "Stage times: scale space {:.2?}, detection {:.2?}, description {:.2?}",
            t1 - t0,
            t2 - t1,
            t2.elapsed()
        );
        Ok((keypoints, descriptors))
    }

    pub fn config(&self) -> &AkazeConfig {
        &self.config
    }
}

/// Convert an 8-bit grayscale image to the [0, 1] float representation the
/// pipeline works in
pub fn gray_image_to_float(img: &image::GrayImage) -> GrayFloatImage {
    let (width, height) = img.dimensions();
    let data = img.as_raw().iter().map(|&p| p as f32 / 255.0).collect();
    // Length always matches: as_raw is width * height bytes for Luma8
    GrayFloatImage::from_raw(width as usize, height as usize, data)
        .unwrap_or_else(|| GrayFloatImage::new(width as usize, height as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_image(size: usize) -> GrayFloatImage {
        let mut img = GrayFloatImage::new(size, size);
        let c = size as f32 / 2.0;
        for y in 0..size {
            for x in 0..size {
                let d2 = (x as f32 - c).powi(2) + (y as f32 - c).powi(2);
                img.put(x, y, 0.1 + 0.8 * (-d2 / 18.0).exp());
            }
        }
        img
    }

    #[test]
    fn test_extract_pairs_keypoints_with_descriptors() {
        let img = blob_image(64);
        let akaze = Akaze::with_dimensions(64, 64).unwrap();
        let (keypoints, descriptors) = akaze.extract(&img).unwrap();
        assert!(!keypoints.is_empty());
        assert_eq!(keypoints.len(), descriptors.len());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = AkazeConfig::new(64, 64);
        config.num_sublevels = 0;
        assert!(matches!(Akaze::new(config), Err(AkazeError::Config(_))));
    }

    #[test]
    fn test_dimension_mismatch_is_reported() {
        let img = blob_image(32);
        let akaze = Akaze::with_dimensions(64, 64).unwrap();
        assert!(matches!(
            akaze.extract(&img),
            Err(AkazeError::ScaleSpace(_))
        ));
    }

    #[test]
    fn test_gray_image_conversion() {
        let mut img = image::GrayImage::new(4, 2);
        img.put_pixel(0, 0, image::Luma([255]));
        img.put_pixel(3, 1, image::Luma([51]));
        let float = gray_image_to_float(&img);
        assert_eq!(float.width(), 4);
        assert_eq!(float.height(), 2);
        assert!((float.get(0, 0) - 1.0).abs() < 1e-6);
        assert!((float.get(3, 1) - 0.2).abs() < 1e-6);
    }
}
