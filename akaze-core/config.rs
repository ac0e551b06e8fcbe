#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Conductivity function used by the nonlinear diffusion.
///
/// Lower conductivity near strong edges preserves them while flat regions
/// keep diffusing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Diffusivity {
    /// Perona-Malik exponential decay: g = exp(-|grad|^2 / k^2)
    PmG1,
    /// Perona-Malik inverse square: g = 1 / (1 + |grad|^2 / k^2)
    PmG2,
    /// Weickert's edge-preserving variant, flat below k then a sharp cutoff
    Weickert,
    /// Charbonnier: g = 1 / sqrt(1 + |grad|^2 / k^2)
    Charbonnier,
}

impl Diffusivity {
    /// Evaluate the conductivity for a gradient (lx, ly) and contrast factor k.
    ///
    /// Result is in (0, 1]; a zero gradient always yields 1.
    #[inline]
    pub fn conductivity(self, lx: f32, ly: f32, k: f32) -> f32 {
        let grad_sq = lx * lx + ly * ly;
        if grad_sq == 0.0 {
            return 1.0;
        }
        let ratio = grad_sq / (k * k);
        match self {
            Diffusivity::PmG1 => (-ratio).exp(),
            Diffusivity::PmG2 => 1.0 / (1.0 + ratio),
            Diffusivity::Weickert => {
                let r4 = ratio * ratio * ratio * ratio;
                1.0 - (-3.315 / r4).exp()
            }
            Diffusivity::Charbonnier => 1.0 / (1.0 + ratio).sqrt(),
        }
    }
}

/// Binary descriptor variant preset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DescriptorKind {
    /// Modified-Local-Difference-Binary, rotated by the dominant orientation
    Mldb,
    /// MLDB without orientation estimation; every keypoint keeps angle 0
    MldbUpright,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AkazeConfig {
    /// Base sigma of the first scale-space level
    pub base_scale_offset: f64,
    /// Upper bound on the octave count; capped further by the image size
    pub max_octaves: u32,
    /// Scale samples per octave
    pub num_sublevels: u32,
    /// Minimum determinant-of-Hessian response for a detection candidate
    pub detector_threshold: f64,
    /// Gaussian sigma applied before gradients in the contrast estimator
    pub derivative_smoothing: f64,
    /// Conductivity function for the diffusion
    pub diffusivity: Diffusivity,
    /// Descriptor variant
    pub descriptor: DescriptorKind,
    /// Requested descriptor length in bits; 0 selects the scheme default
    pub descriptor_size: usize,
    /// Sampled channels: 1 = intensity, 2 = +gradient magnitude,
    /// 3 = intensity + rotated gradient x/y
    pub descriptor_channels: usize,
    /// Half-width of the sampling pattern in sigma units
    pub descriptor_pattern_size: usize,
    /// Skip orientation estimation and force angle = 0
    pub upright: bool,
    /// Percentile of gradient energy below the contrast factor
    pub contrast_percentile: f64,
    /// Histogram bins for the contrast factor estimate
    pub contrast_nbins: usize,
    /// Multiplier mapping level sigma to the derivative filter scale
    pub derivative_factor: f64,
    /// Input image width; must match the image handed to the builder
    pub image_width: usize,
    /// Input image height
    pub image_height: usize,
    /// Rayon worker threads for per-pixel and per-keypoint work
    pub n_threads: usize,
}

impl Default for AkazeConfig {
    fn default() -> Self {
        Self {
            base_scale_offset: 1.6,
            max_octaves: 4,
            num_sublevels: 4,
            detector_threshold: 0.001,
            derivative_smoothing: 1.0,
            diffusivity: Diffusivity::PmG2,
            descriptor: DescriptorKind::Mldb,
            descriptor_size: 0,
            descriptor_channels: 3,
            descriptor_pattern_size: 10,
            upright: false,
            contrast_percentile: 0.7,
            contrast_nbins: 300,
            derivative_factor: 1.5,
            image_width: 0,
            image_height: 0,
            n_threads: num_cpus::get().max(1),
        }
    }
}

impl AkazeConfig {
    /// Default configuration for an image of the given dimensions
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            image_width: width,
            image_height: height,
            ..Default::default()
        }
    }

    /// Sparse preset: ten times the default detection threshold
    pub fn sparse(width: usize, height: usize) -> Self {
        Self {
            detector_threshold: 0.01,
            ..Self::new(width, height)
        }
    }

    /// Dense preset: a tenth of the default detection threshold
    pub fn dense(width: usize, height: usize) -> Self {
        Self {
            detector_threshold: 0.0001,
            ..Self::new(width, height)
        }
    }

    /// Whether orientation estimation is disabled, either by the upright flag
    /// or by the upright descriptor preset
    pub fn is_upright(&self) -> bool {
        self.upright || self.descriptor == DescriptorKind::MldbUpright
    }

    /// Validate parameter invariants. Image dimensions are checked separately
    /// at scale-space construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_scale_offset <= 0.0 {
            return Err(ConfigError::InvalidScaleOffset(self.base_scale_offset));
        }
        if self.max_octaves == 0 {
            return Err(ConfigError::InvalidOctaves(self.max_octaves));
        }
        if self.num_sublevels == 0 {
            return Err(ConfigError::InvalidSublevels(self.num_sublevels));
        }
        if !(self.detector_threshold > 0.0) {
            return Err(ConfigError::InvalidThreshold(self.detector_threshold));
        }
        if self.descriptor_channels == 0 || self.descriptor_channels > 3 {
            return Err(ConfigError::InvalidChannels(self.descriptor_channels));
        }
        if self.descriptor_pattern_size == 0 {
            return Err(ConfigError::InvalidPatternSize(self.descriptor_pattern_size));
        }
        if !(self.contrast_percentile > 0.0 && self.contrast_percentile <= 1.0) {
            return Err(ConfigError::InvalidPercentile(self.contrast_percentile));
        }
        if self.contrast_nbins == 0 {
            return Err(ConfigError::InvalidHistogramBins(self.contrast_nbins));
        }
        Ok(())
    }

    /// Save configuration to a JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from a TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from a JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub enum ConfigError {
    InvalidScaleOffset(f64),
    InvalidOctaves(u32),
    InvalidSublevels(u32),
    InvalidThreshold(f64),
    InvalidChannels(usize),
    InvalidPatternSize(usize),
    InvalidPercentile(f64),
    InvalidHistogramBins(usize),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidScaleOffset(v) => {
                write!(f, "Invalid base scale offset: {} (must be > 0)", v)
            }
            ConfigError::InvalidOctaves(v) => {
                write!(f, "Invalid octave count: {} (must be >= 1)", v)
            }
            ConfigError::InvalidSublevels(v) => {
                write!(f, "Invalid sublevel count: {} (must be >= 1)", v)
            }
            ConfigError::InvalidThreshold(v) => {
                write!(f, "Invalid detector threshold: {} (must be > 0)", v)
            }
            ConfigError::InvalidChannels(v) => {
                write!(f, "Invalid descriptor channel count: {} (must be 1-3)", v)
            }
            ConfigError::InvalidPatternSize(v) => {
                write!(f, "Invalid descriptor pattern size: {} (must be >= 1)", v)
            }
            ConfigError::InvalidPercentile(v) => {
                write!(f, "Invalid contrast percentile: {} (must be in (0, 1])", v)
            }
            ConfigError::InvalidHistogramBins(v) => {
                write!(f, "Invalid contrast histogram bin count: {} (must be >= 1)", v)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_validates() {
        assert!(AkazeConfig::new(640, 480).validate().is_ok());
    }

    #[test]
    fn test_invalid_parameters() {
        let mut cfg = AkazeConfig::new(640, 480);
        cfg.detector_threshold = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidThreshold(_))
        ));

        let mut cfg = AkazeConfig::new(640, 480);
        cfg.descriptor_channels = 4;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidChannels(4))));

        let mut cfg = AkazeConfig::new(640, 480);
        cfg.num_sublevels = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidSublevels(0))
        ));
    }

    #[test]
    fn test_presets() {
        let sparse = AkazeConfig::sparse(100, 100);
        let dense = AkazeConfig::dense(100, 100);
        assert!(sparse.detector_threshold > dense.detector_threshold);
    }

    #[test]
    fn test_upright_descriptor_preset() {
        let mut cfg = AkazeConfig::new(100, 100);
        assert!(!cfg.is_upright());
        cfg.descriptor = DescriptorKind::MldbUpright;
        assert!(cfg.is_upright());
    }

    #[test]
    fn test_conductivity_range() {
        for diffusivity in [
            Diffusivity::PmG1,
            Diffusivity::PmG2,
            Diffusivity::Weickert,
            Diffusivity::Charbonnier,
        ] {
            assert_eq!(diffusivity.conductivity(0.0, 0.0, 0.03), 1.0);
            let g = diffusivity.conductivity(0.5, 0.5, 0.03);
            assert!(g > 0.0 && g < 1.0, "{:?} gave {}", diffusivity, g);
        }
    }

    #[test]
    fn test_conductivity_decreases_with_gradient() {
        let weak = Diffusivity::PmG2.conductivity(0.01, 0.0, 0.03);
        let strong = Diffusivity::PmG2.conductivity(0.5, 0.0, 0.03);
        assert!(strong < weak);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_round_trip() {
        let cfg = AkazeConfig::sparse(320, 240);
        let json = cfg.to_json().unwrap();
        let restored = AkazeConfig::from_json(&json).unwrap();
        assert_eq!(restored.image_width, 320);
        assert_eq!(restored.detector_threshold, cfg.detector_threshold);
        assert_eq!(restored.diffusivity, cfg.diffusivity);
    }
}
