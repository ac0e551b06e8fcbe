mod contrast;
mod derivatives;
mod diffusion;
mod error;
mod fed_tau;

pub use contrast::{compute_contrast_factor, CONTRAST_FLOOR};
pub use derivatives::{scharr_horizontal, scharr_vertical};
pub use diffusion::{conductivity_map, diffusion_step};
pub use error::{ScaleSpaceError, ScaleSpaceResult};
pub use fed_tau::{fed_tau_by_cycle_time, fed_tau_by_process_time};

use akaze_core::{AkazeConfig, GrayFloatImage};
use log::{debug, trace};

/// Smallest usable dimension of an octave image. Octaves that would shrink
/// below this contribute no levels; the effective octave count is capped
/// instead of failing.
pub const MIN_LEVEL_DIM: usize = 40;

/// Stability bound of a single explicit diffusion step on the 2D grid
pub const FED_TAU_MAX: f64 = 0.25;

/// One level of the nonlinear scale space.
///
/// `lt` is the diffused image. The derivative images and the detector
/// response start empty and are filled by the feature detector when needed.
#[derive(Debug)]
pub struct ScaleSpaceLevel {
    /// Diffused image at this level's evolution time
    pub lt: GrayFloatImage,
    /// Lightly smoothed copy of `lt` used for derivative estimation
    pub lsmooth: GrayFloatImage,
    /// First-order derivatives at the level's derivative scale
    pub lx: GrayFloatImage,
    pub ly: GrayFloatImage,
    /// Second-order derivatives
    pub lxx: GrayFloatImage,
    pub lyy: GrayFloatImage,
    pub lxy: GrayFloatImage,
    /// Scale-normalized determinant-of-Hessian response
    pub ldet: GrayFloatImage,
    /// Evolution sigma in base-image units
    pub esigma: f64,
    /// Evolution time, t = sigma^2 / 2
    pub etime: f64,
    /// Rounded derivative filter scale in this octave's pixel units
    pub sigma_size: u32,
    pub octave: u32,
    pub sublevel: u32,
    /// FED substep sizes advancing the previous level to this one
    pub fed_tau: Vec<f64>,
}

impl ScaleSpaceLevel {
    fn new(octave: u32, sublevel: u32, config: &AkazeConfig) -> Self {
        let esigma = config.base_scale_offset
            * f64::powf(
                2.0,
                f64::from(sublevel) / f64::from(config.num_sublevels) + f64::from(octave),
            );
        let ratio = f64::powi(2.0, octave as i32);
        let sigma_size = (esigma * config.derivative_factor / ratio).round().max(1.0) as u32;
        Self {
            lt: GrayFloatImage::new(0, 0),
            lsmooth: GrayFloatImage::new(0, 0),
            lx: GrayFloatImage::new(0, 0),
            ly: GrayFloatImage::new(0, 0),
            lxx: GrayFloatImage::new(0, 0),
            lyy: GrayFloatImage::new(0, 0),
            lxy: GrayFloatImage::new(0, 0),
            ldet: GrayFloatImage::new(0, 0),
            esigma,
            etime: 0.5 * esigma * esigma,
            sigma_size,
            octave,
            sublevel,
            fed_tau: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.lt.width()
    }

    pub fn height(&self) -> usize {
        self.lt.height()
    }

    /// Downsampling factor of this level's octave relative to the base image
    pub fn ratio(&self) -> f32 {
        f32::powi(2.0, self.octave as i32)
    }
}

/// The completed nonlinear scale space: an ordered sequence of levels in
/// strictly increasing scale, immutable for readers once built.
#[derive(Debug)]
pub struct ScaleSpace {
    levels: Vec<ScaleSpaceLevel>,
    octave_count: u32,
    sublevels_per_octave: u32,
    contrast_factor: f64,
    width: usize,
    height: usize,
}

impl ScaleSpace {
    pub fn levels(&self) -> &[ScaleSpaceLevel] {
        &self.levels
    }

    /// Mutable access for the detector, which fills the lazily computed
    /// derivative and response images
    pub fn levels_mut(&mut self) -> &mut [ScaleSpaceLevel] {
        &mut self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Effective octave count after capping by the image size
    pub fn octave_count(&self) -> u32 {
        self.octave_count
    }

    pub fn sublevels_per_octave(&self) -> u32 {
        self.sublevels_per_octave
    }

    /// Contrast factor estimated from the base image
    pub fn contrast_factor(&self) -> f64 {
        self.contrast_factor
    }

    /// Base image dimensions
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }
}

/// Number of octaves that keep the smallest image dimension at or above
/// [`MIN_LEVEL_DIM`], capped by the requested maximum. Octave 0 is always
/// kept for a non-empty image.
pub fn effective_octave_count(width: usize, height: usize, max_octaves: u32) -> u32 {
    let mut count = 1u32;
    while count < max_octaves {
        let dim = std::cmp::min(width >> count, height >> count);
        if dim < MIN_LEVEL_DIM {
            break;
        }
        count += 1;
    }
    count
}

/// Build the nonlinear scale space for a single image.
///
/// Levels are produced strictly in order: each one starts from its
/// predecessor's diffused image (half-sized on an octave change) and is
/// advanced to its target evolution time by one FED cycle of explicit
/// conductivity-weighted diffusion substeps.
pub fn build_scale_space(
    image: &GrayFloatImage,
    config: &AkazeConfig,
) -> ScaleSpaceResult<ScaleSpace> {
    config.validate()?;
    if image.is_empty() {
        return Err(ScaleSpaceError::InvalidImageSize {
            width: image.width(),
            height: image.height(),
        });
    }
    if image.width() != config.image_width || image.height() != config.image_height {
        return Err(ScaleSpaceError::InvalidImageData {
            expected_len: config.image_width * config.image_height,
            actual_len: image.buffer().len(),
        });
    }

    let octave_count = effective_octave_count(image.width(), image.height(), config.max_octaves);
    if octave_count < config.max_octaves {
        debug!(
            "Capping octaves at {} of {} requested for a {}x{} image",
            octave_count,
            config.max_octaves,
            image.width(),
            image.height()
        );
    }

    let mut levels: Vec<ScaleSpaceLevel> = (0..octave_count)
        .flat_map(|octave| {
            (0..config.num_sublevels).map(move |sublevel| ScaleSpaceLevel::new(octave, sublevel, config))
        })
        .collect();
    for i in 1..levels.len() {
        let ttime = levels[i].etime - levels[i - 1].etime;
        levels[i].fed_tau = fed_tau_by_process_time(ttime, 1, FED_TAU_MAX, true);
        trace!("{} FED substeps for level {}", levels[i].fed_tau.len(), i);
    }

    levels[0].lt = image.gaussian_blur(config.base_scale_offset as f32);
    levels[0].lsmooth = levels[0].lt.clone();
    let base_contrast = compute_contrast_factor(image, config);
    debug!("Base contrast factor {}", base_contrast);

    let mut contrast = base_contrast;
    for i in 1..levels.len() {
        let start = if levels[i].octave > levels[i - 1].octave {
            // Half-sizing halves gradient magnitudes as well, so the
            // contrast factor shrinks with the octave
            contrast *= 0.75;
            levels[i - 1].lt.half_size()
        } else {
            levels[i - 1].lt.clone()
        };
        levels[i].lt = start;
        levels[i].lsmooth = levels[i].lt.gaussian_blur(1.0);
        let lx = scharr_horizontal(&levels[i].lsmooth, 1);
        let ly = scharr_vertical(&levels[i].lsmooth, 1);
        let flow = conductivity_map(&lx, &ly, contrast as f32, config.diffusivity);
        let taus = std::mem::take(&mut levels[i].fed_tau);
        for &tau in &taus {
            diffusion_step(&mut levels[i].lt, &flow, tau as f32);
        }
        levels[i].fed_tau = taus;
        trace!(
            "Level {} (octave {}, sublevel {}) diffused to t={}",
            i,
            levels[i].octave,
            levels[i].sublevel,
            levels[i].etime
        );
    }

    Ok(ScaleSpace {
        levels,
        octave_count,
        sublevels_per_octave: config.num_sublevels,
        contrast_factor: base_contrast,
        width: image.width(),
        height: image.height(),
    })
}
