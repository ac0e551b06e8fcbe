mod config;
mod descriptor;
mod image;

pub use config::{AkazeConfig, ConfigError, DescriptorKind, Diffusivity};
pub use descriptor::BinaryDescriptor;
pub use image::GrayFloatImage;

/// Keypoint detected in the nonlinear scale space.
///
/// Coordinates are subpixel positions in the base image frame regardless of
/// the octave the point was found in.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Keypoint {
    /// Subpixel x coordinate
    pub x: f32,
    /// Subpixel y coordinate
    pub y: f32,
    /// Scale (sigma) in base-image pixel units
    pub size: f32,
    /// Dominant orientation in radians, 0 in upright mode
    pub angle: f32,
    /// Determinant-of-Hessian response at the detection point
    pub response: f32,
    /// Octave the point was detected in
    pub octave: u32,
    /// Index of the scale-space level that produced the point. Pairs the
    /// keypoint with its descriptor and selects the sampling level.
    pub class_id: usize,
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
