//! Determinant-of-Hessian feature detection over a nonlinear scale space.
//!
//! The detector is a pure batch computation: it fills each level's
//! derivative and response images, collects space-scale maxima above the
//! configured threshold, refines them to subpixel precision, merges
//! duplicates from adjacent sublevels, and (unless running upright)
//! estimates a dominant orientation per keypoint.

mod extrema;
mod orientation;
mod response;

pub use extrema::{find_scale_space_extrema, suppress_duplicates};
pub use orientation::compute_orientations;
pub use response::compute_detector_response;

use akaze_core::{AkazeConfig, Keypoint};
use akaze_nld::ScaleSpace;
use log::debug;

/// Detect keypoints in a completed scale space.
///
/// Takes the scale space mutably because the derivative and response images
/// are computed here rather than during construction. The returned sequence
/// is deterministic for identical input: octave-major, response-descending
/// within an octave, then scan order.
pub fn detect_features(scale_space: &mut ScaleSpace, config: &AkazeConfig) -> Vec<Keypoint> {
    compute_detector_response(scale_space);

    let candidates = find_scale_space_extrema(scale_space, config);
    debug!("{} extrema candidates before duplicate merge", candidates.len());
    let mut keypoints = suppress_duplicates(candidates);

    if !config.is_upright() {
        compute_orientations(scale_space, &mut keypoints);
    }

    keypoints.sort_by(|a, b| {
        a.octave
            .cmp(&b.octave)
            .then(
                b.response
                    .partial_cmp(&a.response)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });
    debug!("{} keypoints detected", keypoints.len());
    keypoints
}
