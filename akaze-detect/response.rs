use akaze_core::GrayFloatImage;
use akaze_nld::{scharr_horizontal, scharr_vertical, ScaleSpace};
use rayon::prelude::*;

/// Compute derivative images and the scale-normalized determinant-of-Hessian
/// response for every level.
///
/// Derivatives are taken from `lsmooth` with Scharr filters at the level's
/// own `sigma_size`; the `sigma_size^4` normalization makes responses
/// comparable across scales. Levels are independent here, so they are
/// processed in parallel.
pub fn compute_detector_response(scale_space: &mut ScaleSpace) {
    scale_space.levels_mut().par_iter_mut().for_each(|level| {
        let scale = level.sigma_size;
        level.lx = scharr_horizontal(&level.lsmooth, scale);
        level.ly = scharr_vertical(&level.lsmooth, scale);
        level.lxx = scharr_horizontal(&level.lx, scale);
        level.lyy = scharr_vertical(&level.ly, scale);
        level.lxy = scharr_vertical(&level.lx, scale);

        let norm = (scale as f32).powi(4);
        let width = level.width();
        let mut ldet = GrayFloatImage::new(width, level.height());
        let (lxx, lyy, lxy) = (&level.lxx, &level.lyy, &level.lxy);
        ldet.buffer_mut()
            .iter_mut()
            .zip(
                lxx.buffer()
                    .iter()
                    .zip(lyy.buffer().iter())
                    .zip(lxy.buffer().iter()),
            )
            .for_each(|(out, ((xx, yy), xy))| {
                *out = norm * (xx * yy - xy * xy);
            });
        level.ldet = ldet;
    });
}
