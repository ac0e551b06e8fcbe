use akaze_core::{AkazeConfig, Keypoint};
use akaze_nld::{ScaleSpace, ScaleSpaceLevel};
use rayon::prelude::*;

/// Find space-scale maxima of the detector response.
///
/// A candidate must exceed the detector threshold, be a strict maximum of
/// its own 3x3 spatial neighborhood, and exceed the bilinearly interpolated
/// response of the 3x3 window at the adjacent sublevels (coordinates mapped
/// through the octave ratio). Boundary levels compare only against the
/// neighbors that exist. Candidates are then refined to subpixel/subscale
/// precision.
pub fn find_scale_space_extrema(scale_space: &ScaleSpace, config: &AkazeConfig) -> Vec<Keypoint> {
    let threshold = config.detector_threshold as f32;
    let levels = scale_space.levels();
    let per_level: Vec<Vec<Keypoint>> = levels
        .par_iter()
        .enumerate()
        .map(|(index, level)| detect_in_level(levels, index, level, threshold, config))
        .collect();
    per_level.into_iter().flatten().collect()
}

fn detect_in_level(
    levels: &[ScaleSpaceLevel],
    index: usize,
    level: &ScaleSpaceLevel,
    threshold: f32,
    config: &AkazeConfig,
) -> Vec<Keypoint> {
    let width = level.width();
    let height = level.height();
    let margin = level.sigma_size.max(1) as usize;
    // A level too small for its own derivative support contributes nothing
    if width <= 2 * margin || height <= 2 * margin {
        return Vec::new();
    }

    let below = index.checked_sub(1).map(|i| &levels[i]);
    let above = levels.get(index + 1);
    let mut found = Vec::new();
    for y in margin..height - margin {
        for x in margin..width - margin {
            let value = level.ldet.get(x, y);
            if value <= threshold {
                continue;
            }
            if !is_spatial_maximum(level, x, y, value) {
                continue;
            }
            let beats_below = below
                .map(|adj| beats_adjacent_level(level, adj, x, y, value))
                .unwrap_or(true);
            if !beats_below {
                continue;
            }
            let beats_above = above
                .map(|adj| beats_adjacent_level(level, adj, x, y, value))
                .unwrap_or(true);
            if !beats_above {
                continue;
            }
            found.push(refine_candidate(levels, index, x, y, value, config));
        }
    }
    found
}

#[inline]
fn is_spatial_maximum(level: &ScaleSpaceLevel, x: usize, y: usize, value: f32) -> bool {
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            if value <= level.ldet.get_clamped(x as i64 + dx, y as i64 + dy) {
                return false;
            }
        }
    }
    true
}

/// Strictly greater than the interpolated 3x3 response window of an adjacent
/// sublevel. The window center is the candidate position mapped into the
/// adjacent level's pixel grid.
fn beats_adjacent_level(
    level: &ScaleSpaceLevel,
    adjacent: &ScaleSpaceLevel,
    x: usize,
    y: usize,
    value: f32,
) -> bool {
    let scale = level.ratio() / adjacent.ratio();
    let cx = x as f32 * scale;
    let cy = y as f32 * scale;
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            let sample = adjacent.ldet.bilinear(cx + dx as f32, cy + dy as f32);
            if value <= sample {
                return false;
            }
        }
    }
    true
}

/// Response sampled from a level adjacent in scale, at a spatial offset given
/// in the candidate level's pixel units
fn response_at(
    level: &ScaleSpaceLevel,
    adjacent: &ScaleSpaceLevel,
    x: usize,
    y: usize,
    dx: i32,
    dy: i32,
) -> f32 {
    let scale = level.ratio() / adjacent.ratio();
    adjacent
        .ldet
        .bilinear((x as i32 + dx) as f32 * scale, (y as i32 + dy) as f32 * scale)
}

/// Quadratic subpixel/subscale refinement around a candidate.
///
/// Fits the local response with a second-order Taylor expansion in (x, y, s)
/// and moves the candidate to the fitted extremum. When any offset component
/// exceeds half a pixel/level the fit is unreliable and the unrefined
/// candidate is kept. Levels without both scale neighbors refine spatially
/// only.
fn refine_candidate(
    levels: &[ScaleSpaceLevel],
    index: usize,
    x: usize,
    y: usize,
    value: f32,
    config: &AkazeConfig,
) -> Keypoint {
    let level = &levels[index];
    let has_both_neighbors = index > 0 && index + 1 < levels.len();

    let offsets = if has_both_neighbors {
        let below = &levels[index - 1];
        let above = &levels[index + 1];
        let f = |ds: i32, dy: i32, dx: i32| -> f32 {
            match ds {
                -1 => response_at(level, below, x, y, dx, dy),
                1 => response_at(level, above, x, y, dx, dy),
                _ => level.ldet.get_clamped(x as i64 + dx as i64, y as i64 + dy as i64),
            }
        };
        solve_3d(&f)
    } else {
        let f = |dy: i32, dx: i32| -> f32 {
            level.ldet.get_clamped(x as i64 + dx as i64, y as i64 + dy as i64)
        };
        solve_2d(&f).map(|(ox, oy)| (ox, oy, 0.0))
    };

    let (ox, oy, os) = match offsets {
        Some((ox, oy, os))
            if ox.abs() <= 0.5 && oy.abs() <= 0.5 && os.abs() <= 0.5 =>
        {
            (ox, oy, os)
        }
        // Unreliable fit: keep the unrefined candidate
        _ => (0.0, 0.0, 0.0),
    };

    let ratio = level.ratio();
    let size = level.esigma as f32 * f32::powf(2.0, os / config.num_sublevels as f32);
    Keypoint {
        x: (x as f32 + ox) * ratio,
        y: (y as f32 + oy) * ratio,
        size,
        angle: 0.0,
        response: value,
        octave: level.octave,
        class_id: index,
    }
}

/// Newton step for a 2D quadratic fit over the 3x3 neighborhood
fn solve_2d(f: &dyn Fn(i32, i32) -> f32) -> Option<(f32, f32)> {
    let dx = 0.5 * (f(0, 1) - f(0, -1));
    let dy = 0.5 * (f(1, 0) - f(-1, 0));
    let dxx = f(0, 1) - 2.0 * f(0, 0) + f(0, -1);
    let dyy = f(1, 0) - 2.0 * f(0, 0) + f(-1, 0);
    let dxy = 0.25 * (f(1, 1) - f(1, -1) - f(-1, 1) + f(-1, -1));

    let det = dxx * dyy - dxy * dxy;
    if det.abs() < 1e-10 {
        return None;
    }
    Some((
        -(dyy * dx - dxy * dy) / det,
        -(dxx * dy - dxy * dx) / det,
    ))
}

/// Newton step for a 3D quadratic fit over the 3x3x3 space-scale
/// neighborhood, solved with Cramer's rule
fn solve_3d(f: &dyn Fn(i32, i32, i32) -> f32) -> Option<(f32, f32, f32)> {
    let dx = 0.5 * (f(0, 0, 1) - f(0, 0, -1));
    let dy = 0.5 * (f(0, 1, 0) - f(0, -1, 0));
    let ds = 0.5 * (f(1, 0, 0) - f(-1, 0, 0));

    let center = f(0, 0, 0);
    let dxx = f(0, 0, 1) - 2.0 * center + f(0, 0, -1);
    let dyy = f(0, 1, 0) - 2.0 * center + f(0, -1, 0);
    let dss = f(1, 0, 0) - 2.0 * center + f(-1, 0, 0);
    let dxy = 0.25 * (f(0, 1, 1) - f(0, 1, -1) - f(0, -1, 1) + f(0, -1, -1));
    let dxs = 0.25 * (f(1, 0, 1) - f(1, 0, -1) - f(-1, 0, 1) + f(-1, 0, -1));
    let dys = 0.25 * (f(1, 1, 0) - f(1, -1, 0) - f(-1, 1, 0) + f(-1, -1, 0));

    let det = dxx * (dyy * dss - dys * dys) - dxy * (dxy * dss - dys * dxs)
        + dxs * (dxy * dys - dyy * dxs);
    if det.abs() < 1e-10 {
        return None;
    }

    // Columns of the inverse times the negative gradient
    let ox = -(dx * (dyy * dss - dys * dys) - dy * (dxy * dss - dxs * dys)
        + ds * (dxy * dys - dxs * dyy))
        / det;
    let oy = -(-dx * (dxy * dss - dys * dxs) + dy * (dxx * dss - dxs * dxs)
        - ds * (dxx * dys - dxy * dxs))
        / det;
    let os = -(dx * (dxy * dys - dyy * dxs) - dy * (dxx * dys - dxy * dxs)
        + ds * (dxx * dyy - dxy * dxy))
        / det;
    Some((ox, oy, os))
}

/// Merge duplicate detections from the same or adjacent sublevels.
///
/// Candidates are visited in response-descending order; a candidate within
/// half its scale of an already accepted point from a neighboring level is
/// discarded, keeping the stronger response.
pub fn suppress_duplicates(mut candidates: Vec<Keypoint>) -> Vec<Keypoint> {
    candidates.sort_by(|a, b| {
        b.response
            .partial_cmp(&a.response)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
            .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut accepted: Vec<Keypoint> = Vec::new();
    for candidate in candidates {
        let radius = 0.5 * candidate.size;
        let is_duplicate = accepted.iter().any(|kept| {
            let level_distance = (kept.class_id as i64 - candidate.class_id as i64).abs();
            if level_distance > 1 {
                return false;
            }
            let dx = kept.x - candidate.x;
            let dy = kept.y - candidate.y;
            let merge_radius = radius.max(0.5 * kept.size);
            dx * dx + dy * dy <= merge_radius * merge_radius
        });
        if !is_duplicate {
            accepted.push(candidate);
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_2d_centered_parabola() {
        // f = 1 - x^2 - y^2 peaks at the origin
        let f = |dy: i32, dx: i32| 1.0 - (dx * dx + dy * dy) as f32;
        let (ox, oy) = solve_2d(&f).unwrap();
        assert!(ox.abs() < 1e-6 && oy.abs() < 1e-6);
    }

    #[test]
    fn test_solve_2d_shifted_parabola() {
        // Peak at x = 0.25, y = -0.25
        let f = |dy: i32, dx: i32| {
            let x = dx as f32 - 0.25;
            let y = dy as f32 + 0.25;
            2.0 - x * x - y * y
        };
        let (ox, oy) = solve_2d(&f).unwrap();
        assert!((ox - 0.25).abs() < 1e-5);
        assert!((oy + 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_solve_2d_degenerate_returns_none() {
        let f = |_: i32, _: i32| 0.5;
        assert!(solve_2d(&f).is_none());
    }

    #[test]
    fn test_solve_3d_shifted_peak() {
        let f = |ds: i32, dy: i32, dx: i32| {
            let x = dx as f32 - 0.2;
            let y = dy as f32 - 0.1;
            let s = ds as f32 + 0.3;
            5.0 - x * x - 2.0 * y * y - s * s
        };
        let (ox, oy, os) = solve_3d(&f).unwrap();
        assert!((ox - 0.2).abs() < 1e-5);
        assert!((oy - 0.1).abs() < 1e-5);
        assert!((os + 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_suppress_duplicates_keeps_stronger() {
        let make = |x: f32, response: f32, class_id: usize| Keypoint {
            x,
            y: 10.0,
            size: 4.0,
            angle: 0.0,
            response,
            octave: 0,
            class_id,
        };
        let merged = suppress_duplicates(vec![
            make(10.0, 0.5, 1),
            make(10.5, 0.9, 2),
            make(30.0, 0.4, 1),
        ]);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|k| k.response == 0.9));
        assert!(merged.iter().all(|k| k.response != 0.5));
    }

    #[test]
    fn test_suppress_duplicates_ignores_distant_levels() {
        let make = |class_id: usize, response: f32| Keypoint {
            x: 10.0,
            y: 10.0,
            size: 4.0,
            angle: 0.0,
            response,
            octave: 0,
            class_id,
        };
        // Same position but three sublevels apart: both survive
        let merged = suppress_duplicates(vec![make(0, 0.5), make(3, 0.9)]);
        assert_eq!(merged.len(), 2);
    }
}
