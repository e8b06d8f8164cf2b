//! Cascade split distances
//!
//! Uses the practical split scheme, blending logarithmic and uniform
//! distributions:
//! - lambda = 0: uniform splits (constant world-space depth per cascade)
//! - lambda = 1: logarithmic splits (constant screen-space texel density)
//! - lambda = 0.5: balanced (recommended default)

use crate::MAX_CASCADES;

/// Smallest near plane accepted; logarithmic splits need near > 0
const MIN_NEAR: f32 = 1e-4;

/// Compute `cascade_count + 1` split distances between `near` and `far`
///
/// The first entry is exactly `near` and the last exactly `far`. Inputs are
/// sanitised rather than rejected: the count is clamped to
/// `[1, MAX_CASCADES]`, lambda to `[0, 1]`, near is forced positive and far
/// is forced beyond near.
pub fn compute_splits(cascade_count: u32, near: f32, far: f32, lambda: f32) -> Vec<f32> {
    let count = cascade_count.clamp(1, MAX_CASCADES as u32) as usize;
    let lambda = if lambda.is_nan() { 0.5 } else { lambda.clamp(0.0, 1.0) };
    let near = if near.is_finite() && near > MIN_NEAR { near } else { MIN_NEAR };
    let far = if far.is_finite() && far > near {
        far
    } else {
        log::debug!("Cascade far {far} not beyond near {near}, extending");
        near + 1.0
    };

    let mut splits = Vec::with_capacity(count + 1);
    splits.push(near);

    for i in 1..count {
        let p = i as f32 / count as f32;
        let log_split = near * (far / near).powf(p);
        let uniform_split = near + (far - near) * p;
        splits.push(lambda * log_split + (1.0 - lambda) * uniform_split);
    }

    splits.push(far);
    splits
}

/// Get the cascade index for a given view-space depth
pub fn cascade_for_depth(splits: &[f32], view_depth: f32) -> usize {
    let count = splits.len().saturating_sub(1);
    if count == 0 {
        return 0;
    }
    (0..count)
        .find(|&i| view_depth < splits[i + 1])
        .unwrap_or(count - 1)
}

/// Get the cascade and how far `view_depth` is into the blend band at its
/// far edge
///
/// Returns (cascade_index, blend_factor) where blend_factor is 0-1
/// indicating how much to blend with the next cascade.
pub fn cascade_blend(splits: &[f32], view_depth: f32, blend_distance: f32) -> (usize, f32) {
    let cascade = cascade_for_depth(splits, view_depth);
    let count = splits.len().saturating_sub(1);

    if cascade + 1 >= count || blend_distance <= 0.0 {
        return (cascade, 0.0);
    }

    let blend_start = splits[cascade + 1] - blend_distance;
    if view_depth > blend_start {
        let blend = (view_depth - blend_start) / blend_distance;
        (cascade, blend.clamp(0.0, 1.0))
    } else {
        (cascade, 0.0)
    }
}
