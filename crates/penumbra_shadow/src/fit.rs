//! Light-space fitting of one cascade
//!
//! Builds an orthographic projection around the cascade's casters, then
//! crops it so the tight caster/receiver volume fills the canonical clip
//! box `[-1,1] x [-1,1] x [0,1]`. The crop is folded back into the view
//! and projection through an offset matrix so the view keeps the light's
//! rotation and the projection stays a pure scale.
//!
//! Conventions: right-handed, column vectors, depth increases along the
//! light's travel direction before the final reversed-Z remap.

use glam::{Mat4, Vec2, Vec3, Vec4};
use penumbra_math::{Frustum, AABB};

use crate::culler::Caster;

/// Minimum clip-space extent of the caster box on any axis
pub const MIN_CLIP_EXTENT: f32 = 0.1;

/// Clip depth a candidate may start in front of the near plane without
/// forcing a second crop
const DEPTH_TOLERANCE: f32 = 1e-5;

/// Smallest light near plane; an orthographic volume needs `far > near > 0`
pub const MIN_NEAR_PLANE: f32 = 1e-3;

/// Remaps depth `z` to `1 - z`
pub const REVERSE_Z: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, -1.0, 0.0),
    Vec4::new(0.0, 0.0, 1.0, 1.0),
);

/// The volume a cropped projection maps its target box onto
pub const CANONICAL_CLIP: AABB = AABB::new(Vec3::new(-1.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 1.0));

/// Light-space transforms of one cascade
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeTransform {
    pub view: Mat4,
    /// Reversed-Z projection
    pub projection: Mat4,
    /// `projection * view`
    pub view_projection: Mat4,
    /// World-space size of one shadow map texel
    pub texel_size: Vec2,
}

impl Default for CascadeTransform {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            texel_size: Vec2::ZERO,
        }
    }
}

/// Parameters of a fit that do not change between cascades
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitSettings {
    /// Light projection near plane
    pub near_plane: f32,
    /// Shadow map size in texels
    pub resolution: u32,
}

/// Result of fitting one cascade
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CascadeFit {
    pub transform: CascadeTransform,
    /// Casters to draw; empty means the cascade is not drawn
    pub casters: Vec<Caster>,
    /// Whether the second crop pass ran
    pub corrected: bool,
}

/// Fit the light projection of one cascade
///
/// `casters` are the swept casters of `split`. `candidates` is every
/// renderable subset in the frame; after cropping, any candidate that
/// overlaps the cascade in X/Y but starts in front of the near plane
/// triggers one extra depth crop, and the caster list is rebuilt from the
/// candidates under the corrected transform. The correction is not
/// iterated.
pub fn fit_cascade(
    split: &Frustum,
    casters: Vec<Caster>,
    candidates: &[Caster],
    light_view: Mat4,
    settings: FitSettings,
) -> CascadeFit {
    let split_light = split.transform(&light_view).aabb();
    let caster_light = if casters.is_empty() {
        split_light
    } else {
        casters
            .iter()
            .fold(AABB::EMPTY, |acc, c| acc.union(&c.bounds.transform(&light_view)))
    };

    let projection = base_projection(&caster_light, settings.near_plane);

    let split_clip = split_light.transform(&projection);
    let caster_clip = caster_light
        .transform(&projection)
        .pad_to_min_extent(MIN_CLIP_EXTENT);
    let crop_box = crop_bounds(&split_clip, &caster_clip);
    let (mut view, mut projection) = apply_crop(light_view, projection, &crop_matrix(&crop_box));

    let view_projection = projection * view;
    let violation = candidates
        .iter()
        .map(|c| c.bounds.transform(&view_projection))
        .filter(|clip| overlaps_xy(clip) && clip.min.z < -DEPTH_TOLERANCE)
        .fold(0.0f32, |z, clip| z.min(clip.min.z));

    let corrected = violation < 0.0;
    let casters = if corrected {
        let depth_box = AABB::new(Vec3::new(-1.0, -1.0, violation), Vec3::ONE);
        (view, projection) = apply_crop(view, projection, &crop_matrix(&depth_box));
        log::trace!("Cascade depth range extended to clip z {violation}");

        let view_projection = projection * view;
        candidates
            .iter()
            .filter(|c| c.bounds.transform(&view_projection).intersects(&CANONICAL_CLIP))
            .copied()
            .collect()
    } else {
        // A loose sweep keeps casters that only meet the frustum's box
        casters
            .into_iter()
            .filter(|c| overlaps_xy(&c.bounds.transform(&view_projection)))
            .collect()
    };

    let texel_size = texel_size(&projection, settings.resolution);
    let projection = REVERSE_Z * projection;

    CascadeFit {
        transform: CascadeTransform {
            view,
            projection,
            view_projection: projection * view,
            texel_size,
        },
        casters,
        corrected,
    }
}

/// Orthographic projection sized to a light-space box
///
/// The +1 pad keeps the volume open when the light grazes a flat caster.
fn base_projection(bounds: &AABB, near: f32) -> Mat4 {
    let near = near.max(MIN_NEAR_PLANE);
    let size = bounds.size();
    let half_width = (size.x + 1.0) * 0.5;
    let half_height = (size.y + 1.0) * 0.5;
    let mut far = size.z + near;
    if far - near < near {
        far += near;
    }
    Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, near, far)
}

/// Box the crop targets: caster X/Y clipped to the split, caster near
/// depth through split far depth
fn crop_bounds(split: &AABB, casters: &AABB) -> AABB {
    let mut min = split.min.max(casters.min);
    let mut max = split.max.min(casters.max);
    for axis in 0..2 {
        if max[axis] - min[axis] <= f32::EPSILON {
            min[axis] = split.min[axis];
            max[axis] = split.max[axis];
        }
    }

    min.z = casters.min.z;
    max.z = split.max.z;
    if max.z - min.z <= f32::EPSILON {
        min.z = split.min.z;
        max.z = split.max.z;
    }
    AABB::new(min, max)
}

/// Map `bounds` to `[-1,1]` on X/Y and `[0,1]` on Z
pub fn crop_matrix(bounds: &AABB) -> Mat4 {
    let size = bounds.size();
    let scale = Vec3::new(2.0 / size.x, 2.0 / size.y, 1.0 / size.z);
    let offset = Vec3::new(
        -(bounds.max.x + bounds.min.x) / size.x,
        -(bounds.max.y + bounds.min.y) / size.y,
        -bounds.min.z * scale.z,
    );
    Mat4::from_cols(
        Vec4::new(scale.x, 0.0, 0.0, 0.0),
        Vec4::new(0.0, scale.y, 0.0, 0.0),
        Vec4::new(0.0, 0.0, scale.z, 0.0),
        offset.extend(1.0),
    )
}

/// Fold `crop` into a view/projection pair
///
/// `M = Proj⁻¹ · Crop⁻¹ · Offset · Crop · Proj`, where `Offset` cancels the
/// translation of `Crop · Proj`. Then `view' = M⁻¹ · view` and
/// `proj' = Crop · Proj · M`, so `proj' · view' = Crop · Proj · view` while
/// `view'` only gains a translation.
pub fn apply_crop(view: Mat4, projection: Mat4, crop: &Mat4) -> (Mat4, Mat4) {
    let cropped = *crop * projection;
    let offset = Mat4::from_translation(-cropped.w_axis.truncate());
    let m = projection.inverse() * crop.inverse() * offset * cropped;
    (m.inverse() * view, cropped * m)
}

#[inline]
fn overlaps_xy(clip: &AABB) -> bool {
    clip.min.x <= 1.0 && clip.max.x >= -1.0 && clip.min.y <= 1.0 && clip.max.y >= -1.0
}

fn texel_size(projection: &Mat4, resolution: u32) -> Vec2 {
    let (sx, sy) = (projection.x_axis.x.abs(), projection.y_axis.y.abs());
    if resolution == 0 || sx <= f32::EPSILON || sy <= f32::EPSILON {
        return Vec2::ZERO;
    }
    Vec2::new(2.0 / sx, 2.0 / sy) / resolution as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SETTINGS: FitSettings = FitSettings {
        near_plane: 0.1,
        resolution: 1024,
    };

    fn sun_view() -> Mat4 {
        Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Y, Vec3::Z)
    }

    fn caster(renderable: usize, min: Vec3, max: Vec3) -> Caster {
        Caster {
            renderable,
            subset: 0,
            bounds: AABB::new(min, max),
        }
    }

    fn assert_mat_close(a: &Mat4, b: &Mat4, tolerance: f32) {
        assert!(a.abs_diff_eq(*b, tolerance), "{a:?}\n!=\n{b:?}");
    }

    #[test]
    fn test_reverse_z() {
        assert!((REVERSE_Z.project_point3(Vec3::new(0.3, 0.2, 0.0)).z - 1.0).abs() < 1e-6);
        assert!(REVERSE_Z.project_point3(Vec3::new(0.0, 0.0, 1.0)).z.abs() < 1e-6);
        assert_mat_close(&(REVERSE_Z * REVERSE_Z), &Mat4::IDENTITY, 1e-6);
    }

    #[test]
    fn test_crop_matrix_maps_box_to_canonical() {
        let bounds = AABB::new(Vec3::new(-0.2, 0.1, 0.25), Vec3::new(0.6, 0.5, 0.75));
        let crop = crop_matrix(&bounds);
        let mapped = bounds.transform(&crop);
        assert!((mapped.min - CANONICAL_CLIP.min).length() < 1e-5);
        assert!((mapped.max - CANONICAL_CLIP.max).length() < 1e-5);
    }

    #[test]
    fn test_apply_crop_keeps_view_rotation() {
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::new(0.3, -1.0, 0.2).normalize(), Vec3::Y);
        let projection = Mat4::orthographic_rh(-8.0, 8.0, -6.0, 6.0, 0.1, 40.0);
        let crop = crop_matrix(&AABB::new(Vec3::new(-0.5, -0.25, 0.2), Vec3::new(0.25, 0.75, 0.6)));

        let (new_view, new_projection) = apply_crop(view, projection, &crop);

        assert_mat_close(&(new_projection * new_view), &(crop * projection * view), 1e-4);
        // Rotation untouched, only a translation is added
        for (a, b) in [
            (new_view.x_axis, view.x_axis),
            (new_view.y_axis, view.y_axis),
            (new_view.z_axis, view.z_axis),
        ] {
            assert!(a.abs_diff_eq(b, 1e-5));
        }
        // Projection is a pure axis scale
        assert!(new_projection.w_axis.truncate().length() < 1e-4);
        assert!(new_projection.x_axis.y.abs() < 1e-6 && new_projection.y_axis.x.abs() < 1e-6);
    }

    #[test]
    fn test_empty_casters_fit_split_frustum() {
        let split = Frustum::from_perspective(
            &Mat4::look_at_rh(Vec3::new(0.0, 5.0, 10.0), Vec3::ZERO, Vec3::Y).inverse(),
            1.0,
            1.5,
            1.0,
            20.0,
        );
        let fit = fit_cascade(&split, Vec::new(), &[], sun_view(), SETTINGS);
        assert!(fit.casters.is_empty());
        assert!(!fit.corrected);

        let linear = REVERSE_Z * fit.transform.view_projection;
        for corner in split.corners() {
            let p = linear.project_point3(*corner);
            assert!(p.x.abs() <= 1.0 + 1e-4 && p.y.abs() <= 1.0 + 1e-4, "{p:?}");
            assert!(p.z >= -1e-4 && p.z <= 1.0 + 1e-4, "{p:?}");
        }
    }

    #[test]
    fn test_texel_size_matches_world_extent() {
        let split = Frustum::from_aabb(&AABB::new(Vec3::splat(-5.0), Vec3::splat(5.0)));
        let fit = fit_cascade(&split, Vec::new(), &[], sun_view(), SETTINGS);
        let expected = 10.0 / 1024.0;
        assert!((fit.transform.texel_size - Vec2::splat(expected)).length() < 1e-5);
    }

    #[test]
    fn test_reversed_depth_orders_casters() {
        let split = Frustum::from_aabb(&AABB::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 2.0, 5.0)));
        let casters = vec![caster(0, Vec3::new(-1.0, 8.0, -1.0), Vec3::new(1.0, 10.0, 1.0))];
        let fit = fit_cascade(&split, casters.clone(), &casters, sun_view(), SETTINGS);
        let vp = fit.transform.view_projection;

        // Top of the caster is nearest the light: depth 1 after reversal
        assert!((vp.project_point3(Vec3::new(0.0, 10.0, 0.0)).z - 1.0).abs() < 1e-4);
        // Bottom of the split is farthest: depth 0
        assert!(vp.project_point3(Vec3::new(0.0, 0.0, 0.0)).z.abs() < 1e-4);
        assert_eq!(fit.casters.len(), 1);
    }

    #[test]
    fn test_second_pass_pulls_in_clipped_candidate() {
        let split = Frustum::from_aabb(&AABB::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 2.0, 5.0)));
        let ground = caster(0, Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 1.0, 5.0));
        let overhead = caster(1, Vec3::new(-1.0, 40.0, -1.0), Vec3::new(1.0, 42.0, 1.0));
        let beside = caster(2, Vec3::new(50.0, 40.0, 50.0), Vec3::new(52.0, 42.0, 52.0));
        let candidates = [ground, overhead, beside];

        let fit = fit_cascade(&split, vec![ground], &candidates, sun_view(), SETTINGS);
        assert!(fit.corrected);
        let found: Vec<usize> = fit.casters.iter().map(|c| c.renderable).collect();
        assert_eq!(found, vec![0, 1]);

        let linear = REVERSE_Z * fit.transform.view_projection;
        assert!(overhead.bounds.transform(&linear).min.z >= -1e-4);
    }

    #[test]
    fn test_flat_caster_with_zero_near_plane() {
        let split = Frustum::from_aabb(&AABB::new(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 2.0, 5.0)));
        // Facing the light, so it has no depth in light space
        let flat = vec![caster(0, Vec3::new(-1.0, 3.0, -1.0), Vec3::new(1.0, 3.0, 1.0))];
        let settings = FitSettings {
            near_plane: 0.0,
            ..SETTINGS
        };

        let fit = fit_cascade(&split, flat.clone(), &flat, sun_view(), settings);
        assert!(!fit.transform.view_projection.is_nan());
        assert!(!fit.transform.view.is_nan());
        assert!(fit.transform.texel_size.is_finite());
        assert_eq!(fit.casters.len(), 1);

        let top = fit.transform.view_projection.project_point3(Vec3::new(0.0, 3.0, 0.0));
        assert!(top.z.is_finite() && top.x.abs() <= 1.0 + 1e-4);
    }

    #[test]
    fn test_fitter_containment() {
        for precise in [true, false] {
            check_containment(precise);
        }
    }

    fn check_containment(precise: bool) {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let camera = Mat4::look_at_rh(
                Vec3::new(rng.gen_range(-20.0..20.0), rng.gen_range(2.0..10.0), rng.gen_range(-20.0..20.0)),
                Vec3::new(rng.gen_range(-5.0..5.0), 0.0, rng.gen_range(-5.0..5.0)),
                Vec3::Y,
            );
            let near = rng.gen_range(0.5..5.0);
            let split = Frustum::from_perspective(&camera.inverse(), 1.0, 1.6, near, near + rng.gen_range(5.0..40.0));
            let direction = Vec3::new(rng.gen_range(-0.5..0.5), -1.0, rng.gen_range(-0.5..0.5)).normalize();
            let light_view = Mat4::look_to_rh(Vec3::ZERO, direction, Vec3::Y);

            let candidates: Vec<Caster> = (0..20)
                .map(|i| {
                    let center = Vec3::new(
                        rng.gen_range(-30.0..30.0),
                        rng.gen_range(0.0..20.0),
                        rng.gen_range(-30.0..30.0),
                    );
                    let half = Vec3::new(rng.gen_range(0.1..3.0), rng.gen_range(0.1..3.0), rng.gen_range(0.1..3.0));
                    Caster {
                        renderable: i,
                        subset: 0,
                        bounds: AABB::from_center_half_extents(center, half),
                    }
                })
                .collect();
            let casters = crate::culler::find_casters(&candidates, &split, direction, precise);

            let fit = fit_cascade(&split, casters, &candidates, light_view, SETTINGS);
            let linear = REVERSE_Z * fit.transform.view_projection;
            for caster in &fit.casters {
                let clip = caster.bounds.transform(&linear);
                assert!(clip.min.z >= -1e-3, "precise {precise}, caster clipped by near plane: {clip:?}");
                assert!(overlaps_xy(&clip), "precise {precise}, caster outside cascade: {clip:?}");
            }
        }
    }
}
