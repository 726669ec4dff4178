//! Pan / zoom / aspect crop policy.
//!
//! Pure function of the mirror texture size and the crop inputs. The
//! acquisition handshake calls [`compute_geometry`] once it knows the real
//! texture size; nothing here touches the GPU.

use crate::types::{AspectPolicy, CropRect, Eye, Geometry, TextureSize};

/// Inputs to the crop policy, as configured on a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropParams {
    pub eye: Eye,
    pub scale_factor: f64,
    pub x_offset: i32,
    pub y_offset: i32,
    pub aspect: AspectPolicy,
}

impl Default for CropParams {
    fn default() -> Self {
        Self {
            eye: Eye::Right,
            scale_factor: 1.0,
            x_offset: 0,
            y_offset: 0,
            aspect: AspectPolicy::Native,
        }
    }
}

/// Zoom factor actually applied. Anything below 1.0 (or NaN) means "no zoom".
pub fn effective_scale(scale_factor: f64) -> f64 {
    if scale_factor >= 1.0 { scale_factor } else { 1.0 }
}

/// Size of the zoomed window before aspect cropping.
pub fn scaled_size(device: TextureSize, scale_factor: f64) -> TextureSize {
    let s = effective_scale(scale_factor);
    TextureSize::new(
        (device.width as f64 / s) as u32,
        (device.height as f64 / s) as u32,
    )
}

/// Pan origin: the left eye starts from the right-hand edge of the texture.
pub fn pan_origin(eye: Eye, device: TextureSize, scaled: TextureSize) -> (i64, i64) {
    match eye {
        Eye::Left => (device.width as i64 - scaled.width as i64, 0),
        Eye::Right => (0, 0),
    }
}

/// Horizontal offset as applied; negated for the left eye so a positive
/// offset pans the same visual direction on both eyes.
pub fn signed_x_offset(eye: Eye, x_offset: i32) -> i64 {
    match eye {
        Eye::Left => -(x_offset as i64),
        Eye::Right => x_offset as i64,
    }
}

/// Shrink one side of `scaled` so that width/height matches `aspect`.
pub fn apply_aspect(scaled: TextureSize, aspect: AspectPolicy) -> TextureSize {
    let Some(target) = aspect.target_ratio() else {
        return scaled;
    };
    if scaled.is_empty() {
        return scaled;
    }

    let input = scaled.width as f64 / scaled.height as f64;
    let mut out = scaled;
    if input > target {
        out.width = ((scaled.height as f64 * target) as u32).min(scaled.width);
    } else if input < target {
        out.height = ((scaled.width as f64 / target) as u32).min(scaled.height);
    }
    out
}

/// Compute the crop rectangle for a mirror texture of `device` size.
///
/// The result always satisfies `crop.right() <= device.width` and
/// `crop.bottom() <= device.height`, whatever the offsets.
pub fn compute_geometry(device: TextureSize, params: &CropParams) -> Geometry {
    let scaled = scaled_size(device, params.scale_factor);
    let size = apply_aspect(scaled, params.aspect);

    let (origin_x, origin_y) = pan_origin(params.eye, device, scaled);
    let x = origin_x + signed_x_offset(params.eye, params.x_offset);
    let y = origin_y + params.y_offset as i64;

    let max_x = device.width as i64 - size.width as i64;
    let max_y = device.height as i64 - size.height as i64;

    Geometry {
        crop: CropRect {
            x: x.clamp(0, max_x.max(0)) as u32,
            y: y.clamp(0, max_y.max(0)) as u32,
            width: size.width,
            height: size.height,
        },
        device,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(eye: Eye, scale: f64, aspect: AspectPolicy) -> CropParams {
        CropParams { eye, scale_factor: scale, aspect, ..CropParams::default() }
    }

    #[test]
    fn half_zoom_on_square_texture() {
        let g = compute_geometry(
            TextureSize::new(1000, 1000),
            &params(Eye::Right, 2.0, AspectPolicy::Native),
        );
        assert_eq!(g.crop, CropRect { x: 0, y: 0, width: 500, height: 500 });
        assert_eq!(g.device, TextureSize::new(1000, 1000));
    }

    #[test]
    fn matching_fixed_ratio_leaves_texture_untouched() {
        let g = compute_geometry(
            TextureSize::new(1920, 1080),
            &params(Eye::Left, 1.0, AspectPolicy::Fixed(16.0 / 9.0)),
        );
        assert_eq!(g.crop, CropRect { x: 0, y: 0, width: 1920, height: 1080 });
    }

    #[test]
    fn four_three_crop_shrinks_width_only() {
        let g = compute_geometry(
            TextureSize::new(1920, 1080),
            &params(Eye::Right, 1.0, AspectPolicy::Fixed(4.0 / 3.0)),
        );
        assert_eq!(g.crop.width, 1440);
        assert_eq!(g.crop.height, 1080);
        assert!(g.crop.x <= 480);
    }

    #[test]
    fn left_eye_pans_from_right_edge() {
        let g = compute_geometry(
            TextureSize::new(1000, 1000),
            &params(Eye::Left, 2.0, AspectPolicy::Native),
        );
        assert_eq!(g.crop.x, 500);
    }

    #[test]
    fn tall_target_shrinks_height() {
        let g = compute_geometry(
            TextureSize::new(1000, 1000),
            &params(Eye::Right, 1.0, AspectPolicy::Fixed(2.0)),
        );
        assert_eq!(g.crop.width, 1000);
        assert_eq!(g.crop.height, 500);
    }

    #[test]
    fn sub_unit_scale_is_clamped() {
        let g = compute_geometry(
            TextureSize::new(640, 480),
            &params(Eye::Right, 0.25, AspectPolicy::Native),
        );
        assert_eq!(g.crop.size(), TextureSize::new(640, 480));
    }

    #[test]
    fn huge_offsets_are_clamped_into_texture() {
        let device = TextureSize::new(64, 48);
        for (x_offset, y_offset) in [(10_000, 10_000), (-10_000, -10_000), (10_000, -10_000)] {
            for eye in [Eye::Left, Eye::Right] {
                let p = CropParams { eye, scale_factor: 2.0, x_offset, y_offset, ..CropParams::default() };
                let g = compute_geometry(device, &p);
                assert!(g.crop.fits_within(device), "{eye} {x_offset} {y_offset}: {g}");
            }
        }
    }

    #[test]
    fn left_offset_matches_negated_right_offset_modulo_origin() {
        let device = TextureSize::new(1000, 1000);
        let aspect = AspectPolicy::Fixed(0.5);
        let left = compute_geometry(
            device,
            &CropParams { eye: Eye::Left, scale_factor: 2.0, x_offset: -100, aspect, ..CropParams::default() },
        );
        let right = compute_geometry(
            device,
            &CropParams { eye: Eye::Right, scale_factor: 2.0, x_offset: 100, aspect, ..CropParams::default() },
        );
        let (origin, _) = pan_origin(Eye::Left, device, scaled_size(device, 2.0));
        assert_eq!(left.crop.x as i64 - origin, right.crop.x as i64);
        assert_eq!(left.crop.size(), right.crop.size());
    }

    #[test]
    fn empty_texture_yields_empty_crop() {
        let g = compute_geometry(TextureSize::new(0, 0), &CropParams::default());
        assert_eq!(g.crop, CropRect::default());
    }
}
