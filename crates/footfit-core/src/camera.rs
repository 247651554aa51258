//! Capture-to-renderer camera frame conversion.
//!
//! The capture device reports pose in its own landscape-oriented frame; the
//! mesh-fitting renderer expects a portrait, world-to-camera convention with
//! a different axis ordering. [`transform`] is the fixed conjugation recipe
//! between the two. It is deterministic, allocation-free, and total over
//! finite input; the composition order below is load-bearing because
//! rotations do not commute.

use serde::{Deserialize, Serialize};

use crate::capture::{RawCapture, Size};
use crate::math::{
    device_to_renderer, euler_xyz, rotate_180_z, rotate_90_x, rotate_neg90_z, Mat3, Real, Vec2,
    Vec3,
};

/// World-to-camera record in the renderer convention.
///
/// `rotation` is orthonormal with determinant +1 for any finite capture,
/// because it is a product of rotation matrices only. `pp` and `f` are in
/// target-resolution pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraRecord {
    /// World-to-camera rotation.
    pub rotation: Mat3,
    /// World-to-camera translation, `T = -R · C`.
    pub translation: Vec3,
    /// Principal point in target-resolution pixels (portrait order).
    pub pp: Vec2,
    /// Focal length in target-resolution pixels.
    pub f: Real,
    /// Source image this record belongs to.
    pub filename: String,
    /// False when the source capture contained non-finite values; such a
    /// record must not reach the fitting stage.
    pub valid: bool,
}

impl CameraRecord {
    /// Return a copy with `pp` and `f` multiplied by `factor`.
    ///
    /// Intrinsics are defined relative to a resolution; whenever the image
    /// data is resampled the intrinsics must be rescaled by the same ratio.
    pub fn with_rescaled_intrinsics(&self, factor: Real) -> CameraRecord {
        CameraRecord {
            pp: self.pp * factor,
            f: self.f * factor,
            ..self.clone()
        }
    }
}

/// Ordered camera records, one per source image.
///
/// Index-aligned with the image fetch order and with every downstream
/// per-image tensor; `cameras.len() == images.len()` must hold before any
/// stage consumes it.
pub type CameraSet = Vec<CameraRecord>;

/// Convert one device capture record into a renderer camera record.
///
/// Steps, in order:
/// 1. scale intrinsics by `target/source`; the principal point takes the
///    *vertical* sensor offset first (`pp = (oy, ox) * scale`) because the
///    sensor axis order differs from the image axis order. The swap is the
///    renderer's convention, do not "fix" it;
/// 2. rotate the camera center by 90° about X (and 180° about Z when
///    `flip_z`);
/// 3. build the rotation from the device Euler angles, remap handedness via
///    `diag(-1, 1, -1)`, apply the landscape-to-portrait correction, then
///    mirror the center rotations so orientation and position stay
///    consistent;
/// 4. derive the world-to-camera translation `T = -R · C`.
///
/// `flip_z` resolves a depth-axis sign ambiguity between capture setups; it
/// is a per-deployment configuration choice, never a per-image one.
pub fn transform(
    raw: &RawCapture,
    source_size: Size,
    target_size: Size,
    flip_z: bool,
    filename: impl Into<String>,
) -> CameraRecord {
    let scale = source_size.scale_to(target_size);

    let pp = Vec2::new(raw.oy * scale.x, raw.ox * scale.y);
    let f = raw.fx * scale.x;

    // World-space camera center, moved into the renderer frame.
    let mut c = Vec3::new(raw.x, raw.y, raw.z);
    c = rotate_90_x() * c;
    if flip_z {
        c = rotate_180_z() * c;
    }

    // World-to-camera rotation in the renderer frame.
    let mut r = device_to_renderer() * euler_xyz(raw.angle_x, raw.angle_y, raw.angle_z).transpose();

    // Landscape-to-portrait correction for the sensor's native orientation.
    r = (r.transpose() * rotate_neg90_z()).transpose();

    // Mirror the camera-center rotations from step 2.
    r = (rotate_90_x() * r.transpose()).transpose();
    if flip_z {
        r = (rotate_180_z() * r.transpose()).transpose();
    }

    let translation = -r * c;

    CameraRecord {
        rotation: r,
        translation,
        pp,
        f,
        filename: filename.into(),
        valid: raw.is_finite(),
    }
}

/// Convert a batch of capture records, preserving their order.
pub fn transform_all(
    captures: &[(String, RawCapture)],
    source_size: Size,
    target_size: Size,
    flip_z: bool,
) -> CameraSet {
    captures
        .iter()
        .map(|(name, raw)| transform(raw, source_size, target_size, flip_z, name.clone()))
        .collect()
}
