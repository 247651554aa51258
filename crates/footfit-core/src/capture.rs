//! Device capture records.
//!
//! A capture record is the per-image pose + intrinsics the mobile AR
//! subsystem writes next to each photograph. It is read once and never
//! mutated; all downstream camera parameters are derived from it by
//! [`transform`](crate::camera::transform).

use serde::{Deserialize, Serialize};

use crate::math::{Real, Vec2};

/// Per-image camera pose and intrinsics as reported by the capture device.
///
/// Position is in world units, angles are radians applied about the fixed
/// world axes in X-then-Y-then-Z order, and intrinsics are in pixels at the
/// original sensor resolution. Field names match the on-disk JSON exactly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCapture {
    /// World-space camera center, X component.
    pub x: Real,
    /// World-space camera center, Y component.
    pub y: Real,
    /// World-space camera center, Z component.
    pub z: Real,
    /// Rotation about the X axis (radians).
    pub angle_x: Real,
    /// Rotation about the Y axis (radians).
    pub angle_y: Real,
    /// Rotation about the Z axis (radians).
    pub angle_z: Real,
    /// Focal length in sensor pixels.
    pub fx: Real,
    /// Horizontal sensor origin offset in pixels.
    pub ox: Real,
    /// Vertical sensor origin offset in pixels.
    pub oy: Real,
}

impl RawCapture {
    /// Whether every field is a finite number.
    ///
    /// The camera transform is total over finite input but propagates
    /// NaN/Inf otherwise; callers check this before trusting the result.
    pub fn is_finite(&self) -> bool {
        [
            self.x,
            self.y,
            self.z,
            self.angle_x,
            self.angle_y,
            self.angle_z,
            self.fx,
            self.ox,
            self.oy,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Image dimensions in pixels, `(width, height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Size {
    /// Create a size from width and height in pixels.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Elementwise scale factor taking this size to `target`.
    pub fn scale_to(&self, target: Size) -> Vec2 {
        Vec2::new(
            Real::from(target.width) / Real::from(self.width),
            Real::from(target.height) / Real::from(self.height),
        )
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
