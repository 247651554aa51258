//! Mathematical type definitions and fixed rotations.
//!
//! The rotation constants below are the building blocks of the
//! capture-to-renderer frame conversion. All of them are proper rotations
//! (orthonormal, determinant +1), so any product of them is one as well.

use nalgebra::{Matrix3, Point3, Rotation3, Vector2, Vector3};

/// Scalar type used throughout the library (currently `f64`).
pub type Real = f64;

/// 2D vector with [`Real`] components.
pub type Vec2 = Vector2<Real>;
/// 3D vector with [`Real`] components.
pub type Vec3 = Vector3<Real>;
/// 3D point with [`Real`] coordinates.
pub type Pt3 = Point3<Real>;
/// 3×3 matrix with [`Real`] entries.
pub type Mat3 = Matrix3<Real>;

/// 90° rotation about the X axis.
pub fn rotate_90_x() -> Mat3 {
    Mat3::new(
        1.0, 0.0, 0.0, //
        0.0, 0.0, -1.0, //
        0.0, 1.0, 0.0,
    )
}

/// −90° rotation about the Z axis.
pub fn rotate_neg90_z() -> Mat3 {
    Mat3::new(
        0.0, 1.0, 0.0, //
        -1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0,
    )
}

/// 180° rotation about the Z axis.
pub fn rotate_180_z() -> Mat3 {
    Mat3::new(
        -1.0, 0.0, 0.0, //
        0.0, -1.0, 0.0, //
        0.0, 0.0, 1.0,
    )
}

/// Change of basis from the capture device's coordinate frame to the
/// renderer's: `diag(-1, 1, -1)`, a 180° rotation about Y.
pub fn device_to_renderer() -> Mat3 {
    Mat3::from_diagonal(&Vec3::new(-1.0, 1.0, -1.0))
}

/// Rotation from Euler angles applied about the fixed world axes in
/// X-then-Y-then-Z order: `Rz(az) · Ry(ay) · Rx(ax)`.
///
/// This is the order the capture device reports orientation in; it matches
/// `Rotation3::from_euler_angles(roll, pitch, yaw)`.
pub fn euler_xyz(angle_x: Real, angle_y: Real, angle_z: Real) -> Mat3 {
    Rotation3::from_euler_angles(angle_x, angle_y, angle_z).into_inner()
}
