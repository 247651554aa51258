//! Core types for the `footfit` reconstruction pipeline.
//!
//! This crate contains:
//! - linear algebra type aliases (`Real`, `Vec2`, `Mat3`, ...) and the fixed
//!   rotation constants used by the camera-frame conversion,
//! - the device capture record ([`RawCapture`]) and image [`Size`],
//! - the deterministic capture-to-renderer camera transform ([`transform`])
//!   and the resulting [`CameraRecord`] / [`CameraSet`] contract,
//! - the immutable pipeline configuration ([`PipelineConfig`]).
//!
//! Camera convention: a [`CameraRecord`] maps world coordinates into the
//! renderer's camera frame as `x_cam = R * x_world + T`, with a portrait
//! principal point `pp` and focal length `f` in target-resolution pixels.

/// Camera records and the capture-to-renderer frame conversion.
pub mod camera;
/// Device capture records and image sizes.
pub mod capture;
/// Immutable pipeline configuration.
pub mod config;
/// Linear algebra type aliases and fixed rotations.
pub mod math;

pub use camera::*;
pub use capture::*;
pub use config::*;
pub use math::*;
