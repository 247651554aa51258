//! Model-facing contracts for the `footfit` pipeline.
//!
//! This crate defines everything that crosses the boundary between the
//! pipeline coordinator and the GPU-resident perception models:
//! - per-image map tensors (normal, kappa, silhouette),
//! - the capability traits the models are wrapped behind
//!   ([`Segmenter`], [`NormalEstimator`], [`MeshFitter`]),
//! - the merged [`PredictionSet`] and renderer-ready [`FittingBatch`]
//!   contracts with their build rules,
//! - the fitted mesh, its named keypoints, and the foot-length measurement.
//!
//! The models' internals live elsewhere; only their inputs and outputs are
//! specified here.

/// Prediction and fitting-batch contracts.
pub mod batch;
/// Capability traits wrapping the perception models.
pub mod collaborators;
/// Per-image map tensors and resampling.
pub mod maps;
/// Foot-length measurement over mesh keypoints.
pub mod measure;
/// Fitted mesh and named keypoints.
pub mod mesh;

pub use batch::*;
pub use collaborators::*;
pub use maps::*;
pub use measure::*;
pub use mesh::*;
