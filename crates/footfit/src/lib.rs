//! High-level entry crate for the `footfit` toolbox.
//!
//! `footfit` turns a set of calibrated foot photographs (images plus the
//! capture device's per-image pose and intrinsics) into a fitted 3D mesh
//! and a scalar foot-length measurement.
//!
//! ## Running a task
//!
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use footfit::pipeline::{FsTaskStore, PipelineCoordinator};
//! use footfit::core::PipelineConfig;
//! # use footfit::models::{Segmenter, NormalEstimator, MeshFitter};
//!
//! # async fn example(
//! #     segmenter: Arc<Mutex<dyn Segmenter>>,
//! #     estimator: Arc<Mutex<dyn NormalEstimator>>,
//! #     fitter: Arc<Mutex<dyn MeshFitter>>,
//! # ) {
//! // flip_z is a per-deployment choice; there is no default.
//! let config = Arc::new(PipelineConfig::with_flip_z(true));
//! let store = Arc::new(FsTaskStore::new("/data", config.retry));
//!
//! let coordinator = PipelineCoordinator::new(config, store, segmenter, estimator, fitter);
//! let result = coordinator.run("3b2f…").await;
//! println!("foot size: {:?}", result.foot_size);
//! # }
//! ```
//!
//! ## Module organization
//!
//! - **[`core`]**: math aliases, capture records, the camera-frame
//!   transform, and configuration
//! - **[`models`]**: map tensors, collaborator traits, prediction/batch
//!   contracts, mesh types, and the measurement
//! - **[`pipeline`]**: the per-request coordinator, storage boundary, and
//!   error taxonomy
//! - **[`prelude`]**: convenient re-exports for common use cases

/// Math aliases, capture records, camera transform, and configuration.
pub mod core {
    pub use footfit_core::*;
}

/// Map tensors, collaborator traits, batch contracts, mesh types, and the
/// foot-length measurement.
pub mod models {
    pub use footfit_models::*;
}

/// Per-request coordinator, storage boundary, and error taxonomy.
pub mod pipeline {
    pub use footfit_pipeline::*;
}

/// Convenient re-exports for common use cases.
pub mod prelude {
    pub use crate::core::{
        transform, CameraRecord, CameraSet, PipelineConfig, RawCapture, Size,
    };
    pub use crate::models::{
        build_fitting_batch, foot_length, FitOutcome, FittingBatch, FootMesh, MeshFitter,
        MeshKeypoints, NormalEstimator, PredictionSet, Segmenter,
    };
    pub use crate::pipeline::{
        FsTaskStore, PipelineCoordinator, TaskResult, TaskStatus, TaskStore,
    };
}
