//! Capability traits wrapping the perception models.
//!
//! Each trait is implemented by a GPU-resident model loaded once before the
//! process starts serving. Implementations are not re-entrant: methods take
//! `&mut self`, and the coordinator serializes cross-task access behind one
//! mutex per collaborator. Traits are object-safe so the models can be
//! injected as `Arc<Mutex<dyn ...>>`.

use image::RgbImage;
use thiserror::Error;

use crate::batch::FittingBatch;
use crate::maps::{KappaMap, NormalMap, SilhouetteMask};
use crate::mesh::{FootMesh, MeshKeypoints};

/// Failure reported by a model collaborator.
///
/// These are deterministic or resource failures; the pipeline never retries
/// them.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    /// Model execution failed (backend error, resource exhaustion, panic).
    #[error("model execution failed: {0}")]
    Execution(String),
    /// The optimizer finished without converging to a usable solution.
    #[error("optimization did not converge: {0}")]
    NonConvergence(String),
}

/// Normal map with its per-pixel concentration.
#[derive(Debug, Clone)]
pub struct SurfaceNormalPrediction {
    /// RGB-encoded normals in `[0, 1]`, `(H, W, 3)`.
    pub normal: NormalMap,
    /// Concentration map, `(H, W)`.
    pub kappa: KappaMap,
}

/// Foreground segmentation model.
///
/// Prompted with one positive seed point (a construction-time setting, in
/// prediction-resolution pixels); returns the highest-confidence proposal
/// per image as a binary mask, index-aligned with the input.
pub trait Segmenter: Send {
    /// Segment the foot in each image.
    fn segment(&mut self, images: &[RgbImage]) -> Result<Vec<SilhouetteMask>, CollaboratorError>;
}

/// Surface-normal and uncertainty estimation model.
pub trait NormalEstimator: Send {
    /// Predict a normal map and kappa map per image, index-aligned with the
    /// input.
    fn estimate(
        &mut self,
        images: &[RgbImage],
    ) -> Result<Vec<SurfaceNormalPrediction>, CollaboratorError>;
}

/// Result of a mesh-fitting run.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// The fitted triangle mesh.
    pub mesh: FootMesh,
    /// Named keypoints on the fitted mesh.
    pub keypoints: MeshKeypoints,
}

/// Differentiable mesh-fitting optimizer.
///
/// Runs its configured gradient-descent stages against the batch; stage
/// list, loss weights, and iteration counts are the fitter's own
/// configuration, not the caller's concern.
pub trait MeshFitter: Send {
    /// Fit the template mesh to the batch and return it with its keypoints.
    fn fit(&mut self, batch: &FittingBatch) -> Result<FitOutcome, CollaboratorError>;
}
