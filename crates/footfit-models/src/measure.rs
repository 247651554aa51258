//! Foot-length measurement over mesh keypoints.
//!
//! The fitted foot points along the positive primary (X) axis, so the
//! length is the signed difference of the big-toe and heel X coordinates.

use thiserror::Error;

use footfit_core::Real;

use crate::mesh::{MeshKeypoints, KEYPOINT_BIG_TOE, KEYPOINT_HEEL};

/// Failure to derive a measurement from the fitted keypoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeasureError {
    /// A required keypoint label is absent from the fitted mesh.
    #[error("keypoint `{0}` missing from fitted mesh")]
    MissingKeypoint(&'static str),
}

/// Foot length from the fitted keypoints: `big toe` X minus `heel` X.
pub fn foot_length(keypoints: &MeshKeypoints) -> Result<Real, MeasureError> {
    let big_toe = keypoints
        .get(KEYPOINT_BIG_TOE)
        .ok_or(MeasureError::MissingKeypoint(KEYPOINT_BIG_TOE))?;
    let heel = keypoints
        .get(KEYPOINT_HEEL)
        .ok_or(MeasureError::MissingKeypoint(KEYPOINT_HEEL))?;
    Ok(big_toe.x - heel.x)
}
