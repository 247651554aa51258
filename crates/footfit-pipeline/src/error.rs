//! Error taxonomy and terminal task results.
//!
//! Every stage failure is caught at the coordinator boundary, tagged with
//! the stage it occurred in, and converted into a terminal [`TaskResult`];
//! no error escapes the per-task boundary into shared process state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use footfit_core::Real;
use footfit_models::{CollaboratorError, ContractError, MeasureError};

use crate::storage::StorageError;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Fetching inputs from storage.
    Fetching,
    /// Foreground segmentation inference.
    Segmenting,
    /// Surface-normal inference.
    Estimating,
    /// Assembling the fitting batch.
    BuildingBatch,
    /// Mesh-fitting optimization.
    Fitting,
    /// Deriving the measurement from keypoints.
    Measuring,
    /// Writing results to storage.
    Persisting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::Segmenting => "segmenting",
            Stage::Estimating => "estimating",
            Stage::BuildingBatch => "building_batch",
            Stage::Fitting => "fitting",
            Stage::Measuring => "measuring",
            Stage::Persisting => "persisting",
        };
        write!(f, "{name}")
    }
}

/// Failure class, as reported in the terminal [`TaskResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Storage or input-layout problem while fetching.
    Fetch,
    /// A model collaborator failed.
    Inference,
    /// An inter-stage invariant was broken.
    ContractViolation,
    /// Mesh fitting failed or produced an unusable mesh.
    Fitting,
    /// A required keypoint was missing.
    Measurement,
    /// Results could not be written.
    Persist,
    /// The task exceeded its deadline.
    Timeout,
}

/// Failure while assembling a task's inputs.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The storage layer failed (after retries).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// The task folder holds no images at all.
    #[error("task `{0}` has no input images")]
    EmptyTask(String),
    /// An image has no matching capture record.
    #[error("image `{0}` has no matching capture record")]
    MissingCapture(String),
    /// A capture record has no matching image.
    #[error("capture record `{0}` has no matching image")]
    MissingImage(String),
    /// An image payload could not be decoded.
    #[error("failed to decode image `{name}`: {cause}")]
    ImageDecode {
        /// Object name.
        name: String,
        /// Decoder message.
        cause: String,
    },
    /// A capture record could not be parsed.
    #[error("failed to parse capture record `{name}`: {cause}")]
    CaptureParse {
        /// Object name.
        name: String,
        /// Parser message.
        cause: String,
    },
    /// A capture record contains NaN or infinite values.
    #[error("capture record `{0}` contains non-finite values")]
    NonFiniteCapture(String),
}

/// Any failure terminating a task.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input assembly failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    /// An inference collaborator failed; `stage` says which.
    #[error("{stage} failed: {cause}")]
    Inference {
        /// Which inference stage failed.
        stage: Stage,
        /// The collaborator's report.
        cause: CollaboratorError,
    },
    /// An inter-stage data contract was violated.
    #[error(transparent)]
    Contract(#[from] ContractError),
    /// Mesh fitting failed.
    #[error("mesh fitting failed: {0}")]
    Fitting(String),
    /// Measurement derivation failed.
    #[error(transparent)]
    Measurement(#[from] MeasureError),
    /// Result persistence failed.
    #[error("failed to persist results: {0}")]
    Persist(String),
    /// The task exceeded its deadline.
    #[error("task exceeded deadline of {0} ms")]
    Timeout(u64),
}

impl PipelineError {
    /// The stage this failure is attributed to, if any. A timeout has no
    /// single stage: it aborts whatever was running.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Fetch(_) => Some(Stage::Fetching),
            PipelineError::Inference { stage, .. } => Some(*stage),
            PipelineError::Contract(_) => Some(Stage::BuildingBatch),
            PipelineError::Fitting(_) => Some(Stage::Fitting),
            PipelineError::Measurement(_) => Some(Stage::Measuring),
            PipelineError::Persist(_) => Some(Stage::Persisting),
            PipelineError::Timeout(_) => None,
        }
    }

    /// The failure class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Fetch(_) => ErrorKind::Fetch,
            PipelineError::Inference { .. } => ErrorKind::Inference,
            PipelineError::Contract(_) => ErrorKind::ContractViolation,
            PipelineError::Fitting(_) => ErrorKind::Fitting,
            PipelineError::Measurement(_) => ErrorKind::Measurement,
            PipelineError::Persist(_) => ErrorKind::Persist,
            PipelineError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

/// Terminal task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// The task produced a measurement.
    Completed,
    /// The task failed at some stage.
    Error,
}

/// Terminal record for one task. Created at pipeline end, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Task identifier.
    pub id: String,
    /// Terminal status.
    pub status: TaskStatus,
    /// Foot length in world units, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foot_size: Option<Real>,
    /// Opaque handle to the persisted mesh, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<String>,
    /// Failure class, on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    /// Stage the failure occurred in, on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Human-readable failure description, on error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    /// Successful terminal record.
    pub fn completed(id: impl Into<String>, foot_size: Real, mesh: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Completed,
            foot_size: Some(foot_size),
            mesh: Some(mesh.into()),
            kind: None,
            stage: None,
            error: None,
        }
    }

    /// Failed terminal record tagged with the failure's stage and class.
    pub fn failed(id: impl Into<String>, err: &PipelineError) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Error,
            foot_size: None,
            mesh: None,
            kind: Some(err.kind()),
            stage: err.stage(),
            error: Some(err.to_string()),
        }
    }

    /// Whether the task completed with a measurement.
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}
