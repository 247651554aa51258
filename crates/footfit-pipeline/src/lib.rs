//! Per-request pipeline coordination for the `footfit` service.
//!
//! A [`PipelineCoordinator`] owns one task at a time: it fetches the task's
//! images and capture records from storage, normalizes the camera frames,
//! runs the two independent inference stages concurrently, builds the
//! fitting batch, invokes the mesh fitter, derives the foot-length
//! measurement, persists the result, and releases the task's inputs on
//! every exit path.
//!
//! The GPU-resident model collaborators are process-wide singletons shared
//! by all coordinators; access is serialized with one mutex per
//! collaborator. Storage operations are the only retryable link; inference
//! failures and contract violations surface immediately.

/// Error taxonomy and terminal task results.
pub mod error;
/// The per-request pipeline state machine.
pub mod coordinator;
/// Object-storage boundary.
pub mod storage;

pub use coordinator::PipelineCoordinator;
pub use error::{ErrorKind, FetchError, PipelineError, Stage, TaskResult, TaskStatus};
pub use storage::{FsTaskStore, StorageError, TaskStore};
