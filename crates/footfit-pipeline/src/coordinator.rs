//! The per-request pipeline state machine.
//!
//! Stage order per task:
//! fetch → (segment ‖ estimate) → merge → build batch → fit → measure →
//! persist, with unconditional input cleanup on every exit path. The two
//! inference stages depend only on the fetched images and run concurrently;
//! every other transition is strictly sequential because each stage's
//! output feeds the next.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::imageops::FilterType;
use image::RgbImage;
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use footfit_core::{transform, CameraSet, PipelineConfig, RawCapture};
use footfit_models::{
    build_fitting_batch, CollaboratorError, ContractError, FitOutcome, FittingBatch, MeshFitter,
    NormalEstimator, PredictionSet, Segmenter, SilhouetteMask, SurfaceNormalPrediction,
};

use crate::error::{FetchError, PipelineError, Stage, TaskResult};
use crate::storage::TaskStore;

/// Per-request pipeline coordinator.
///
/// One instance processes one task at a time; instances for concurrent
/// tasks share the same configuration, store, and model collaborators. The
/// collaborators are not re-entrant, so each sits behind its own mutex and
/// a coordinator holds the lock for the duration of one inference call.
pub struct PipelineCoordinator<S> {
    config: Arc<PipelineConfig>,
    store: Arc<S>,
    segmenter: Arc<Mutex<dyn Segmenter>>,
    estimator: Arc<Mutex<dyn NormalEstimator>>,
    fitter: Arc<Mutex<dyn MeshFitter>>,
}

impl<S: TaskStore> PipelineCoordinator<S> {
    /// Create a coordinator over shared, already-loaded collaborators.
    pub fn new(
        config: Arc<PipelineConfig>,
        store: Arc<S>,
        segmenter: Arc<Mutex<dyn Segmenter>>,
        estimator: Arc<Mutex<dyn NormalEstimator>>,
        fitter: Arc<Mutex<dyn MeshFitter>>,
    ) -> Self {
        Self {
            config,
            store,
            segmenter,
            estimator,
            fitter,
        }
    }

    /// Process one task to completion and return its terminal record.
    ///
    /// Never panics and never returns an error: every failure, including a
    /// deadline expiry, is converted into `TaskResult { status: error }`.
    /// Task inputs are deleted from storage on every exit path.
    pub async fn run(&self, task_id: &str) -> TaskResult {
        let deadline = Duration::from_millis(self.config.deadline_ms);
        let outcome = match tokio::time::timeout(deadline, self.execute(task_id)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(self.config.deadline_ms)),
        };

        let result = outcome.unwrap_or_else(|err| {
            warn!(task = task_id, error = %err, "task failed");
            TaskResult::failed(task_id, &err)
        });

        if let Err(err) = self.store.remove_task(task_id).await {
            warn!(task = task_id, error = %err, "input cleanup failed");
        }

        result
    }

    async fn execute(&self, task_id: &str) -> Result<TaskResult, PipelineError> {
        info!(task = task_id, "fetching inputs");
        let (images, cameras) = self.fetch(task_id).await?;

        info!(task = task_id, images = images.len(), "running inference stages");
        let (masks, normals) = self.infer(images).await?;

        let predictions = PredictionSet::merge(normals, masks)?;
        if predictions.len() != cameras.len() {
            return Err(ContractError::MisalignedCameras {
                cameras: cameras.len(),
                predictions: predictions.len(),
            }
            .into());
        }

        debug!(task = task_id, "building fitting batch");
        let batch = build_fitting_batch(
            &cameras,
            &predictions,
            self.config.fitting_size,
            self.config.max_alpha_deg,
        )?;

        info!(task = task_id, views = batch.len(), "fitting mesh");
        let outcome = self.fit(batch).await?;
        if !outcome.mesh.is_finite() {
            return Err(PipelineError::Fitting(
                "fitted mesh contains non-finite vertices".to_string(),
            ));
        }

        let foot_size = footfit_models::foot_length(&outcome.keypoints)?;
        let result = self.persist(task_id, foot_size, &outcome).await?;
        info!(task = task_id, foot_size, "task completed");
        Ok(result)
    }

    async fn fetch(&self, task_id: &str) -> Result<(Vec<RgbImage>, CameraSet), PipelineError> {
        let names = self
            .store
            .list_task(task_id)
            .await
            .map_err(FetchError::Storage)?;

        let mut image_names = Vec::new();
        let mut capture_names = Vec::new();
        for name in names {
            let lower = name.to_lowercase();
            if lower.ends_with(".jpg") || lower.ends_with(".jpeg") || lower.ends_with(".png") {
                image_names.push(name);
            } else if lower.ends_with(".json") {
                capture_names.push(name);
            }
        }
        if image_names.is_empty() {
            return Err(FetchError::EmptyTask(task_id.to_string()).into());
        }

        // Every image needs a capture record and vice versa.
        let image_stems: BTreeSet<&str> = image_names.iter().map(|n| stem(n)).collect();
        let capture_stems: BTreeSet<&str> = capture_names.iter().map(|n| stem(n)).collect();
        if let Some(name) = image_names
            .iter()
            .find(|n| !capture_stems.contains(stem(n)))
        {
            return Err(FetchError::MissingCapture(name.clone()).into());
        }
        if let Some(name) = capture_names
            .iter()
            .find(|n| !image_stems.contains(stem(n)))
        {
            return Err(FetchError::MissingImage(name.clone()).into());
        }

        let mut images = Vec::with_capacity(image_names.len());
        let mut cameras = Vec::with_capacity(image_names.len());
        for name in &image_names {
            let bytes = self
                .store
                .get(task_id, name)
                .await
                .map_err(FetchError::Storage)?;
            let decoded =
                image::load_from_memory(&bytes).map_err(|err| FetchError::ImageDecode {
                    name: name.clone(),
                    cause: err.to_string(),
                })?;
            images.push(
                decoded
                    .resize_exact(
                        self.config.source_size.width,
                        self.config.source_size.height,
                        FilterType::Triangle,
                    )
                    .to_rgb8(),
            );

            let capture_name = format!("{}.json", stem(name));
            let bytes = self
                .store
                .get(task_id, &capture_name)
                .await
                .map_err(FetchError::Storage)?;
            let raw: RawCapture =
                serde_json::from_slice(&bytes).map_err(|err| FetchError::CaptureParse {
                    name: capture_name.clone(),
                    cause: err.to_string(),
                })?;
            if !raw.is_finite() {
                return Err(FetchError::NonFiniteCapture(capture_name).into());
            }

            cameras.push(transform(
                &raw,
                self.config.source_size,
                self.config.prediction_size,
                self.config.flip_z,
                name.clone(),
            ));
        }

        Ok((images, cameras))
    }

    async fn infer(
        &self,
        images: Vec<RgbImage>,
    ) -> Result<(Vec<SilhouetteMask>, Vec<SurfaceNormalPrediction>), PipelineError> {
        let images = Arc::new(images);

        let segmenter = Arc::clone(&self.segmenter);
        let seg_images = Arc::clone(&images);
        let seg_task = tokio::task::spawn_blocking(move || {
            let mut model = segmenter
                .lock()
                .map_err(|_| CollaboratorError::Execution("segmenter lock poisoned".to_string()))?;
            model.segment(&seg_images)
        });

        let estimator = Arc::clone(&self.estimator);
        let est_images = Arc::clone(&images);
        let est_task = tokio::task::spawn_blocking(move || {
            let mut model = estimator.lock().map_err(|_| {
                CollaboratorError::Execution("normal estimator lock poisoned".to_string())
            })?;
            model.estimate(&est_images)
        });

        let (seg_out, est_out) = tokio::join!(seg_task, est_task);
        let masks = collapse(seg_out, Stage::Segmenting)?;
        let normals = collapse(est_out, Stage::Estimating)?;
        Ok((masks, normals))
    }

    async fn fit(&self, batch: FittingBatch) -> Result<FitOutcome, PipelineError> {
        let fitter = Arc::clone(&self.fitter);
        let handle = tokio::task::spawn_blocking(move || {
            let mut model = fitter
                .lock()
                .map_err(|_| CollaboratorError::Execution("mesh fitter lock poisoned".to_string()))?;
            model.fit(&batch)
        });
        match handle.await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(err)) => Err(PipelineError::Fitting(err.to_string())),
            Err(_) => Err(PipelineError::Fitting("fitting task panicked".to_string())),
        }
    }

    async fn persist(
        &self,
        task_id: &str,
        foot_size: footfit_core::Real,
        outcome: &FitOutcome,
    ) -> Result<TaskResult, PipelineError> {
        let mesh_bytes = serde_json::to_vec(&outcome.mesh)
            .map_err(|err| PipelineError::Persist(err.to_string()))?;
        self.store
            .put_result(task_id, "mesh.json", &mesh_bytes)
            .await
            .map_err(|err| PipelineError::Persist(err.to_string()))?;

        let result = TaskResult::completed(
            task_id,
            foot_size,
            format!("results/{task_id}/mesh.json"),
        );
        let result_bytes = serde_json::to_vec(&result)
            .map_err(|err| PipelineError::Persist(err.to_string()))?;
        self.store
            .put_result(task_id, "result.json", &result_bytes)
            .await
            .map_err(|err| PipelineError::Persist(err.to_string()))?;

        Ok(result)
    }
}

fn stem(name: &str) -> &str {
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

fn collapse<T>(
    joined: Result<Result<T, CollaboratorError>, JoinError>,
    stage: Stage,
) -> Result<T, PipelineError> {
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(cause)) => Err(PipelineError::Inference { stage, cause }),
        Err(_) => Err(PipelineError::Inference {
            stage,
            cause: CollaboratorError::Execution("inference task panicked".to_string()),
        }),
    }
}
