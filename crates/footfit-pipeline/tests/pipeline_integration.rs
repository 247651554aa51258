//! End-to-end coordinator tests over a filesystem store and stub
//! collaborators.

use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::{Array2, Array3};

use footfit_core::{
    device_to_renderer, rotate_90_x, rotate_neg90_z, PipelineConfig, Pt3, RawCapture, Size, Vec3,
};
use footfit_models::{
    CollaboratorError, FitOutcome, FittingBatch, FootMesh, MeshFitter, MeshKeypoints,
    NormalEstimator, Segmenter, SilhouetteMask, SurfaceNormalPrediction, KEYPOINT_BIG_TOE,
    KEYPOINT_HEEL,
};
use footfit_pipeline::{
    ErrorKind, FsTaskStore, PipelineCoordinator, Stage, TaskResult, TaskStatus,
};

// Scaled-down deployment geometry: the size ratios match production
// (prediction = 2/3 source, fitting = 1/2 prediction) so closed-form
// intrinsics expectations carry over.
const SOURCE: Size = Size {
    width: 72,
    height: 96,
};
const PREDICTION: Size = Size {
    width: 48,
    height: 64,
};
const FITTING: Size = Size {
    width: 24,
    height: 32,
};

fn test_config() -> PipelineConfig {
    PipelineConfig {
        source_size: SOURCE,
        prediction_size: PREDICTION,
        fitting_size: FITTING,
        ..PipelineConfig::with_flip_z(false)
    }
}

fn prediction_dims() -> (usize, usize) {
    (PREDICTION.height as usize, PREDICTION.width as usize)
}

struct StubSegmenter;

impl Segmenter for StubSegmenter {
    fn segment(&mut self, images: &[RgbImage]) -> Result<Vec<SilhouetteMask>, CollaboratorError> {
        let (h, w) = prediction_dims();
        Ok(images.iter().map(|_| Array2::from_elem((h, w), 1.0f32)).collect())
    }
}

/// Simulates a buggy collaborator that drops the last image.
struct ShortSegmenter;

impl Segmenter for ShortSegmenter {
    fn segment(&mut self, images: &[RgbImage]) -> Result<Vec<SilhouetteMask>, CollaboratorError> {
        let (h, w) = prediction_dims();
        let count = images.len().saturating_sub(1);
        Ok((0..count).map(|_| Array2::from_elem((h, w), 1.0f32)).collect())
    }
}

struct FailingSegmenter;

impl Segmenter for FailingSegmenter {
    fn segment(&mut self, _images: &[RgbImage]) -> Result<Vec<SilhouetteMask>, CollaboratorError> {
        Err(CollaboratorError::Execution("proposal head exploded".to_string()))
    }
}

struct StubEstimator {
    drop_last: bool,
}

impl NormalEstimator for StubEstimator {
    fn estimate(
        &mut self,
        images: &[RgbImage],
    ) -> Result<Vec<SurfaceNormalPrediction>, CollaboratorError> {
        let (h, w) = prediction_dims();
        let count = if self.drop_last {
            images.len().saturating_sub(1)
        } else {
            images.len()
        };
        Ok((0..count)
            .map(|_| SurfaceNormalPrediction {
                normal: Array3::from_elem((h, w, 3), 0.5f32),
                kappa: Array2::from_elem((h, w), 10.0f32),
            })
            .collect())
    }
}

fn stub_outcome() -> FitOutcome {
    let mut keypoints = MeshKeypoints::new();
    keypoints.insert(KEYPOINT_BIG_TOE, Pt3::new(10.0, 0.0, 0.0));
    keypoints.insert(KEYPOINT_HEEL, Pt3::new(2.0, 0.0, 0.0));
    FitOutcome {
        mesh: FootMesh {
            vertices: vec![
                Pt3::new(2.0, 0.0, 0.0),
                Pt3::new(10.0, 0.0, 0.0),
                Pt3::new(6.0, 3.0, 0.0),
            ],
            faces: vec![[0, 1, 2]],
        },
        keypoints,
    }
}

struct StubFitter;

impl MeshFitter for StubFitter {
    fn fit(&mut self, _batch: &FittingBatch) -> Result<FitOutcome, CollaboratorError> {
        Ok(stub_outcome())
    }
}

/// Captures the batch it is handed so tests can inspect it.
struct RecordingFitter {
    seen: Arc<Mutex<Option<FittingBatch>>>,
}

impl MeshFitter for RecordingFitter {
    fn fit(&mut self, batch: &FittingBatch) -> Result<FitOutcome, CollaboratorError> {
        *self.seen.lock().unwrap() = Some(batch.clone());
        Ok(stub_outcome())
    }
}

struct SleepyFitter {
    delay: Duration,
}

impl MeshFitter for SleepyFitter {
    fn fit(&mut self, _batch: &FittingBatch) -> Result<FitOutcome, CollaboratorError> {
        std::thread::sleep(self.delay);
        Ok(stub_outcome())
    }
}

struct NanFitter;

impl MeshFitter for NanFitter {
    fn fit(&mut self, _batch: &FittingBatch) -> Result<FitOutcome, CollaboratorError> {
        let mut outcome = stub_outcome();
        outcome.mesh.vertices[0].z = f64::NAN;
        Ok(outcome)
    }
}

fn jpeg_bytes() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([170, 120, 90])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg).unwrap();
    buf
}

fn capture_at(position: Vec3) -> RawCapture {
    RawCapture {
        x: position.x,
        y: position.y,
        z: position.z,
        angle_x: 0.0,
        angle_y: 0.0,
        angle_z: 0.0,
        fx: 1445.0,
        ox: 720.0,
        oy: 960.0,
    }
}

fn seed_positions() -> Vec<Vec3> {
    vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 0.0, 0.0),
        Vec3::new(0.0, 1.0, 0.0),
    ]
}

/// Write `positions.len()` image/capture pairs; when `skip_last_capture`,
/// the last image is left without its record.
fn seed_task(root: &Path, task_id: &str, positions: &[Vec3], skip_last_capture: bool) {
    let dir = root.join("tasks").join(task_id);
    std::fs::create_dir_all(&dir).unwrap();
    for (idx, position) in positions.iter().enumerate() {
        std::fs::write(dir.join(format!("img_{idx:03}.jpg")), jpeg_bytes()).unwrap();
        if skip_last_capture && idx == positions.len() - 1 {
            continue;
        }
        let capture = capture_at(*position);
        std::fs::write(
            dir.join(format!("img_{idx:03}.json")),
            serde_json::to_vec(&capture).unwrap(),
        )
        .unwrap();
    }
}

fn coordinator(
    root: &Path,
    config: PipelineConfig,
    segmenter: Arc<Mutex<dyn Segmenter>>,
    fitter: Arc<Mutex<dyn MeshFitter>>,
) -> PipelineCoordinator<FsTaskStore> {
    let store = Arc::new(FsTaskStore::new(root, config.retry));
    let estimator: Arc<Mutex<dyn NormalEstimator>> =
        Arc::new(Mutex::new(StubEstimator { drop_last: false }));
    PipelineCoordinator::new(Arc::new(config), store, segmenter, estimator, fitter)
}

fn assert_cleaned_up(root: &Path, task_id: &str) {
    assert!(
        !root.join("tasks").join(task_id).exists(),
        "task inputs were not cleaned up"
    );
}

#[tokio::test]
async fn happy_path_measures_and_cleans_up() {
    let tmp = tempfile::tempdir().unwrap();
    seed_task(tmp.path(), "task-1", &seed_positions(), false);

    let pipeline = coordinator(
        tmp.path(),
        test_config(),
        Arc::new(Mutex::new(StubSegmenter)),
        Arc::new(Mutex::new(StubFitter)),
    );
    let result = pipeline.run("task-1").await;

    assert_eq!(result.status, TaskStatus::Completed, "{result:?}");
    assert!((result.foot_size.unwrap() - 8.0).abs() < 1e-12);
    assert_eq!(result.mesh.as_deref(), Some("results/task-1/mesh.json"));

    // Results were persisted and parse back.
    let written = std::fs::read(tmp.path().join("results/task-1/result.json")).unwrap();
    let stored: TaskResult = serde_json::from_slice(&written).unwrap();
    assert_eq!(stored, result);

    let mesh_bytes = std::fs::read(tmp.path().join("results/task-1/mesh.json")).unwrap();
    let mesh: FootMesh = serde_json::from_slice(&mesh_bytes).unwrap();
    assert_eq!(mesh.vertex_count(), 3);

    assert_cleaned_up(tmp.path(), "task-1");
}

#[tokio::test]
async fn batch_carries_transformed_cameras_in_fetch_order() {
    let tmp = tempfile::tempdir().unwrap();
    let positions = seed_positions();
    seed_task(tmp.path(), "task-2", &positions, false);

    let seen = Arc::new(Mutex::new(None));
    let pipeline = coordinator(
        tmp.path(),
        test_config(),
        Arc::new(Mutex::new(StubSegmenter)),
        Arc::new(Mutex::new(RecordingFitter { seen: Arc::clone(&seen) })),
    );
    let result = pipeline.run("task-2").await;
    assert_eq!(result.status, TaskStatus::Completed, "{result:?}");

    let batch = seen.lock().unwrap().take().expect("fitter saw no batch");
    assert_eq!(batch.len(), positions.len());

    // Zero input rotation collapses the transform to a fixed composition.
    let expected_r =
        rotate_neg90_z().transpose() * device_to_renderer() * rotate_90_x().transpose();

    for (view, position) in batch.views.iter().zip(positions.iter().copied()) {
        // Intrinsics: 2/3 down to prediction resolution, then 1/2 down to
        // fitting resolution.
        assert!((view.f - 1445.0 * (2.0 / 3.0) * 0.5).abs() < 1e-9);
        assert!((view.pp.x - 960.0 * (2.0 / 3.0) * 0.5).abs() < 1e-9);
        assert!((view.pp.y - 720.0 * (2.0 / 3.0) * 0.5).abs() < 1e-9);

        assert!((view.rotation - expected_r).norm() < 1e-12);
        let expected_t = -(expected_r * (rotate_90_x() * position));
        assert!((view.translation - expected_t).norm() < 1e-12);

        assert_eq!(view.normal_xyz.dim(), (32, 24, 3));
        assert_eq!(view.silhouette.dim(), (32, 24));
    }

    // Index alignment: views come back in sorted fetch order.
    let names: Vec<_> = batch.views.iter().map(|v| v.filename.as_str()).collect();
    assert_eq!(names, vec!["img_000.jpg", "img_001.jpg", "img_002.jpg"]);

    assert_cleaned_up(tmp.path(), "task-2");
}

#[tokio::test]
async fn missing_capture_record_is_a_fetch_error() {
    let tmp = tempfile::tempdir().unwrap();
    seed_task(tmp.path(), "task-3", &seed_positions(), true);

    let pipeline = coordinator(
        tmp.path(),
        test_config(),
        Arc::new(Mutex::new(StubSegmenter)),
        Arc::new(Mutex::new(StubFitter)),
    );
    let result = pipeline.run("task-3").await;

    assert_eq!(result.status, TaskStatus::Error);
    assert_eq!(result.kind, Some(ErrorKind::Fetch));
    assert_eq!(result.stage, Some(Stage::Fetching));
    assert!(result.error.as_deref().unwrap().contains("img_002.jpg"));

    // Cleanup runs on the failure path too, and nothing was persisted.
    assert_cleaned_up(tmp.path(), "task-3");
    assert!(!tmp.path().join("results/task-3").exists());
}

#[tokio::test]
async fn misaligned_collaborator_output_is_a_contract_violation() {
    let tmp = tempfile::tempdir().unwrap();
    let positions: Vec<Vec3> = (0..5).map(|i| Vec3::new(f64::from(i), 0.0, 0.0)).collect();
    seed_task(tmp.path(), "task-4", &positions, false);

    // Both collaborators drop the last entry: the merge itself lines up
    // (4 vs 4) but disagrees with the 5-entry camera set.
    let store = Arc::new(FsTaskStore::new(tmp.path(), test_config().retry));
    let estimator: Arc<Mutex<dyn NormalEstimator>> =
        Arc::new(Mutex::new(StubEstimator { drop_last: true }));
    let pipeline = PipelineCoordinator::new(
        Arc::new(test_config()),
        store,
        Arc::new(Mutex::new(ShortSegmenter)),
        estimator,
        Arc::new(Mutex::new(StubFitter)),
    );
    let result = pipeline.run("task-4").await;

    assert_eq!(result.status, TaskStatus::Error);
    assert_eq!(result.kind, Some(ErrorKind::ContractViolation));
    assert!(result.error.as_deref().unwrap().contains('5'));
    assert!(result.error.as_deref().unwrap().contains('4'));
    assert_cleaned_up(tmp.path(), "task-4");
}

#[tokio::test]
async fn failed_inference_is_tagged_with_its_stage() {
    let tmp = tempfile::tempdir().unwrap();
    seed_task(tmp.path(), "task-5", &seed_positions(), false);

    let pipeline = coordinator(
        tmp.path(),
        test_config(),
        Arc::new(Mutex::new(FailingSegmenter)),
        Arc::new(Mutex::new(StubFitter)),
    );
    let result = pipeline.run("task-5").await;

    assert_eq!(result.status, TaskStatus::Error);
    assert_eq!(result.kind, Some(ErrorKind::Inference));
    assert_eq!(result.stage, Some(Stage::Segmenting));
    assert!(result.error.as_deref().unwrap().contains("proposal head"));
    assert_cleaned_up(tmp.path(), "task-5");
}

#[tokio::test]
async fn deadline_expiry_reports_timeout_and_persists_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    seed_task(tmp.path(), "task-6", &seed_positions(), false);

    let mut config = test_config();
    config.deadline_ms = 100;
    let pipeline = coordinator(
        tmp.path(),
        config,
        Arc::new(Mutex::new(StubSegmenter)),
        Arc::new(Mutex::new(SleepyFitter {
            delay: Duration::from_millis(1500),
        })),
    );
    let result = pipeline.run("task-6").await;

    assert_eq!(result.status, TaskStatus::Error);
    assert_eq!(result.kind, Some(ErrorKind::Timeout));
    assert_eq!(result.stage, None);
    assert!(!tmp.path().join("results/task-6").exists());
    assert_cleaned_up(tmp.path(), "task-6");
}

#[tokio::test]
async fn non_finite_mesh_is_a_fitting_error() {
    let tmp = tempfile::tempdir().unwrap();
    seed_task(tmp.path(), "task-7", &seed_positions(), false);

    let pipeline = coordinator(
        tmp.path(),
        test_config(),
        Arc::new(Mutex::new(StubSegmenter)),
        Arc::new(Mutex::new(NanFitter)),
    );
    let result = pipeline.run("task-7").await;

    assert_eq!(result.status, TaskStatus::Error);
    assert_eq!(result.kind, Some(ErrorKind::Fitting));
    assert_eq!(result.stage, Some(Stage::Fitting));
    assert!(result.error.as_deref().unwrap().contains("non-finite"));
    assert!(!tmp.path().join("results/task-7").exists());
    assert_cleaned_up(tmp.path(), "task-7");
}

#[tokio::test]
async fn missing_task_folder_is_a_fetch_error() {
    let tmp = tempfile::tempdir().unwrap();
    let pipeline = coordinator(
        tmp.path(),
        test_config(),
        Arc::new(Mutex::new(StubSegmenter)),
        Arc::new(Mutex::new(StubFitter)),
    );
    let result = pipeline.run("ghost-task").await;

    assert_eq!(result.status, TaskStatus::Error);
    assert_eq!(result.kind, Some(ErrorKind::Fetch));
    assert!(result.error.as_deref().unwrap().contains("ghost-task"));
}
