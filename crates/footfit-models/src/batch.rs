//! Prediction and fitting-batch contracts.
//!
//! A [`PredictionSet`] is the index-aligned merge of the two independent
//! inference outputs; a [`FittingBatch`] is the renderer-ready union of the
//! camera set and the predictions, resampled to the fitting resolution.
//! Both are built exactly once per request, and any misalignment between
//! the contributing sequences is a contract violation, never silently
//! truncated or padded.

use thiserror::Error;

use footfit_core::{CameraRecord, Mat3, Real, Size, Vec2, Vec3};

use crate::collaborators::SurfaceNormalPrediction;
use crate::maps::{
    binarize, normal_rgb_to_xyz, resize_bilinear2, resize_bilinear3, silhouette_from_kappa,
    KappaMap, NormalMap, SilhouetteMask,
};

/// Broken inter-stage invariant. Always fatal to the task; indicates a
/// defect in a collaborator or in the pipeline itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// The two inference stages returned different numbers of entries.
    #[error("prediction outputs misaligned: {normals} normal predictions vs {masks} masks")]
    MisalignedPredictions {
        /// Entries from the normal estimator.
        normals: usize,
        /// Entries from the segmenter.
        masks: usize,
    },
    /// Camera records and predictions are not index-aligned.
    #[error("camera set has {cameras} entries but prediction set has {predictions}")]
    MisalignedCameras {
        /// Camera records.
        cameras: usize,
        /// Prediction entries.
        predictions: usize,
    },
}

/// Merged per-image model outputs.
#[derive(Debug, Clone)]
pub struct PredictionEntry {
    /// RGB-encoded normal map at prediction resolution.
    pub normal: NormalMap,
    /// Concentration map at prediction resolution.
    pub kappa: KappaMap,
    /// Binary silhouette from the segmenter at prediction resolution.
    pub silhouette: SilhouetteMask,
}

/// Index-aligned per-image predictions for one task.
///
/// Never partially populated: construction requires both inference outputs
/// for every image.
#[derive(Debug, Clone, Default)]
pub struct PredictionSet {
    /// One entry per source image, in fetch order.
    pub entries: Vec<PredictionEntry>,
}

impl PredictionSet {
    /// Merge the outputs of the two inference stages.
    ///
    /// Both sequences must have the same length; entries are paired by
    /// position.
    pub fn merge(
        normals: Vec<SurfaceNormalPrediction>,
        masks: Vec<SilhouetteMask>,
    ) -> Result<Self, ContractError> {
        if normals.len() != masks.len() {
            return Err(ContractError::MisalignedPredictions {
                normals: normals.len(),
                masks: masks.len(),
            });
        }
        let entries = normals
            .into_iter()
            .zip(masks)
            .map(|(pred, silhouette)| PredictionEntry {
                normal: pred.normal,
                kappa: pred.kappa,
                silhouette,
            })
            .collect();
        Ok(Self { entries })
    }

    /// Number of per-image entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One camera view of the renderer-ready batch.
#[derive(Debug, Clone)]
pub struct FittingView {
    /// World-to-camera rotation.
    pub rotation: Mat3,
    /// World-to-camera translation.
    pub translation: Vec3,
    /// Principal point at fitting resolution.
    pub pp: Vec2,
    /// Focal length at fitting resolution.
    pub f: Real,
    /// XYZ normals in `[-1, 1]` at fitting resolution.
    pub normal_xyz: NormalMap,
    /// Concentration map at fitting resolution (normal-loss weighting).
    pub kappa: KappaMap,
    /// Binary silhouette at fitting resolution.
    pub silhouette: SilhouetteMask,
    /// Source image name.
    pub filename: String,
}

/// The resolution-aligned bundle consumed by the mesh fitter.
///
/// Built exactly once per request and consumed exactly once.
#[derive(Debug, Clone, Default)]
pub struct FittingBatch {
    /// One view per source image, in fetch order.
    pub views: Vec<FittingView>,
}

impl FittingBatch {
    /// Number of views.
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Whether the batch holds no views.
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

/// Build the fitting batch from index-aligned cameras and predictions.
///
/// Camera intrinsics are rescaled by the ratio of the fitting resolution to
/// the resolution the predictions were produced at (the resolution the
/// intrinsics were last defined at). Normal maps are resized and remapped
/// to XYZ; the silhouette is the resized segmentation mask with pixels
/// whose normal uncertainty exceeds `max_alpha_deg` removed.
pub fn build_fitting_batch(
    cameras: &[CameraRecord],
    predictions: &PredictionSet,
    fitting_size: Size,
    max_alpha_deg: Real,
) -> Result<FittingBatch, ContractError> {
    if cameras.len() != predictions.len() {
        return Err(ContractError::MisalignedCameras {
            cameras: cameras.len(),
            predictions: predictions.len(),
        });
    }

    let out_h = fitting_size.height as usize;
    let out_w = fitting_size.width as usize;

    let views = cameras
        .iter()
        .zip(&predictions.entries)
        .map(|(camera, entry)| {
            let prediction_height = entry.normal.dim().0 as Real;
            let resize_factor = Real::from(fitting_size.height) / prediction_height;
            let camera = camera.with_rescaled_intrinsics(resize_factor);

            let normal_xyz = normal_rgb_to_xyz(&resize_bilinear3(&entry.normal, out_h, out_w));
            let kappa = resize_bilinear2(&entry.kappa, out_h, out_w);

            let segmentation = binarize(&resize_bilinear2(&entry.silhouette, out_h, out_w));
            let confident = silhouette_from_kappa(&kappa, max_alpha_deg as f32);
            let silhouette = &segmentation * &confident;

            FittingView {
                rotation: camera.rotation,
                translation: camera.translation,
                pp: camera.pp,
                f: camera.f,
                normal_xyz,
                kappa,
                silhouette,
                filename: camera.filename,
            }
        })
        .collect();

    Ok(FittingBatch { views })
}

#[cfg(test)]
mod tests {
    use super::*;
    use footfit_core::{transform, RawCapture};
    use ndarray::{Array2, Array3};

    fn prediction_entry(h: usize, w: usize) -> (SurfaceNormalPrediction, SilhouetteMask) {
        (
            SurfaceNormalPrediction {
                normal: Array3::from_elem((h, w, 3), 0.5f32),
                kappa: Array2::from_elem((h, w), 10.0f32),
            },
            Array2::from_elem((h, w), 1.0f32),
        )
    }

    fn camera(filename: &str) -> CameraRecord {
        let raw = RawCapture {
            x: 0.1,
            y: 0.2,
            z: 0.3,
            angle_x: 0.0,
            angle_y: 0.0,
            angle_z: 0.0,
            fx: 1445.0,
            ox: 720.0,
            oy: 960.0,
        };
        transform(
            &raw,
            Size::new(1440, 1920),
            Size::new(960, 1280),
            false,
            filename,
        )
    }

    #[test]
    fn merge_requires_equal_lengths() {
        let (pred, mask) = prediction_entry(4, 3);
        let err = PredictionSet::merge(vec![pred], vec![mask.clone(), mask]).unwrap_err();
        assert_eq!(
            err,
            ContractError::MisalignedPredictions {
                normals: 1,
                masks: 2
            }
        );
    }

    #[test]
    fn merge_pairs_by_position() {
        let (pred_a, mask_a) = prediction_entry(4, 3);
        let (pred_b, mask_b) = prediction_entry(4, 3);
        let set = PredictionSet::merge(vec![pred_a, pred_b], vec![mask_a, mask_b]).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn batch_rejects_camera_prediction_mismatch() {
        let (pred, mask) = prediction_entry(4, 3);
        let predictions = PredictionSet::merge(vec![pred], vec![mask]).unwrap();
        let cameras = vec![camera("a.jpg"), camera("b.jpg")];

        let err =
            build_fitting_batch(&cameras, &predictions, Size::new(3, 4), 70.0).unwrap_err();
        assert_eq!(
            err,
            ContractError::MisalignedCameras {
                cameras: 2,
                predictions: 1
            }
        );
    }

    #[test]
    fn batch_rescales_intrinsics_by_resolution_ratio() {
        // Predictions at 1280 high, fitting at 640 high: factor 1/2.
        let (pred, mask) = prediction_entry(1280, 960);
        let predictions = PredictionSet::merge(vec![pred], vec![mask]).unwrap();
        let cam = camera("a.jpg");
        let batch =
            build_fitting_batch(&[cam.clone()], &predictions, Size::new(480, 640), 70.0).unwrap();

        let view = &batch.views[0];
        assert!((view.f - cam.f * 0.5).abs() < 1e-9);
        assert!((view.pp - cam.pp * 0.5).norm() < 1e-9);
        assert_eq!(view.rotation, cam.rotation);
        assert_eq!(view.translation, cam.translation);
    }

    #[test]
    fn batch_resamples_maps_to_fitting_resolution() {
        let (pred, mask) = prediction_entry(8, 6);
        let predictions = PredictionSet::merge(vec![pred], vec![mask]).unwrap();
        let batch =
            build_fitting_batch(&[camera("a.jpg")], &predictions, Size::new(3, 4), 70.0).unwrap();

        let view = &batch.views[0];
        assert_eq!(view.normal_xyz.dim(), (4, 3, 3));
        assert_eq!(view.kappa.dim(), (4, 3));
        assert_eq!(view.silhouette.dim(), (4, 3));
        // RGB 0.5 maps to XYZ 0.
        assert!(view.normal_xyz.iter().all(|v| v.abs() < 1e-6));
        // Confident kappa keeps the full segmentation mask.
        assert!(view.silhouette.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn uncertain_normals_are_cut_from_the_silhouette() {
        // kappa 0 everywhere -> alpha 90 deg -> everything above the cutoff.
        let pred = SurfaceNormalPrediction {
            normal: Array3::from_elem((4, 3, 3), 0.5f32),
            kappa: Array2::from_elem((4, 3), 0.0f32),
        };
        let mask = Array2::from_elem((4, 3), 1.0f32);
        let predictions = PredictionSet::merge(vec![pred], vec![mask]).unwrap();
        let batch =
            build_fitting_batch(&[camera("a.jpg")], &predictions, Size::new(3, 4), 70.0).unwrap();

        assert!(batch.views[0].silhouette.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn empty_inputs_build_an_empty_batch() {
        let batch = build_fitting_batch(
            &[],
            &PredictionSet::default(),
            Size::new(480, 640),
            70.0,
        )
        .unwrap();
        assert!(batch.is_empty());
    }
}
