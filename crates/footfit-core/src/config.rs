//! Immutable pipeline configuration.
//!
//! Configuration is loaded once (typically from JSON) and shared read-only
//! by every coordinator instance. The one deliberately non-defaultable
//! field is `flip_z`: the depth-axis sign convention differs between
//! capture setups and must be chosen explicitly per deployment.

use serde::{Deserialize, Serialize};

use crate::capture::Size;
use crate::math::Real;

/// Positive seed point for the segmentation model, in target-resolution
/// pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeedPoint {
    /// Horizontal pixel coordinate.
    pub x: Real,
    /// Vertical pixel coordinate.
    pub y: Real,
    /// Prompt label (1 = foreground).
    pub label: u8,
}

impl Default for SeedPoint {
    fn default() -> Self {
        Self {
            x: 500.0,
            y: 610.0,
            label: 1,
        }
    }
}

/// Weight of one loss term in a fitting stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossWeight {
    /// Loss term name (e.g. `silhouette`, `normal`).
    pub name: String,
    /// Multiplier applied to the term.
    pub weight: Real,
}

/// One gradient-descent stage of the mesh fitter.
///
/// The stage list belongs to the fitter's own configuration; the
/// coordinator passes it through without interpreting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitStageConfig {
    /// Stage name.
    pub name: String,
    /// Number of optimizer iterations.
    pub iterations: usize,
    /// Fixed learning rate.
    pub learning_rate: Real,
    /// Parameter groups updated during this stage.
    pub trainable: Vec<String>,
    /// Active loss terms and their weights.
    pub losses: Vec<LossWeight>,
}

impl FitStageConfig {
    /// The default deformation stage: 250 iterations at a fixed learning
    /// rate, minimizing weighted silhouette + normal losses.
    pub fn deform() -> Self {
        Self {
            name: "deform".to_string(),
            iterations: 250,
            learning_rate: 1e-3,
            trainable: vec!["deform".to_string()],
            losses: vec![
                LossWeight {
                    name: "silhouette".to_string(),
                    weight: 1.0,
                },
                LossWeight {
                    name: "normal".to_string(),
                    weight: 1.0,
                },
            ],
        }
    }
}

fn default_fit_stages() -> Vec<FitStageConfig> {
    vec![FitStageConfig::deform()]
}

/// Bounded retry with exponential backoff, applied to storage operations
/// only. Model inference and contract violations are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent attempt.
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
        }
    }
}

fn default_source_size() -> Size {
    Size::new(1440, 1920)
}

fn default_prediction_size() -> Size {
    Size::new(960, 1280)
}

fn default_fitting_size() -> Size {
    Size::new(480, 640)
}

fn default_deadline_ms() -> u64 {
    300_000
}

fn default_max_alpha_deg() -> Real {
    70.0
}

/// Per-deployment pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Resolution source images are normalized to before inference.
    #[serde(default = "default_source_size")]
    pub source_size: Size,
    /// Resolution the perception models run at; camera intrinsics are
    /// expressed at this resolution after the frame transform.
    #[serde(default = "default_prediction_size")]
    pub prediction_size: Size,
    /// Resolution the mesh fitter consumes.
    #[serde(default = "default_fitting_size")]
    pub fitting_size: Size,
    /// Depth-axis sign convention. Required; there is no safe default.
    pub flip_z: bool,
    /// Segmentation seed point.
    #[serde(default)]
    pub seed: SeedPoint,
    /// Overall per-task deadline in milliseconds.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Storage retry policy.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Angular-uncertainty cutoff (degrees); normals more uncertain than
    /// this are excluded from the fitting silhouette.
    #[serde(default = "default_max_alpha_deg")]
    pub max_alpha_deg: Real,
    /// Mesh-fitter stage list.
    #[serde(default = "default_fit_stages")]
    pub fit_stages: Vec<FitStageConfig>,
}

impl PipelineConfig {
    /// Configuration with deployment defaults and an explicit `flip_z`.
    pub fn with_flip_z(flip_z: bool) -> Self {
        Self {
            source_size: default_source_size(),
            prediction_size: default_prediction_size(),
            fitting_size: default_fitting_size(),
            flip_z,
            seed: SeedPoint::default(),
            deadline_ms: default_deadline_ms(),
            retry: RetryPolicy::default(),
            max_alpha_deg: default_max_alpha_deg(),
            fit_stages: default_fit_stages(),
        }
    }
}
