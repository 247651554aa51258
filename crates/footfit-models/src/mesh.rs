//! Fitted mesh and named keypoints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use footfit_core::Pt3;

/// Keypoint label for the tip of the big toe.
pub const KEYPOINT_BIG_TOE: &str = "big toe";
/// Keypoint label for the heel.
pub const KEYPOINT_HEEL: &str = "heel";

/// Triangle mesh produced by the fitter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FootMesh {
    /// Vertex positions.
    pub vertices: Vec<Pt3>,
    /// Triangle faces as vertex indices.
    pub faces: Vec<[u32; 3]>,
}

impl FootMesh {
    /// Whether every vertex coordinate is a finite number.
    ///
    /// A diverged optimization can leave NaN/Inf vertices behind; such a
    /// mesh must be rejected instead of persisted.
    pub fn is_finite(&self) -> bool {
        self.vertices
            .iter()
            .all(|v| v.x.is_finite() && v.y.is_finite() && v.z.is_finite())
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangle faces.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// Named, semantically fixed points on the fitted mesh.
///
/// Labels are the fitter's vocabulary (`big toe`, `heel`, ...); lookups are
/// by exact label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshKeypoints {
    points: BTreeMap<String, Pt3>,
}

impl MeshKeypoints {
    /// Empty keypoint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a labeled point.
    pub fn insert(&mut self, label: impl Into<String>, point: Pt3) {
        self.points.insert(label.into(), point);
    }

    /// Look up a point by label.
    pub fn get(&self, label: &str) -> Option<&Pt3> {
        self.points.get(label)
    }

    /// Number of labeled points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the set contains no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over `(label, point)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Pt3)> {
        self.points.iter().map(|(k, v)| (k.as_str(), v))
    }
}
