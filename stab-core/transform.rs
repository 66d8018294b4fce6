use crate::error::{Result, StabilizeError};
use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Smallest |det| accepted for a usable transform
pub const MIN_DETERMINANT: f64 = 1e-6;
/// Largest |det| accepted; anything beyond is a wild scale blow-up
pub const MAX_DETERMINANT: f64 = 1e6;

/// 2-D motion model fitted between frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MotionModel {
    /// Planar perspective, 8 degrees of freedom
    #[default]
    Homography,
    /// Affine, 6 degrees of freedom
    Affine,
}

impl MotionModel {
    /// Correspondences needed for a minimal fit
    pub fn min_samples(self) -> usize {
        match self {
            MotionModel::Homography => 4,
            MotionModel::Affine => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStatus {
    Valid,
    InsufficientCorrespondences { found: usize, required: usize },
    Degenerate,
}

/// 3x3 mapping from source-image coordinates into reference-frame coordinates.
///
/// A `Valid` transform is only produced after a finiteness and determinant
/// check, so it is always invertible. Invalid transforms carry the reason
/// estimation failed and refuse to map points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    matrix: Matrix3<f64>,
    model: MotionModel,
    status: TransformStatus,
}

impl Transform {
    pub fn identity(model: MotionModel) -> Self {
        Self {
            matrix: Matrix3::identity(),
            model,
            status: TransformStatus::Valid,
        }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self::identity(MotionModel::Affine).with_matrix(Matrix3::new(
            1.0, 0.0, dx, //
            0.0, 1.0, dy, //
            0.0, 0.0, 1.0,
        ))
    }

    /// Validate a raw matrix; the result is `Degenerate` if it cannot be used
    pub fn from_matrix(matrix: Matrix3<f64>, model: MotionModel) -> Self {
        let normalized = match model {
            MotionModel::Affine => {
                let mut m = matrix;
                m[(2, 0)] = 0.0;
                m[(2, 1)] = 0.0;
                m[(2, 2)] = 1.0;
                Some(m)
            }
            MotionModel::Homography => {
                let w = matrix[(2, 2)];
                if w.abs() < 1e-12 || !w.is_finite() {
                    None
                } else {
                    Some(matrix / w)
                }
            }
        };

        match normalized {
            Some(m) if Self::is_well_conditioned(&m) => Self {
                matrix: m,
                model,
                status: TransformStatus::Valid,
            },
            _ => Self::degenerate(model),
        }
    }

    pub fn insufficient(model: MotionModel, found: usize) -> Self {
        Self {
            matrix: Matrix3::identity(),
            model,
            status: TransformStatus::InsufficientCorrespondences {
                found,
                required: model.min_samples(),
            },
        }
    }

    pub fn degenerate(model: MotionModel) -> Self {
        Self {
            matrix: Matrix3::identity(),
            model,
            status: TransformStatus::Degenerate,
        }
    }

    fn with_matrix(self, matrix: Matrix3<f64>) -> Self {
        Self::from_matrix(matrix, self.model)
    }

    fn is_well_conditioned(m: &Matrix3<f64>) -> bool {
        if m.iter().any(|v| !v.is_finite()) {
            return false;
        }
        let det = m.determinant().abs();
        det > MIN_DETERMINANT && det < MAX_DETERMINANT
    }

    pub fn is_valid(&self) -> bool {
        self.status == TransformStatus::Valid
    }

    pub fn status(&self) -> TransformStatus {
        self.status
    }

    pub fn model(&self) -> MotionModel {
        self.model
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Turn an invalid status into the matching error
    pub fn ensure_valid(&self) -> Result<&Self> {
        match self.status {
            TransformStatus::Valid => Ok(self),
            TransformStatus::InsufficientCorrespondences { found, required } => {
                Err(StabilizeError::InsufficientCorrespondences { found, required })
            }
            TransformStatus::Degenerate => Err(StabilizeError::DegenerateTransform),
        }
    }

    /// Map a point; `None` for invalid transforms or points sent to infinity
    pub fn apply(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        if !self.is_valid() {
            return None;
        }
        let p = self.matrix * Vector3::new(x, y, 1.0);
        if p.z.abs() < 1e-12 {
            return None;
        }
        Some((p.x / p.z, p.y / p.z))
    }

    pub fn inverse(&self) -> Option<Transform> {
        if !self.is_valid() {
            return None;
        }
        let inv = self.matrix.try_inverse()?;
        let t = Self::from_matrix(inv, self.model);
        t.is_valid().then_some(t)
    }

    /// Euclidean distance between the mapped `from` and `to`
    pub fn reprojection_error(&self, from: (f64, f64), to: (f64, f64)) -> f64 {
        match self.apply(from.0, from.1) {
            Some((x, y)) => ((x - to.0).powi(2) + (y - to.1).powi(2)).sqrt(),
            None => f64::INFINITY,
        }
    }
}

/// Result of robust estimation over one correspondence set
#[derive(Debug, Clone, PartialEq)]
pub struct Estimation {
    pub transform: Transform,
    /// Positions (into the correspondence set) consistent with `transform`
    pub inliers: Vec<usize>,
    /// Hypotheses evaluated
    pub iterations: usize,
}

impl Estimation {
    pub fn failed(transform: Transform) -> Self {
        Self {
            transform,
            inliers: Vec::new(),
            iterations: 0,
        }
    }

    pub fn inlier_ratio(&self, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            self.inliers.len() as f64 / total as f64
        }
    }
}
