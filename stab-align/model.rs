//! Closed-form model fits from point correspondences.
//!
//! Both fits work on Hartley-normalized coordinates (centroid at the origin,
//! mean distance √2) and undo the normalization on the way out.

use nalgebra::{Matrix3, SMatrix, SVector, SymmetricEigen, Vector3};
use stab_core::MotionModel;

type Point = (f64, f64);

/// Twice the area of a triangle below which three points count as collinear
const COLLINEAR_EPS: f64 = 1.0;

/// Similarity that moves `points` to zero mean and √2 mean distance
fn normalization(points: &[Point]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    if n == 0.0 {
        return None;
    }
    let (cx, cy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
    let (cx, cy) = (cx / n, cy / n);
    let mean_dist = points
        .iter()
        .map(|&(x, y)| ((x - cx).powi(2) + (y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !(mean_dist > 1e-12) || !mean_dist.is_finite() {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    Some(Matrix3::new(
        s, 0.0, -s * cx, //
        0.0, s, -s * cy, //
        0.0, 0.0, 1.0,
    ))
}

fn apply(t: &Matrix3<f64>, (x, y): Point) -> Point {
    let p = t * Vector3::new(x, y, 1.0);
    (p.x / p.z, p.y / p.z)
}

/// True when any three of `points` are (nearly) collinear
pub fn has_collinear_triple(points: &[Point]) -> bool {
    let n = points.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let (a, b, c) = (points[i], points[j], points[k]);
                let cross = (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
                if cross.abs() < COLLINEAR_EPS {
                    return true;
                }
            }
        }
    }
    false
}

/// Fit `model` mapping `src[i]` onto `dst[i]`, least squares when over-determined
pub fn fit(model: MotionModel, src: &[Point], dst: &[Point]) -> Option<Matrix3<f64>> {
    if src.len() != dst.len() || src.len() < model.min_samples() {
        return None;
    }
    match model {
        MotionModel::Homography => fit_homography(src, dst),
        MotionModel::Affine => fit_affine(src, dst),
    }
}

/// Normalized DLT.
///
/// The null vector of A is taken as the eigenvector of AᵀA with the smallest
/// eigenvalue; this stays correct for the minimal 8x9 system.
pub fn fit_homography(src: &[Point], dst: &[Point]) -> Option<Matrix3<f64>> {
    let t_src = normalization(src)?;
    let t_dst = normalization(dst)?;

    let mut ata = SMatrix::<f64, 9, 9>::zeros();
    for (&p, &q) in src.iter().zip(dst) {
        let (x, y) = apply(&t_src, p);
        let (u, v) = apply(&t_dst, q);
        let r1 = SVector::<f64, 9>::from_column_slice(&[
            -x, -y, -1.0, 0.0, 0.0, 0.0, u * x, u * y, u,
        ]);
        let r2 = SVector::<f64, 9>::from_column_slice(&[
            0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v,
        ]);
        ata += r1 * r1.transpose();
        ata += r2 * r2.transpose();
    }

    let eig = SymmetricEigen::new(ata);
    let (k, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let h = eig.eigenvectors.column(k);
    let h_norm = Matrix3::new(
        h[0], h[1], h[2], //
        h[3], h[4], h[5], //
        h[6], h[7], h[8],
    );

    let m = t_dst.try_inverse()? * h_norm * t_src;
    m.iter().all(|v| v.is_finite()).then_some(m)
}

/// Least-squares affine fit through the 3x3 normal equations, one per output row
pub fn fit_affine(src: &[Point], dst: &[Point]) -> Option<Matrix3<f64>> {
    let t_src = normalization(src)?;
    let t_dst = normalization(dst)?;

    let mut normal = Matrix3::<f64>::zeros();
    let mut bu = Vector3::<f64>::zeros();
    let mut bv = Vector3::<f64>::zeros();
    for (&p, &q) in src.iter().zip(dst) {
        let (x, y) = apply(&t_src, p);
        let (u, v) = apply(&t_dst, q);
        let row = Vector3::new(x, y, 1.0);
        normal += row * row.transpose();
        bu += row * u;
        bv += row * v;
    }

    let inv = normal.try_inverse()?;
    let a = inv * bu;
    let b = inv * bv;
    let a_norm = Matrix3::new(
        a.x, a.y, a.z, //
        b.x, b.y, b.z, //
        0.0, 0.0, 1.0,
    );

    let m = t_dst.try_inverse()? * a_norm * t_src;
    m.iter().all(|v| v.is_finite()).then_some(m)
}
