use crate::model;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use stab_core::{
    CorrespondenceSet, EstimatorSettings, Estimation, MotionModel, Transform, TransformEstimation,
};
use tracing::debug;

/// RANSAC over minimal homography / affine fits
#[derive(Debug, Clone, Default)]
pub struct TransformEstimator {
    settings: EstimatorSettings,
}

impl TransformEstimator {
    pub fn new(settings: EstimatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EstimatorSettings {
        &self.settings
    }

    pub fn model(&self) -> MotionModel {
        self.settings.model
    }

    /// Hypotheses needed to see one all-inlier sample with the configured confidence
    fn required_iterations(&self, inlier_ratio: f64) -> usize {
        let max = self.settings.max_iterations;
        let s = self.settings.model.min_samples() as i32;
        let w_s = inlier_ratio.powi(s);
        if w_s >= 1.0 {
            return 1;
        }
        if w_s <= 0.0 {
            return max;
        }
        let n = (1.0 - self.settings.confidence).ln() / (1.0 - w_s).ln();
        if !n.is_finite() || n < 0.0 {
            return max;
        }
        (n.ceil() as usize).clamp(1, max)
    }

    fn inliers_of(&self, transform: &Transform, src: &[(f64, f64)], dst: &[(f64, f64)]) -> Vec<usize> {
        let threshold = self.settings.reprojection_threshold;
        src.iter()
            .zip(dst)
            .enumerate()
            .filter(|(_, (p, q))| transform.reprojection_error(**p, **q) <= threshold)
            .map(|(i, _)| i)
            .collect()
    }

    /// Run RANSAC with the given random source.
    ///
    /// The returned transform maps query points onto train points. Too few
    /// correspondences give an `InsufficientCorrespondences` transform, and no
    /// consensus gives a `Degenerate` one.
    pub fn estimate_with_rng<R: Rng + ?Sized>(
        &self,
        correspondences: &CorrespondenceSet,
        rng: &mut R,
    ) -> Estimation {
        let model = self.settings.model;
        let required = model.min_samples();
        let n = correspondences.len();
        if n < required {
            debug!(found = n, required, "too few correspondences for estimation");
            return Estimation::failed(Transform::insufficient(model, n));
        }

        let src: Vec<(f64, f64)> = correspondences.iter().map(|c| c.query_point).collect();
        let dst: Vec<(f64, f64)> = correspondences.iter().map(|c| c.train_point).collect();

        let mut best: Option<(Transform, Vec<usize>)> = None;
        let mut needed = self.settings.max_iterations;
        let mut iterations = 0;
        let mut sample_src = Vec::with_capacity(required);
        let mut sample_dst = Vec::with_capacity(required);

        while iterations < needed {
            iterations += 1;

            sample_src.clear();
            sample_dst.clear();
            for i in index::sample(rng, n, required).into_iter() {
                sample_src.push(src[i]);
                sample_dst.push(dst[i]);
            }
            if model::has_collinear_triple(&sample_src) || model::has_collinear_triple(&sample_dst) {
                continue;
            }
            let Some(m) = model::fit(model, &sample_src, &sample_dst) else {
                continue;
            };
            let candidate = Transform::from_matrix(m, model);
            if !candidate.is_valid() {
                continue;
            }

            let inliers = self.inliers_of(&candidate, &src, &dst);
            let best_count = best.as_ref().map_or(0, |(_, inl)| inl.len());
            if inliers.len() > best_count {
                let ratio = inliers.len() as f64 / n as f64;
                needed = self.required_iterations(ratio).max(iterations);
                best = Some((candidate, inliers));
            }
        }

        let Some((sample_fit, inliers)) = best.filter(|(_, inl)| inl.len() >= required) else {
            debug!(iterations, "no consensus found");
            return Estimation {
                iterations,
                ..Estimation::failed(Transform::degenerate(model))
            };
        };

        // Refit on the consensus set; keep the sample fit if that loses support
        let inlier_src: Vec<_> = inliers.iter().map(|&i| src[i]).collect();
        let inlier_dst: Vec<_> = inliers.iter().map(|&i| dst[i]).collect();
        let refined = model::fit(model, &inlier_src, &inlier_dst)
            .map(|m| Transform::from_matrix(m, model))
            .filter(Transform::is_valid)
            .map(|t| {
                let support = self.inliers_of(&t, &src, &dst);
                (t, support)
            })
            .filter(|(_, support)| support.len() >= inliers.len());

        let (transform, inliers) = refined.unwrap_or((sample_fit, inliers));
        debug!(
            correspondences = n,
            inliers = inliers.len(),
            iterations,
            "RANSAC estimate"
        );
        Estimation {
            transform,
            inliers,
            iterations,
        }
    }
}

impl TransformEstimation for TransformEstimator {
    /// Seeded runs are reproducible; unseeded runs draw from OS entropy
    fn estimate(&self, correspondences: &CorrespondenceSet) -> Estimation {
        let mut rng = match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.estimate_with_rng(correspondences, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use stab_core::{Correspondence, TransformStatus};

    fn scattered(n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                let h = (i as u64).wrapping_mul(2_654_435_761) % 10_007;
                (
                    15.0 + (h % 97) as f64 * 3.1,
                    10.0 + ((h / 97) % 89) as f64 * 2.3,
                )
            })
            .collect()
    }

    fn set_from(src: &[(f64, f64)], f: impl Fn((f64, f64)) -> (f64, f64)) -> CorrespondenceSet {
        src.iter()
            .enumerate()
            .map(|(i, &p)| Correspondence::new(i, i, 0.0, p, f(p)))
            .collect()
    }

    fn seeded(model: MotionModel) -> TransformEstimator {
        TransformEstimator::new(EstimatorSettings {
            model,
            seed: Some(42),
            ..EstimatorSettings::default()
        })
    }

    #[test]
    fn test_recovers_translation_with_outliers() {
        let pts = scattered(40);
        let mut set: Vec<Correspondence> = pts
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Correspondence::new(i, i, 0.0, (x, y), (x + 5.0, y - 3.0)))
            .collect();
        // A quarter of the matches point somewhere unrelated
        for c in set.iter_mut().step_by(4) {
            c.train_point = (c.query_point.1 * 1.7 + 40.0, c.query_point.0 * 0.3 + 90.0);
        }
        let set: CorrespondenceSet = set.into_iter().collect();

        let est = seeded(MotionModel::Homography).estimate(&set);
        assert!(est.transform.is_valid());
        assert_eq!(est.inliers.len(), 30);
        let (x, y) = est.transform.apply(100.0, 50.0).unwrap();
        assert_relative_eq!(x, 105.0, epsilon = 1e-6);
        assert_relative_eq!(y, 47.0, epsilon = 1e-6);
    }

    #[test]
    fn test_affine_model() {
        let (s, c) = 0.05f64.sin_cos();
        let set = set_from(&scattered(20), |(x, y)| (c * x - s * y + 2.0, s * x + c * y + 1.0));
        let est = seeded(MotionModel::Affine).estimate(&set);
        assert!(est.transform.is_valid());
        assert_eq!(est.transform.model(), MotionModel::Affine);
        assert_eq!(est.inliers.len(), 20);
        assert!(est.iterations < 10, "all-inlier data should stop early");
    }

    #[test]
    fn test_insufficient_correspondences() {
        let set = set_from(&scattered(3), |p| p);
        let est = seeded(MotionModel::Homography).estimate(&set);
        assert_eq!(
            est.transform.status(),
            TransformStatus::InsufficientCorrespondences {
                found: 3,
                required: 4
            }
        );
        assert!(est.inliers.is_empty());
        assert_eq!(est.iterations, 0);
    }

    #[test]
    fn test_collinear_points_are_degenerate() {
        let line: Vec<(f64, f64)> = (0..10).map(|i| (i as f64 * 10.0, i as f64 * 5.0)).collect();
        let set = set_from(&line, |(x, y)| (x + 1.0, y + 1.0));
        let est = TransformEstimator::new(EstimatorSettings {
            max_iterations: 50,
            seed: Some(1),
            ..EstimatorSettings::default()
        })
        .estimate(&set);
        assert_eq!(est.transform.status(), TransformStatus::Degenerate);
        assert_eq!(est.iterations, 50);
    }

    #[test]
    fn test_seed_makes_runs_reproducible() {
        let pts = scattered(30);
        let set: CorrespondenceSet = pts
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let noise = if i % 3 == 0 { 25.0 } else { 0.0 };
                Correspondence::new(i, i, 0.0, (x, y), (x + 2.0 + noise, y))
            })
            .collect();
        let est = seeded(MotionModel::Homography);
        assert_eq!(est.estimate(&set), est.estimate(&set));
    }

    #[test]
    fn test_required_iterations_bounds() {
        let est = TransformEstimator::default();
        assert_eq!(est.required_iterations(0.0), 2000);
        assert_eq!(est.required_iterations(1.0), 1);
        let half = est.required_iterations(0.5);
        assert!(half > 1 && half < 2000);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_recovers_random_translation(dx in -40.0f64..40.0, dy in -40.0f64..40.0, seed in any::<u64>()) {
            let set = set_from(&scattered(25), |(x, y)| (x + dx, y + dy));
            let est = TransformEstimator::new(EstimatorSettings {
                seed: Some(seed),
                ..EstimatorSettings::default()
            })
            .estimate(&set);
            prop_assert!(est.transform.is_valid());
            let (x, y) = est.transform.apply(50.0, 60.0).unwrap();
            prop_assert!((x - (50.0 + dx)).abs() < 1e-4);
            prop_assert!((y - (60.0 + dy)).abs() < 1e-4);
        }
    }
}
