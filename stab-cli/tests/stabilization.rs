use approx::assert_abs_diff_eq;
use image::Rgba;
use nalgebra::Matrix3;
use stab_cli::stab_core::{
    CorrespondenceSet, FeatureExtraction, FeatureMatching, FeatureSet,
    StabilizerConfig,
};
use stab_cli::{
    FeatureExtractor, FeatureMatcher, Frame, FrameBatcher, FrameWarper, MotionModel,
    StabilizationController, Transform, TransformEstimator,
};
use std::cell::Cell;

const WIDTH: u32 = 200;
const HEIGHT: u32 = 160;

/// Random-intensity 8px blocks, content shifted by (dx, dy)
fn texture(dx: i64, dy: i64) -> Frame {
    Frame::from_fn(WIDTH, HEIGHT, |x, y| {
        let bx = (x as i64 - dx).div_euclid(8) as u64;
        let by = (y as i64 - dy).div_euclid(8) as u64;
        let h = bx.wrapping_mul(73_856_093) ^ by.wrapping_mul(19_349_663);
        let v = (h % 251) as u8;
        Rgba([v, v.wrapping_add(40), 255 - v, 255])
    })
}

/// Mean absolute RGB difference inside a `margin` border
fn interior_difference(a: &Frame, b: &Frame, margin: u32) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for y in margin..a.height() - margin {
        for x in margin..a.width() - margin {
            let (pa, pb) = (a.get_pixel(x, y).0, b.get_pixel(x, y).0);
            for c in 0..3 {
                total += (pa[c] as f64 - pb[c] as f64).abs();
                count += 1;
            }
        }
    }
    total / count as f64
}

fn controller() -> StabilizationController {
    let mut config = StabilizerConfig::default();
    config.estimator.seed = Some(2024);
    StabilizationController::new(config).expect("default config is valid")
}

#[derive(Default)]
struct CountingExtractor {
    inner: FeatureExtractor,
    calls: Cell<usize>,
}

impl FeatureExtraction for CountingExtractor {
    fn extract(&self, frame: &Frame, working_pixel_size: u32) -> stab_cli::Result<FeatureSet> {
        self.calls.set(self.calls.get() + 1);
        self.inner.extract(frame, working_pixel_size)
    }
}

#[derive(Default)]
struct CountingMatcher {
    inner: FeatureMatcher,
    calls: Cell<usize>,
}

impl FeatureMatching for CountingMatcher {
    fn match_features(&self, query: &FeatureSet, train: &FeatureSet) -> CorrespondenceSet {
        self.calls.set(self.calls.get() + 1);
        self.inner.match_features(query, train)
    }
}

/// Keeps only the first three matches, below the homography minimum
struct StarvedMatcher;

impl FeatureMatching for StarvedMatcher {
    fn match_features(&self, query: &FeatureSet, train: &FeatureSet) -> CorrespondenceSet {
        FeatureMatcher::default()
            .match_features(query, train)
            .iter()
            .take(3)
            .copied()
            .collect()
    }
}

#[test]
fn identical_frames_come_back_unchanged() {
    let anchor = texture(0, 0);
    let mut c = controller();
    c.set_stabilize_source_image(anchor.clone());

    let out = c.stabilize_image(&anchor.clone()).unwrap();
    assert_eq!(out.dimensions(), anchor.dimensions());
    for (a, b) in out.pixels().zip(anchor.pixels()) {
        for ch in 0..4 {
            assert!((a[ch] as i32 - b[ch] as i32).abs() <= 1);
        }
    }
    assert!(c.has_prev_result());
}

#[test]
fn translation_is_removed() {
    let anchor = texture(0, 0);
    let target = texture(6, 4);
    let mut c = controller();
    c.set_stabilize_source_image(anchor.clone());

    assert!(interior_difference(&target, &anchor, 16) > 20.0);
    let out = c.stabilize_image(&target).unwrap();
    assert_abs_diff_eq!(interior_difference(&out, &anchor, 16), 0.0, epsilon = 2.0);

    // Content moved right and down, so the far corner has no source pixel
    assert_eq!(out.get_pixel(WIDTH - 1, HEIGHT - 1).0, [0, 0, 0, 0]);
    assert_ne!(out.get_pixel(0, 0).0[3], 0);
}

#[test]
fn affine_model_removes_translation() {
    let mut config = StabilizerConfig::default();
    config.estimator.model = MotionModel::Affine;
    config.estimator.seed = Some(5);
    let mut c = StabilizationController::new(config).unwrap();
    let anchor = texture(0, 0);
    c.set_stabilize_source_image(anchor.clone());
    let out = c.stabilize_image(&texture(-5, 3)).unwrap();
    assert_abs_diff_eq!(interior_difference(&out, &anchor, 16), 0.0, epsilon = 2.0);
}

#[test]
fn too_few_correspondences_pass_through() {
    let mut config = StabilizerConfig::default();
    config.estimator.seed = Some(1);
    let mut c = StabilizationController::with_stages(
        config.clone(),
        FeatureExtractor::default(),
        StarvedMatcher,
        TransformEstimator::new(config.estimator),
    );
    c.set_stabilize_source_image(texture(0, 0));
    let target = texture(4, 0);
    assert_eq!(c.stabilize_image(&target).unwrap(), target);
    assert!(!c.has_prev_result());
}

#[test]
fn featureless_target_passes_through() {
    let mut c = controller();
    c.set_stabilize_source_image(texture(0, 0));
    let flat = Frame::from_pixel(WIDTH, HEIGHT, Rgba([80, 80, 80, 255]));
    assert_eq!(c.stabilize_image(&flat).unwrap(), flat);
}

#[test]
fn disabled_controller_never_runs_the_pipeline() {
    let extractor = CountingExtractor::default();
    let matcher = CountingMatcher::default();
    let mut c = StabilizationController::with_stages(
        StabilizerConfig::default(),
        &extractor,
        &matcher,
        TransformEstimator::default(),
    );
    c.set_stabilize_source_image(texture(0, 0));
    c.set_enabled(false);

    let frames = vec![texture(2, 0), texture(4, 0), texture(6, 0)];
    assert_eq!(c.stabilize_image(&frames[0]).unwrap(), frames[0]);
    assert_eq!(c.stabilized_with_image_list(&frames).unwrap(), frames);
    assert_eq!(c.stabilized_with_prev_result(&frames).unwrap(), frames);
    assert_eq!(extractor.calls.get(), 0);
    assert_eq!(matcher.calls.get(), 0);

    c.set_enabled(true);
    c.stabilize_image(&frames[0]).unwrap();
    assert_eq!(matcher.calls.get(), 1);
}

#[test]
fn reset_clears_state_from_any_state() {
    let mut c = controller();
    c.reset_stabilizer();
    assert!(!c.has_prev_result());

    c.set_stabilize_source_image(texture(0, 0));
    c.reset_stabilizer();
    assert!(!c.has_prev_result());
    assert!(c.anchor().is_none());

    c.set_stabilize_source_image(texture(0, 0));
    c.stabilize_image(&texture(3, 3)).unwrap();
    assert!(c.has_prev_result());
    c.reset_stabilizer();
    assert!(!c.has_prev_result());
    assert!(c.anchor().is_none());
}

#[test]
fn image_list_keeps_the_first_anchor() {
    let anchor = texture(0, 0);
    let mut c = controller();
    c.set_stabilize_source_image(anchor.clone());

    let frames = vec![texture(3, 0), texture(6, 1), texture(9, 2)];
    let out = c.stabilized_with_image_list(&frames).unwrap();
    assert_eq!(out.len(), 3);
    for frame in &out {
        assert_abs_diff_eq!(interior_difference(frame, &anchor, 16), 0.0, epsilon = 2.0);
    }
    assert_eq!(c.anchor(), Some(&anchor));
}

#[test]
fn prev_result_chains_through_outputs() {
    let anchor = texture(0, 0);
    let mut c = controller();
    c.set_stabilize_source_image(anchor.clone());

    let frames = vec![texture(3, 0), texture(6, 0), texture(9, 0)];
    let out = c.stabilized_with_prev_result(&frames).unwrap();
    assert_eq!(out.len(), 3);
    assert!(c.has_prev_result());
    assert_eq!(c.anchor(), Some(&out[2]));
    // Drift does not accumulate along the chain
    for frame in &out {
        assert_abs_diff_eq!(interior_difference(frame, &anchor, 16), 0.0, epsilon = 2.5);
    }
}

#[test]
fn failed_chain_step_keeps_previous_anchor() {
    let anchor = texture(0, 0);
    let mut c = controller();
    c.set_stabilize_source_image(anchor.clone());

    let flat = Frame::from_pixel(WIDTH, HEIGHT, Rgba([80, 80, 80, 255]));
    let frames = vec![texture(3, 0), flat.clone(), texture(7, 0)];
    let out = c.stabilized_with_prev_result(&frames).unwrap();
    assert_eq!(out[1], flat);
    assert_eq!(c.anchor(), Some(&out[2]));
    assert_abs_diff_eq!(interior_difference(&out[2], &anchor, 16), 0.0, epsilon = 2.5);
}

#[test]
fn batches_use_a_fixed_anchor() {
    let anchor = texture(0, 0);
    let mut c = controller();
    c.set_stabilize_source_image(anchor.clone());
    let mut batcher = FrameBatcher::default();

    let mut stabilized = Vec::new();
    for shift in 1..=4 {
        if let Some(batch) = batcher.push(texture(shift, 0), &mut c).unwrap() {
            stabilized.extend(batch);
        }
    }
    assert_eq!(stabilized.len(), 3);
    assert_eq!(batcher.pending(), 1);
    stabilized.extend(batcher.flush(&mut c).unwrap());
    assert_eq!(stabilized.len(), 4);
    assert_eq!(c.anchor(), Some(&anchor));
}

#[test]
fn warp_round_trip_restores_interior() {
    // Linear ramp so bilinear resampling is exact up to rounding
    let frame = Frame::from_fn(120, 100, |x, y| Rgba([(x + y) as u8, x as u8, y as u8, 255]));
    let (s, c) = 0.03f64.sin_cos();
    let t = Transform::from_matrix(
        Matrix3::new(
            c, -s, 4.0, //
            s, c, -2.5, //
            1e-5, 0.0, 1.0,
        ),
        MotionModel::Homography,
    );
    let warper = FrameWarper::default();
    let there = warper.warp(&frame, &t, (120, 100)).unwrap();
    let back = warper.warp(&there, &t.inverse().unwrap(), (120, 100)).unwrap();
    assert_abs_diff_eq!(interior_difference(&back, &frame, 12), 0.0, epsilon = 1.0);
}

#[test]
fn match_rendering_marks_ransac_inliers() {
    let c = controller();
    let out = c.matched_feature(&texture(5, 2), &texture(0, 0), 0).unwrap();
    assert_eq!(out.dimensions(), (2 * WIDTH, HEIGHT));
    let green = out
        .pixels()
        .filter(|p| **p == stab_cli::diagnostics::INLIER_COLOR)
        .count();
    assert!(green > 0);
}
