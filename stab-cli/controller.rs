use crate::diagnostics;
use crate::extractor::FeatureExtractor;
use stab_align::{FeatureMatcher, FrameWarper, TransformEstimator};
use stab_core::{
    CorrespondenceSet, FeatureExtraction, FeatureMatching, FeatureSet, Frame, Result,
    StabilizerConfig, TransformEstimation,
};
use stab_fast::DetectorBuilder;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Anchor frame plus its features, extracted on first use
#[derive(Debug, Clone)]
struct Anchor {
    frame: Frame,
    features: Option<FeatureSet>,
}

impl Anchor {
    fn new(frame: Frame) -> Self {
        Self {
            frame,
            features: None,
        }
    }
}

#[derive(Debug, Clone)]
enum StabilizerState {
    Uninitialized,
    Ready(Anchor),
    /// At least one frame has been aligned since the anchor was set
    Chaining(Anchor),
}

impl StabilizerState {
    fn anchor(&self) -> Option<&Anchor> {
        match self {
            StabilizerState::Uninitialized => None,
            StabilizerState::Ready(a) | StabilizerState::Chaining(a) => Some(a),
        }
    }

    fn anchor_mut(&mut self) -> Option<&mut Anchor> {
        match self {
            StabilizerState::Uninitialized => None,
            StabilizerState::Ready(a) | StabilizerState::Chaining(a) => Some(a),
        }
    }
}

/// Feature count and timing of one detector preset on one image
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorReport {
    pub preset: String,
    pub image_index: usize,
    pub features: usize,
    pub mean_response: f32,
    pub elapsed: Duration,
}

/// Aligns incoming frames to an anchor frame.
///
/// The stages are pluggable through the `stab_core` pipeline traits; the
/// defaults are the FAST/BRIEF extractor, the ratio-test matcher and the
/// RANSAC estimator. Frames that cannot be aligned come back unchanged.
pub struct StabilizationController<
    E = FeatureExtractor,
    M = FeatureMatcher,
    T = TransformEstimator,
> {
    extractor: E,
    matcher: M,
    estimator: T,
    warper: FrameWarper,
    config: StabilizerConfig,
    state: StabilizerState,
    enabled: bool,
}

impl StabilizationController {
    /// Controller with the default stages built from `config`
    pub fn new(config: StabilizerConfig) -> Result<Self> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.detector.clone())?;
        let matcher = FeatureMatcher::new(config.matcher.clone());
        let estimator = TransformEstimator::new(config.estimator.clone());
        Ok(Self::with_stages(config, extractor, matcher, estimator))
    }
}

impl<E, M, T> StabilizationController<E, M, T>
where
    E: FeatureExtraction,
    M: FeatureMatching,
    T: TransformEstimation,
{
    pub fn with_stages(config: StabilizerConfig, extractor: E, matcher: M, estimator: T) -> Self {
        Self {
            warper: FrameWarper::new(&config.warp),
            extractor,
            matcher,
            estimator,
            config,
            state: StabilizerState::Uninitialized,
            enabled: true,
        }
    }

    pub fn config(&self) -> &StabilizerConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Gates all pipeline work; while disabled every frame passes through
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// True once a frame has been aligned since the anchor was set
    pub fn has_prev_result(&self) -> bool {
        matches!(self.state, StabilizerState::Chaining(_))
    }

    pub fn anchor(&self) -> Option<&Frame> {
        self.state.anchor().map(|a| &a.frame)
    }

    /// Set or replace the anchor frame
    pub fn set_stabilize_source_image(&mut self, image: Frame) {
        debug!(width = image.width(), height = image.height(), "anchor set");
        self.state = StabilizerState::Ready(Anchor::new(image));
    }

    /// Drop the anchor and any chaining progress
    pub fn reset_stabilizer(&mut self) {
        debug!("stabilizer reset");
        self.state = StabilizerState::Uninitialized;
    }

    /// Align `target` to the anchor.
    ///
    /// When alignment cannot be computed the target is returned unchanged.
    /// With `retain_result_as_anchor` set, a successful output becomes the
    /// new anchor.
    pub fn stabilize_image(&mut self, target: &Frame) -> Result<Frame> {
        if !self.enabled {
            return Ok(target.clone());
        }
        if self.state.anchor().is_none() {
            warn!("no anchor set, passing frame through");
            return Ok(target.clone());
        }

        let Some(warped) = self.align_to_anchor(target)? else {
            return Ok(target.clone());
        };

        let previous = std::mem::replace(&mut self.state, StabilizerState::Uninitialized);
        let anchor = match previous {
            StabilizerState::Ready(a) | StabilizerState::Chaining(a) => {
                if self.config.retain_result_as_anchor {
                    Anchor::new(warped.clone())
                } else {
                    a
                }
            }
            StabilizerState::Uninitialized => Anchor::new(warped.clone()),
        };
        self.state = StabilizerState::Chaining(anchor);
        Ok(warped)
    }

    /// Align every frame independently to the current anchor, which stays fixed
    pub fn stabilized_with_image_list(&mut self, images: &[Frame]) -> Result<Vec<Frame>> {
        if !self.enabled || self.state.anchor().is_none() {
            if self.enabled {
                warn!(frames = images.len(), "no anchor set, passing frames through");
            }
            return Ok(images.to_vec());
        }

        let mut out = Vec::with_capacity(images.len());
        let mut aligned = 0;
        for image in images {
            match self.align_to_anchor(image)? {
                Some(warped) => {
                    aligned += 1;
                    out.push(warped);
                }
                None => out.push(image.clone()),
            }
        }
        info!(frames = images.len(), aligned, "stabilized against fixed anchor");
        Ok(out)
    }

    /// Align each frame to the previous stabilized output.
    ///
    /// The first frame is aligned to the anchor; every successful output then
    /// becomes the anchor for the next frame. A failed step outputs its input
    /// and leaves the anchor where it was.
    pub fn stabilized_with_prev_result(&mut self, images: &[Frame]) -> Result<Vec<Frame>> {
        if !self.enabled || self.state.anchor().is_none() {
            if self.enabled {
                warn!(frames = images.len(), "no anchor set, passing frames through");
            }
            return Ok(images.to_vec());
        }

        let mut out = Vec::with_capacity(images.len());
        let mut aligned = 0;
        for image in images {
            match self.align_to_anchor(image)? {
                Some(warped) => {
                    aligned += 1;
                    self.state = StabilizerState::Chaining(Anchor::new(warped.clone()));
                    out.push(warped);
                }
                None => out.push(image.clone()),
            }
        }
        info!(frames = images.len(), aligned, "stabilized against previous results");
        Ok(out)
    }

    /// Extract, match, estimate and warp one frame into the anchor's frame.
    ///
    /// `Ok(None)` means the frame should pass through unchanged.
    fn align_to_anchor(&mut self, target: &Frame) -> Result<Option<Frame>> {
        let working = self.config.working_pixel_size;
        let extractor = &self.extractor;
        let Some(anchor) = self.state.anchor_mut() else {
            return Ok(None);
        };
        if anchor.features.is_none() {
            anchor.features = Some(extractor.extract(&anchor.frame, working)?);
        }
        let Some(anchor) = self.state.anchor() else {
            return Ok(None);
        };
        let anchor_features = match &anchor.features {
            Some(f) => f,
            None => return Ok(None),
        };

        let target_features = self.extractor.extract(target, working)?;
        if anchor_features.is_empty() || target_features.is_empty() {
            warn!(
                anchor_features = anchor_features.len(),
                target_features = target_features.len(),
                "no features to match, passing frame through"
            );
            return Ok(None);
        }

        let correspondences = self
            .matcher
            .match_features(&target_features, anchor_features);
        let estimation = self.estimator.estimate(&correspondences);
        if let Err(err) = estimation.transform.ensure_valid() {
            if err.is_recoverable() {
                warn!(reason = %err, "alignment failed, passing frame through");
                return Ok(None);
            }
            return Err(err);
        }

        debug!(
            correspondences = correspondences.len(),
            inliers = estimation.inliers.len(),
            inlier_ratio = estimation.inlier_ratio(correspondences.len()),
            iterations = estimation.iterations,
            "frame aligned"
        );
        let warped = self
            .warper
            .warp(target, &estimation.transform, anchor.frame.dimensions())?;
        Ok(Some(warped))
    }

    /// Render the detected keypoints of `image`
    pub fn extract_feature(&self, image: &Frame, working_pixel_size: u32) -> Result<Frame> {
        let features = self.extractor.extract(image, working_pixel_size)?;
        Ok(diagnostics::draw_features(image, &features))
    }

    /// Render the correspondences from `image_a` to `image_b`, inliers in green
    pub fn matched_feature(
        &self,
        image_a: &Frame,
        image_b: &Frame,
        working_pixel_size: u32,
    ) -> Result<Frame> {
        let features_a = self.extractor.extract(image_a, working_pixel_size)?;
        let features_b = self.extractor.extract(image_b, working_pixel_size)?;
        let correspondences = self.matcher.match_features(&features_a, &features_b);
        let inliers = if correspondences.is_empty() {
            CorrespondenceSet::new()
        } else {
            correspondences.subset(&self.estimator.estimate(&correspondences).inliers)
        };
        Ok(diagnostics::draw_matches(
            image_a,
            &features_a,
            image_b,
            &features_b,
            &correspondences,
            &inliers,
        ))
    }

    /// One match rendering per consecutive pair of `images`
    pub fn matched_feature_with_image_list(
        &self,
        images: &[Frame],
        working_pixel_size: u32,
    ) -> Result<Vec<Frame>> {
        images
            .windows(2)
            .map(|pair| self.matched_feature(&pair[0], &pair[1], working_pixel_size))
            .collect()
    }

    /// Run each detector preset over `images` and log what it finds
    pub fn compare_extractor(&self, images: &[Frame]) {
        for report in self.extractor_comparison(images) {
            info!(
                preset = %report.preset,
                image = report.image_index,
                features = report.features,
                mean_response = report.mean_response,
                elapsed_ms = report.elapsed.as_secs_f64() * 1000.0,
                "extractor comparison"
            );
        }
    }

    /// Reports behind `compare_extractor`, one per preset and image
    pub fn extractor_comparison(&self, images: &[Frame]) -> Vec<ExtractorReport> {
        let working = self.config.working_pixel_size;
        let mut reports = Vec::new();
        for preset in DetectorBuilder::presets() {
            let name = preset.name().unwrap_or("custom").to_string();
            let extractor = match FeatureExtractor::from_builder(preset) {
                Ok(e) => e,
                Err(err) => {
                    warn!(preset = %name, reason = %err, "preset skipped");
                    continue;
                }
            };
            for (image_index, image) in images.iter().enumerate() {
                let started = Instant::now();
                match extractor.extract(image, working) {
                    Ok(features) => reports.push(ExtractorReport {
                        preset: name.clone(),
                        image_index,
                        features: features.len(),
                        mean_response: features.mean_response(),
                        elapsed: started.elapsed(),
                    }),
                    Err(err) => warn!(preset = %name, image = image_index, reason = %err, "extraction failed"),
                }
            }
        }
        reports
    }
}

impl<E, M, T> std::fmt::Debug for StabilizationController<E, M, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StabilizationController")
            .field("config", &self.config.summary())
            .field("state", &self.state)
            .field("enabled", &self.enabled)
            .finish()
    }
}
