use crate::controller::StabilizationController;
use stab_core::{MotionModel, Result, StabilizerConfig};
use stab_fast::DetectorBuilder;

/// Builder for creating a `StabilizationController`
#[derive(Debug, Clone, Default)]
pub struct StabilizerBuilder {
    config: StabilizerConfig,
}

impl StabilizerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Longer side used for detection, 0 for full resolution
    pub fn working_pixel_size(mut self, size: u32) -> Self {
        self.config.working_pixel_size = size;
        self
    }

    pub fn retain_result_as_anchor(mut self, retain: bool) -> Self {
        self.config.retain_result_as_anchor = retain;
        self
    }

    /// Set the number of threads for parallel processing
    pub fn threads(mut self, n_threads: usize) -> Self {
        self.config.n_threads = n_threads;
        self
    }

    /// Replace detector settings with those of a `DetectorBuilder`
    pub fn detector(mut self, detector: DetectorBuilder) -> Self {
        self.config.detector = detector.to_settings();
        self
    }

    pub fn motion_model(mut self, model: MotionModel) -> Self {
        self.config.estimator.model = model;
        self
    }

    pub fn ratio_threshold(mut self, ratio: f32) -> Self {
        self.config.matcher.ratio_threshold = ratio;
        self
    }

    pub fn max_distance(mut self, max: u32) -> Self {
        self.config.matcher.max_distance = Some(max);
        self
    }

    pub fn reprojection_threshold(mut self, pixels: f64) -> Self {
        self.config.estimator.reprojection_threshold = pixels;
        self
    }

    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.config.estimator.max_iterations = iterations;
        self
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.config.estimator.confidence = confidence;
        self
    }

    /// Fix the RANSAC seed for reproducible runs
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.estimator.seed = Some(seed);
        self
    }

    pub fn background(mut self, rgba: [u8; 4]) -> Self {
        self.config.warp.background = rgba;
        self
    }

    pub fn preset_fast(mut self) -> Self {
        self.config = StabilizerConfig::fast_preset();
        self
    }

    pub fn preset_balanced(mut self) -> Self {
        self.config = StabilizerConfig::balanced_preset();
        self
    }

    pub fn preset_precision(mut self) -> Self {
        self.config = StabilizerConfig::precision_preset();
        self
    }

    /// Validate and build the controller
    pub fn build(self) -> Result<StabilizationController> {
        StabilizationController::new(self.config)
    }

    pub fn summary(&self) -> String {
        self.config.summary()
    }

    pub fn from_config(config: StabilizerConfig) -> Self {
        Self { config }
    }

    pub fn to_config(self) -> StabilizerConfig {
        self.config
    }
}
