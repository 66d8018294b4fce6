use crate::error::{Result, StabilizeError};
use crate::transform::MotionModel;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// FAST/pyramid settings used by feature extraction
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectorSettings {
    /// FAST intensity threshold (1-127)
    pub threshold: u8,
    /// Odd patch size for orientation and descriptor sampling
    pub patch_size: usize,
    pub pyramid_levels: usize,
    pub scale_factor: f32,
    pub nms_distance: f32,
    /// Strongest keypoints kept per image
    pub max_features: usize,
    pub subpixel_refinement: bool,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            threshold: 20,
            patch_size: 31,
            pyramid_levels: 3,
            scale_factor: 1.2,
            nms_distance: 3.0,
            max_features: 500,
            subpixel_refinement: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MatcherSettings {
    /// Lowe ratio: best must be below `ratio_threshold * second_best`
    pub ratio_threshold: f32,
    /// Optional absolute Hamming cut-off applied after the ratio test
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub max_distance: Option<u32>,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            ratio_threshold: 0.75,
            max_distance: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EstimatorSettings {
    pub model: MotionModel,
    /// Inlier cut-off in source pixels
    pub reprojection_threshold: f64,
    pub max_iterations: usize,
    /// Probability of having drawn one outlier-free sample before stopping early
    pub confidence: f64,
    /// Fixed RANSAC seed; entropy-seeded when absent
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub seed: Option<u64>,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            model: MotionModel::Homography,
            reprojection_threshold: 3.0,
            max_iterations: 2000,
            confidence: 0.995,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WarpSettings {
    /// RGBA fill for pixels that map outside the source frame
    pub background: [u8; 4],
}

impl Default for WarpSettings {
    fn default() -> Self {
        Self {
            background: [0, 0, 0, 0],
        }
    }
}

/// Complete stabilizer configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StabilizerConfig {
    /// Longer side used for detection; 0 keeps full resolution
    pub working_pixel_size: u32,
    /// Keep each `stabilize_image` output as the next anchor
    pub retain_result_as_anchor: bool,
    pub n_threads: usize,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    pub detector: DetectorSettings,
    pub matcher: MatcherSettings,
    pub estimator: EstimatorSettings,
    pub warp: WarpSettings,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            working_pixel_size: 640,
            retain_result_as_anchor: false,
            n_threads: crate::default_thread_count(),
            name: None,
            detector: DetectorSettings::default(),
            matcher: MatcherSettings::default(),
            estimator: EstimatorSettings::default(),
            warp: WarpSettings::default(),
        }
    }
}

impl StabilizerConfig {
    /// Fast preset optimized for speed
    pub fn fast_preset() -> Self {
        Self {
            working_pixel_size: 480,
            detector: DetectorSettings {
                threshold: 30,
                pyramid_levels: 1,
                nms_distance: 5.0,
                max_features: 300,
                subpixel_refinement: false,
                ..DetectorSettings::default()
            },
            estimator: EstimatorSettings {
                max_iterations: 500,
                ..EstimatorSettings::default()
            },
            name: Some("Fast".to_string()),
            ..Self::default()
        }
    }

    /// Default settings, named
    pub fn balanced_preset() -> Self {
        Self {
            name: Some("Balanced".to_string()),
            ..Self::default()
        }
    }

    /// Precision preset: more features at higher resolution, tighter inliers
    pub fn precision_preset() -> Self {
        Self {
            working_pixel_size: 1024,
            detector: DetectorSettings {
                threshold: 15,
                pyramid_levels: 4,
                nms_distance: 2.0,
                max_features: 1000,
                ..DetectorSettings::default()
            },
            matcher: MatcherSettings {
                ratio_threshold: 0.7,
                max_distance: None,
            },
            estimator: EstimatorSettings {
                reprojection_threshold: 2.0,
                max_iterations: 4000,
                confidence: 0.999,
                ..EstimatorSettings::default()
            },
            name: Some("Precision".to_string()),
            ..Self::default()
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if d.threshold == 0 || d.threshold > 127 {
            return Err(StabilizeError::Config(format!(
                "FAST threshold {} outside 1-127",
                d.threshold
            )));
        }
        if d.patch_size % 2 == 0 || d.patch_size < 7 {
            return Err(StabilizeError::Config(format!(
                "patch size {} must be odd and at least 7",
                d.patch_size
            )));
        }
        if d.pyramid_levels == 0 || !(d.scale_factor > 1.0) {
            return Err(StabilizeError::Config(format!(
                "pyramid needs at least one level and a scale factor above 1 (got {} levels, factor {})",
                d.pyramid_levels, d.scale_factor
            )));
        }
        if d.max_features == 0 {
            return Err(StabilizeError::Config("max_features must be positive".into()));
        }
        let r = self.matcher.ratio_threshold;
        if !(r > 0.0 && r <= 1.0) {
            return Err(StabilizeError::Config(format!(
                "ratio threshold {} outside (0, 1]",
                r
            )));
        }
        let e = &self.estimator;
        if !(e.reprojection_threshold > 0.0) {
            return Err(StabilizeError::Config(
                "reprojection threshold must be positive".into(),
            ));
        }
        if e.max_iterations == 0 {
            return Err(StabilizeError::Config("max_iterations must be positive".into()));
        }
        if !(e.confidence > 0.0 && e.confidence < 1.0) {
            return Err(StabilizeError::Config(format!(
                "confidence {} outside (0, 1)",
                e.confidence
            )));
        }
        if self.n_threads == 0 {
            return Err(StabilizeError::Config("n_threads must be positive".into()));
        }
        Ok(())
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "StabilizerConfig{}: working={}px, threshold={}, levels={}, max_features={}, ratio={:.2}, model={:?}, reproj={:.1}px, iters={}, seed={:?}",
            self.name.as_deref().map(|n| format!(" [{}]", n)).unwrap_or_default(),
            self.working_pixel_size,
            self.detector.threshold,
            self.detector.pyramid_levels,
            self.detector.max_features,
            self.matcher.ratio_threshold,
            self.estimator.model,
            self.estimator.reprojection_threshold,
            self.estimator.max_iterations,
            self.estimator.seed,
        )
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| StabilizeError::Config(e.to_string()))
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| StabilizeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| StabilizeError::Config(e.to_string()))
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| StabilizeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
