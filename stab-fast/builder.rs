use crate::detector::FastDetector;
use crate::error::FastResult;
use stab_core::DetectorSettings;

/// Builder for creating a `FastDetector`
#[derive(Debug, Clone, Default)]
pub struct DetectorBuilder {
    settings: DetectorSettings,
    name: Option<String>,
}

impl DetectorBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the FAST threshold (1-127)
    pub fn threshold(mut self, threshold: u8) -> Self {
        self.settings.threshold = threshold;
        self
    }

    /// Set the patch size for orientation and descriptor sampling
    pub fn patch_size(mut self, patch_size: usize) -> Self {
        self.settings.patch_size = patch_size;
        self
    }

    pub fn pyramid_levels(mut self, levels: usize) -> Self {
        self.settings.pyramid_levels = levels;
        self
    }

    pub fn scale_factor(mut self, factor: f32) -> Self {
        self.settings.scale_factor = factor;
        self
    }

    /// Set the non-maximum suppression (NMS) distance
    pub fn nms_distance(mut self, distance: f32) -> Self {
        self.settings.nms_distance = distance;
        self
    }

    pub fn max_features(mut self, max: usize) -> Self {
        self.settings.max_features = max;
        self
    }

    /// Enable or disable subpixel refinement
    pub fn subpixel_refinement(mut self, enable: bool) -> Self {
        self.settings.subpixel_refinement = enable;
        self
    }

    /// Apply the fast preset: single level, coarse threshold
    pub fn preset_fast(mut self) -> Self {
        self.settings = DetectorSettings {
            threshold: 30,
            pyramid_levels: 1,
            nms_distance: 5.0,
            max_features: 300,
            subpixel_refinement: false,
            ..DetectorSettings::default()
        };
        self.name = Some("fast".into());
        self
    }

    /// Apply the balanced preset
    pub fn preset_balanced(mut self) -> Self {
        self.settings = DetectorSettings::default();
        self.name = Some("balanced".into());
        self
    }

    /// Apply the precision preset
    pub fn preset_precision(mut self) -> Self {
        self.settings = DetectorSettings {
            threshold: 15,
            pyramid_levels: 4,
            nms_distance: 2.0,
            max_features: 1000,
            ..DetectorSettings::default()
        };
        self.name = Some("precision".into());
        self
    }

    /// Build the `FastDetector`
    pub fn build(self) -> FastResult<FastDetector> {
        FastDetector::new(self.settings)
    }

    /// Preset name, if one was applied
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Generate a summary of the builder's configuration
    pub fn summary(&self) -> String {
        let s = &self.settings;
        format!(
            "Detector{}: threshold={}, patch={}, levels={}x{:.2}, nms={:.1}, max_features={}, subpixel={}",
            self.name.as_deref().map(|n| format!(" [{}]", n)).unwrap_or_default(),
            s.threshold,
            s.patch_size,
            s.pyramid_levels,
            s.scale_factor,
            s.nms_distance,
            s.max_features,
            s.subpixel_refinement,
        )
    }

    /// Create a builder from existing settings
    pub fn from_settings(settings: DetectorSettings) -> Self {
        Self {
            settings,
            name: None,
        }
    }

    pub fn to_settings(self) -> DetectorSettings {
        self.settings
    }

    /// The three presets in increasing cost order
    pub fn presets() -> [DetectorBuilder; 3] {
        [
            Self::new().preset_fast(),
            Self::new().preset_balanced(),
            Self::new().preset_precision(),
        ]
    }
}
