use image::imageops::{self, FilterType};
use stab_brief::BriefGenerator;
use stab_core::{
    DetectorSettings, Feature, FeatureExtraction, FeatureSet, Frame, GrayFrame, Result,
    StabilizeError,
};
use stab_fast::{DetectorBuilder, FastDetector};
use tracing::debug;

/// FAST keypoints described with steered BRIEF, computed at a bounded working resolution
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    detector: FastDetector,
    brief: BriefGenerator,
}

impl FeatureExtractor {
    pub fn new(settings: DetectorSettings) -> Result<Self> {
        let brief = BriefGenerator::new(settings.patch_size);
        let detector = FastDetector::new(settings)?;
        Ok(Self { detector, brief })
    }

    pub fn from_builder(builder: DetectorBuilder) -> Result<Self> {
        Self::new(builder.to_settings())
    }

    pub fn settings(&self) -> &DetectorSettings {
        self.detector.settings()
    }

    /// Luma plane scaled so its longer side is at most `working_pixel_size`.
    ///
    /// Returns the plane and the per-axis factors mapping its pixels back to
    /// the source. Frames are never upscaled; 0 keeps full resolution.
    pub fn working_image(frame: &Frame, working_pixel_size: u32) -> (GrayFrame, (f32, f32)) {
        let gray = imageops::grayscale(frame);
        let (w, h) = gray.dimensions();
        let long_side = w.max(h);
        if working_pixel_size == 0 || long_side <= working_pixel_size {
            return (gray, (1.0, 1.0));
        }

        let factor = long_side as f32 / working_pixel_size as f32;
        let sw = ((w as f32 / factor).round() as u32).max(1);
        let sh = ((h as f32 / factor).round() as u32).max(1);
        let small = imageops::resize(&gray, sw, sh, FilterType::Triangle);
        (small, (w as f32 / sw as f32, h as f32 / sh as f32))
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        let detector = FastDetector::default();
        Self {
            brief: BriefGenerator::new(detector.settings().patch_size),
            detector,
        }
    }
}

impl FeatureExtraction for FeatureExtractor {
    fn extract(&self, frame: &Frame, working_pixel_size: u32) -> Result<FeatureSet> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(StabilizeError::extraction(format!(
                "frame has zero dimension ({}x{})",
                width, height
            )));
        }

        let (work, (wx, wy)) = Self::working_image(frame, working_pixel_size);
        let levels = self.detector.detect_pyramid(&work)?;

        let mut features = Vec::new();
        for level in &levels {
            let descriptors = self.brief.describe(&level.image, &level.keypoints);
            let (lx, ly) = level.level.factors(work.dimensions());
            let (fx, fy) = (lx * wx, ly * wy);
            features.extend(level.keypoints.iter().zip(descriptors).map(|(kp, descriptor)| Feature {
                keypoint: kp.rescaled(fx, fy),
                descriptor,
            }));
        }

        debug!(
            width,
            height,
            working_width = work.width(),
            working_height = work.height(),
            features = features.len(),
            "extracted features"
        );
        Ok(FeatureSet::new(width, height, features))
    }
}
