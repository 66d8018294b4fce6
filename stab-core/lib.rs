mod config;
mod error;
mod features;
mod pipeline;
mod transform;

pub use config::{
    DetectorSettings, EstimatorSettings, MatcherSettings, StabilizerConfig, WarpSettings,
};
pub use error::{Result, StabilizeError};
pub use features::{Correspondence, CorrespondenceSet, Feature, FeatureSet};
pub use pipeline::{FeatureExtraction, FeatureMatching, TransformEstimation};
pub use transform::{Estimation, MotionModel, Transform, TransformStatus};

/// RGBA frame exchanged at every public boundary
pub type Frame = image::RgbaImage;

/// 8-bit luma plane used by detection and description
pub type GrayFrame = image::GrayImage;

/// Key-point ≙ FAST corner + orientation (radians) with subpixel precision,
/// expressed in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,      // Subpixel x coordinate
    pub y: f32,      // Subpixel y coordinate
    pub angle: f32,
    /// Source pixels covered by one detection pixel
    pub scale: f32,
    /// Corner response used for suppression and capping
    pub response: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            angle: 0.0,
            scale: 1.0,
            response: 0.0,
        }
    }

    /// Map a detection-space keypoint back into source coordinates.
    ///
    /// `fx`/`fy` are source pixels per detection pixel along each axis.
    /// Pixel centres map onto pixel centres.
    pub fn rescaled(self, fx: f32, fy: f32) -> Self {
        Self {
            x: (self.x + 0.5) * fx - 0.5,
            y: (self.y + 0.5) * fy - 0.5,
            scale: self.scale * (fx * fy).sqrt(),
            ..self
        }
    }
}

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; 32];

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> std::result::Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}

/// Threads to use when nothing is configured
pub fn default_thread_count() -> usize {
    num_cpus::get().max(1)
}
