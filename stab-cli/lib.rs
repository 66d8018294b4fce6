//! Feature-based image stabilization.
//!
//! `StabilizationController` aligns frames to an anchor by extracting FAST
//! keypoints with steered BRIEF descriptors, matching them with a ratio test,
//! fitting a homography or affine transform with RANSAC and warping the frame
//! into the anchor's coordinates.

pub mod batch;
pub mod builder;
pub mod controller;
pub mod diagnostics;
pub mod extractor;

pub use batch::FrameBatcher;
pub use builder::StabilizerBuilder;
pub use controller::{ExtractorReport, StabilizationController};
pub use extractor::FeatureExtractor;

pub use stab_align::{FeatureMatcher, FrameWarper, TransformEstimator};
pub use stab_core::{
    self, init_thread_pool, CorrespondenceSet, FeatureSet, Frame, MotionModel, Result,
    StabilizeError, StabilizerConfig, Transform,
};
pub use stab_fast::DetectorBuilder;
