//! Seams between the alignment stages.
//!
//! The controller drives these traits so each stage can be swapped or
//! instrumented independently.

use crate::{CorrespondenceSet, Estimation, FeatureSet, Frame, Result};

/// Detects keypoints and computes descriptors for one frame
pub trait FeatureExtraction {
    /// `working_pixel_size` bounds the longer side used for detection (0 = full size).
    /// Returned coordinates are in `frame`'s own pixel space.
    fn extract(&self, frame: &Frame, working_pixel_size: u32) -> Result<FeatureSet>;
}

/// Pairs up descriptors of two feature sets, `query` → `train`
pub trait FeatureMatching {
    fn match_features(&self, query: &FeatureSet, train: &FeatureSet) -> CorrespondenceSet;
}

/// Fits a transform mapping query points onto train points
pub trait TransformEstimation {
    fn estimate(&self, correspondences: &CorrespondenceSet) -> Estimation;
}

impl<T: FeatureExtraction + ?Sized> FeatureExtraction for &T {
    fn extract(&self, frame: &Frame, working_pixel_size: u32) -> Result<FeatureSet> {
        (**self).extract(frame, working_pixel_size)
    }
}

impl<T: FeatureMatching + ?Sized> FeatureMatching for &T {
    fn match_features(&self, query: &FeatureSet, train: &FeatureSet) -> CorrespondenceSet {
        (**self).match_features(query, train)
    }
}

impl<T: TransformEstimation + ?Sized> TransformEstimation for &T {
    fn estimate(&self, correspondences: &CorrespondenceSet) -> Estimation {
        (**self).estimate(correspondences)
    }
}
