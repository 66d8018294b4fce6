//! Frame-to-frame alignment: descriptor matching, RANSAC transform
//! estimation and backward warping.

pub mod estimator;
pub mod matcher;
pub mod model;
pub mod warp;

pub use estimator::TransformEstimator;
pub use matcher::FeatureMatcher;
pub use warp::FrameWarper;
