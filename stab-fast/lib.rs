//! FAST-9 corner detection over a scale pyramid.
//!
//! Detection works on `stab_core::GrayFrame`; keypoints come back with a
//! corner response, an intensity-centroid orientation and the pyramid scale
//! they were found at.

pub mod builder;
pub mod corner_detection;
pub mod detector;
pub mod error;
pub mod pyramid;
pub mod refinement;
pub mod types;
pub mod utils;

pub use builder::DetectorBuilder;
pub use corner_detection::CornerDetector;
pub use detector::FastDetector;
pub use error::{FastError, FastResult};
pub use pyramid::ImagePyramid;
pub use refinement::KeypointRefinement;
pub use types::{PyramidLevel, ScaleLevel};
