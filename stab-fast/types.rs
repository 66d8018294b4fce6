use stab_core::{GrayFrame, Keypoint};

/// Scale information for pyramid levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLevel {
    pub level: usize,
    pub scale: f32,
    pub width: u32,
    pub height: u32,
}

impl ScaleLevel {
    /// Base pixels per level pixel along x and y for a base image of `base` size
    pub fn factors(&self, base: (u32, u32)) -> (f32, f32) {
        (
            base.0 as f32 / self.width.max(1) as f32,
            base.1 as f32 / self.height.max(1) as f32,
        )
    }
}

/// One pyramid level together with the keypoints detected on it.
///
/// Keypoint coordinates are in this level's pixel space; `level.factors`
/// maps them to the base image.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub level: ScaleLevel,
    pub image: GrayFrame,
    pub keypoints: Vec<Keypoint>,
}

/// Corner type classification for the segment test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CornerType {
    Bright,
    Dark,
    None,
}
