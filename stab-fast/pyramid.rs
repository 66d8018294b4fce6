use crate::error::{FastError, FastResult};
use crate::types::ScaleLevel;
use image::imageops::{self, FilterType};
use stab_core::GrayFrame;

/// Levels smaller than this on either side are not worth detecting on
pub const MIN_LEVEL_SIZE: u32 = 32;

/// Image pyramid operations for multi-scale feature detection
pub struct ImagePyramid;

impl ImagePyramid {
    /// Generate scale levels for image pyramid.
    ///
    /// The base level is always present, even for images below
    /// `MIN_LEVEL_SIZE`; further levels stop once they would get too small.
    pub fn generate_scale_levels(
        width: u32,
        height: u32,
        levels: usize,
        scale_factor: f32,
    ) -> FastResult<Vec<ScaleLevel>> {
        if width == 0 || height == 0 {
            return Err(FastError::InvalidImageSize { width, height });
        }
        if levels == 0 || !(scale_factor > 1.0) {
            return Err(FastError::InvalidPyramid {
                levels,
                scale_factor,
            });
        }

        let mut out = vec![ScaleLevel {
            level: 0,
            scale: 1.0,
            width,
            height,
        }];
        let mut current_scale = 1.0f32;
        for level in 1..levels {
            current_scale *= scale_factor;
            let scaled_width = (width as f32 / current_scale).round() as u32;
            let scaled_height = (height as f32 / current_scale).round() as u32;
            if scaled_width < MIN_LEVEL_SIZE || scaled_height < MIN_LEVEL_SIZE {
                break;
            }
            out.push(ScaleLevel {
                level,
                scale: current_scale,
                width: scaled_width,
                height: scaled_height,
            });
        }

        Ok(out)
    }

    /// Build the images for each scale level; level 0 is the input itself
    pub fn build_image_pyramid(img: &GrayFrame, scale_levels: &[ScaleLevel]) -> Vec<GrayFrame> {
        scale_levels
            .iter()
            .map(|sl| {
                if sl.level == 0 {
                    img.clone()
                } else {
                    imageops::resize(img, sl.width, sl.height, FilterType::Triangle)
                }
            })
            .collect()
    }
}
