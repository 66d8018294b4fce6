use crate::corner_detection::CornerDetector;
use crate::error::{FastError, FastResult};
use crate::pyramid::ImagePyramid;
use crate::refinement::KeypointRefinement;
use crate::types::{PyramidLevel, ScaleLevel};
use rayon::prelude::*;
use stab_core::{DetectorSettings, GrayFrame, Keypoint};
use std::collections::HashSet;
use tracing::debug;

/// Main FAST corner detector with multi-scale capability
#[derive(Debug, Clone, Default)]
pub struct FastDetector {
    settings: DetectorSettings,
}

impl FastDetector {
    /// Creates a new FAST detector with validation
    pub fn new(settings: DetectorSettings) -> FastResult<Self> {
        // 0 accepts every pixel; above 127 a mid-grey centre can pass
        // neither the bright nor the dark test
        if settings.threshold == 0 || settings.threshold > 127 {
            return Err(FastError::InvalidThreshold(settings.threshold));
        }
        if settings.patch_size % 2 == 0 || settings.patch_size < 7 {
            return Err(FastError::InvalidPatchSize(settings.patch_size));
        }
        if settings.pyramid_levels == 0 || !(settings.scale_factor > 1.0) {
            return Err(FastError::InvalidPyramid {
                levels: settings.pyramid_levels,
                scale_factor: settings.scale_factor,
            });
        }
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Keypoints in base-image coordinates, `scale` set to their pyramid level scale
    pub fn detect_keypoints(&self, img: &GrayFrame) -> FastResult<Vec<Keypoint>> {
        let base = img.dimensions();
        let levels = self.detect_pyramid(img)?;
        Ok(levels
            .into_iter()
            .flat_map(|pl| {
                let (fx, fy) = pl.level.factors(base);
                pl.keypoints.into_iter().map(move |kp| kp.rescaled(fx, fy))
            })
            .collect())
    }

    /// Detect on every pyramid level.
    ///
    /// Each level keeps its image so descriptors can be sampled where the
    /// keypoint was found. Keypoints stay in level coordinates, and the
    /// `max_features` cap is applied across all levels together.
    pub fn detect_pyramid(&self, img: &GrayFrame) -> FastResult<Vec<PyramidLevel>> {
        let (width, height) = img.dimensions();
        let scale_levels = ImagePyramid::generate_scale_levels(
            width,
            height,
            self.settings.pyramid_levels,
            self.settings.scale_factor,
        )?;
        let images = ImagePyramid::build_image_pyramid(img, &scale_levels);

        let mut levels: Vec<PyramidLevel> = scale_levels
            .into_par_iter()
            .zip(images.into_par_iter())
            .map(|(level, image)| {
                let keypoints = self.detect_at_level(&image, &level);
                PyramidLevel {
                    level,
                    image,
                    keypoints,
                }
            })
            .collect();

        self.cap_features(&mut levels);

        debug!(
            width,
            height,
            levels = levels.len(),
            keypoints = levels.iter().map(|l| l.keypoints.len()).sum::<usize>(),
            "FAST detection"
        );
        Ok(levels)
    }

    fn detect_at_level(&self, img: &GrayFrame, level: &ScaleLevel) -> Vec<Keypoint> {
        let s = &self.settings;
        let corners = CornerDetector::detect(img, s.threshold);
        let mut keypoints = KeypointRefinement::non_maximum_suppression(&corners, s.nms_distance);

        if s.subpixel_refinement {
            for kp in keypoints.iter_mut() {
                *kp = KeypointRefinement::refine_keypoint_subpixel(img, s.threshold, *kp);
            }
        }

        // Descriptor patches must fit inside the level image
        let half = (s.patch_size / 2) as f32;
        let (w, h) = (level.width as f32, level.height as f32);
        keypoints.retain(|kp| kp.x >= half && kp.y >= half && kp.x < w - half && kp.y < h - half);

        for kp in keypoints.iter_mut() {
            kp.angle = KeypointRefinement::compute_orientation(img, kp.x, kp.y, half as i32);
        }
        keypoints
    }

    /// Keep the globally strongest `max_features`, preserving per-level order
    fn cap_features(&self, levels: &mut [PyramidLevel]) {
        let total: usize = levels.iter().map(|l| l.keypoints.len()).sum();
        if total <= self.settings.max_features {
            return;
        }

        let mut ranked: Vec<(usize, usize, f32)> = levels
            .iter()
            .enumerate()
            .flat_map(|(li, l)| {
                l.keypoints
                    .iter()
                    .enumerate()
                    .map(move |(ki, kp)| (li, ki, kp.response))
            })
            .collect();
        ranked.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));
        let keep: HashSet<(usize, usize)> = ranked
            .into_iter()
            .take(self.settings.max_features)
            .map(|(li, ki, _)| (li, ki))
            .collect();

        for (li, level) in levels.iter_mut().enumerate() {
            let mut ki = 0;
            level.keypoints.retain(|_| {
                let kept = keep.contains(&(li, ki));
                ki += 1;
                kept
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Checkerboard of bright squares on dark ground; every square contributes corners
    fn squares(width: u32, height: u32, step: u32) -> GrayFrame {
        GrayFrame::from_fn(width, height, |x, y| {
            if (x / step + y / step) % 2 == 0 && x % step > 2 && y % step > 2 {
                Luma([210])
            } else {
                Luma([30])
            }
        })
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let bad_threshold = DetectorSettings {
            threshold: 0,
            ..DetectorSettings::default()
        };
        assert_eq!(
            FastDetector::new(bad_threshold).unwrap_err(),
            FastError::InvalidThreshold(0)
        );
        let too_high = DetectorSettings {
            threshold: 128,
            ..DetectorSettings::default()
        };
        assert_eq!(
            FastDetector::new(too_high).unwrap_err(),
            FastError::InvalidThreshold(128)
        );
        let highest = DetectorSettings {
            threshold: 127,
            ..DetectorSettings::default()
        };
        assert!(FastDetector::new(highest).is_ok());

        let bad_patch = DetectorSettings {
            patch_size: 30,
            ..DetectorSettings::default()
        };
        assert!(matches!(
            FastDetector::new(bad_patch),
            Err(FastError::InvalidPatchSize(30))
        ));
    }

    #[test]
    fn test_zero_size_image_is_error() {
        let det = FastDetector::new(DetectorSettings::default()).unwrap();
        let img = GrayFrame::new(0, 0);
        assert!(matches!(
            det.detect_pyramid(&img),
            Err(FastError::InvalidImageSize { .. })
        ));
    }

    #[test]
    fn test_tiny_image_yields_no_keypoints() {
        let det = FastDetector::new(DetectorSettings::default()).unwrap();
        let img = GrayFrame::from_pixel(6, 6, Luma([100]));
        assert!(det.detect_keypoints(&img).unwrap().is_empty());
    }

    #[test]
    fn test_keypoints_respect_patch_border() {
        let settings = DetectorSettings::default();
        let half = (settings.patch_size / 2) as f32;
        let det = FastDetector::new(settings).unwrap();
        let img = squares(160, 120, 16);
        let levels = det.detect_pyramid(&img).unwrap();
        assert!(levels[0].keypoints.len() > 10);
        for level in &levels {
            for kp in &level.keypoints {
                assert!(kp.x >= half && kp.y >= half);
                assert!(kp.x < level.level.width as f32 - half);
                assert!(kp.y < level.level.height as f32 - half);
                assert!(kp.angle.is_finite());
            }
        }
    }

    #[test]
    fn test_max_features_cap() {
        let settings = DetectorSettings {
            max_features: 25,
            ..DetectorSettings::default()
        };
        let det = FastDetector::new(settings).unwrap();
        let kps = det.detect_keypoints(&squares(200, 160, 12)).unwrap();
        assert_eq!(kps.len(), 25);
    }

    #[test]
    fn test_base_coordinates_scale_with_level() {
        let det = FastDetector::new(DetectorSettings::default()).unwrap();
        let img = squares(200, 160, 16);
        let levels = det.detect_pyramid(&img).unwrap();
        let flat = det.detect_keypoints(&img).unwrap();
        let expected: usize = levels.iter().map(|l| l.keypoints.len()).sum();
        assert_eq!(flat.len(), expected);
        for kp in &flat {
            assert!(kp.scale >= 1.0);
            assert!(kp.x < 200.0 && kp.y < 160.0);
        }
    }
}
