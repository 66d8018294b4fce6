//! Overlay renderings for inspecting features and matches.

use image::{imageops, Rgba};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use stab_core::{CorrespondenceSet, FeatureSet, Frame};

pub const KEYPOINT_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
pub const ORIENTATION_COLOR: Rgba<u8> = Rgba([255, 255, 0, 255]);
pub const INLIER_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
pub const OUTLIER_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Base circle radius for a keypoint found at full resolution
const BASE_RADIUS: f32 = 3.0;

fn draw_keypoints_mut(canvas: &mut Frame, features: &FeatureSet, offset_x: f32) {
    for kp in features.keypoints() {
        let radius = (BASE_RADIUS * kp.scale).max(BASE_RADIUS);
        let (cx, cy) = (kp.x + offset_x, kp.y);
        draw_hollow_circle_mut(
            canvas,
            (cx.round() as i32, cy.round() as i32),
            radius.round() as i32,
            KEYPOINT_COLOR,
        );
        let (s, c) = kp.angle.sin_cos();
        draw_line_segment_mut(canvas, (cx, cy), (cx + c * radius, cy + s * radius), ORIENTATION_COLOR);
    }
}

/// Copy of `frame` with a circle and orientation tick per keypoint
pub fn draw_features(frame: &Frame, features: &FeatureSet) -> Frame {
    let mut canvas = frame.clone();
    draw_keypoints_mut(&mut canvas, features, 0.0);
    canvas
}

/// `query` and `train` side by side with a line per correspondence.
///
/// Every correspondence is drawn red, then `inliers` are drawn over it in green.
pub fn draw_matches(
    query: &Frame,
    query_features: &FeatureSet,
    train: &Frame,
    train_features: &FeatureSet,
    correspondences: &CorrespondenceSet,
    inliers: &CorrespondenceSet,
) -> Frame {
    let (qw, qh) = query.dimensions();
    let (tw, th) = train.dimensions();
    let mut canvas = Frame::from_pixel(qw + tw, qh.max(th), Rgba([0, 0, 0, 255]));
    imageops::replace(&mut canvas, query, 0, 0);
    imageops::replace(&mut canvas, train, qw as i64, 0);

    draw_keypoints_mut(&mut canvas, query_features, 0.0);
    draw_keypoints_mut(&mut canvas, train_features, qw as f32);

    for (set, color) in [(correspondences, OUTLIER_COLOR), (inliers, INLIER_COLOR)] {
        for c in set {
            let start = (c.query_point.0 as f32, c.query_point.1 as f32);
            let end = (c.train_point.0 as f32 + qw as f32, c.train_point.1 as f32);
            draw_line_segment_mut(&mut canvas, start, end, color);
        }
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use stab_core::{Correspondence, Feature, Keypoint};

    fn one_feature(x: f32, y: f32) -> FeatureSet {
        FeatureSet::new(
            40,
            30,
            vec![Feature {
                keypoint: Keypoint::new(x, y),
                descriptor: [0; 32],
            }],
        )
    }

    #[test]
    fn test_empty_features_leave_frame_untouched() {
        let frame = Frame::from_pixel(40, 30, Rgba([10, 20, 30, 255]));
        let out = draw_features(&frame, &FeatureSet::empty(40, 30));
        assert_eq!(out, frame);
    }

    #[test]
    fn test_keypoint_circle_is_drawn() {
        let frame = Frame::from_pixel(40, 30, Rgba([10, 20, 30, 255]));
        let out = draw_features(&frame, &one_feature(20.0, 15.0));
        assert_eq!(out.dimensions(), frame.dimensions());
        assert_eq!(*out.get_pixel(17, 15), KEYPOINT_COLOR);
    }

    #[test]
    fn test_match_canvas_layout_and_colors() {
        let a = Frame::from_pixel(40, 30, Rgba([50, 50, 50, 255]));
        let b = Frame::from_pixel(20, 50, Rgba([90, 90, 90, 255]));
        let corr: CorrespondenceSet = [
            Correspondence::new(0, 0, 1.0, (5.0, 5.0), (5.0, 5.0)),
            Correspondence::new(1, 1, 2.0, (5.0, 25.0), (5.0, 45.0)),
        ]
        .into_iter()
        .collect();
        let inliers = corr.subset(&[0]);
        let out = draw_matches(&a, &FeatureSet::empty(40, 30), &b, &FeatureSet::empty(20, 50), &corr, &inliers);
        assert_eq!(out.dimensions(), (60, 50));
        assert_eq!(*out.get_pixel(2, 40), Rgba([0, 0, 0, 255]));
        assert_eq!(*out.get_pixel(55, 2), Rgba([90, 90, 90, 255]));
        // The inlier runs horizontally along y = 5
        assert_eq!(*out.get_pixel(30, 5), INLIER_COLOR);
        assert_eq!(*out.get_pixel(5, 25), OUTLIER_COLOR);
    }
}
