use crate::types::CornerType;
use crate::utils::has_contiguous_arc;
use rayon::prelude::*;
use stab_core::{GrayFrame, Keypoint};

/// Contiguous ring pixels required for a FAST-9 corner
pub const ARC_LENGTH: usize = 9;

/// Distance from the image edge at which the ring still fits
pub const RING_RADIUS: u32 = 3;

/// FAST segment-test corner detection
pub struct CornerDetector;

impl CornerDetector {
    /// FAST circle offsets for corner detection, clockwise from 12 o'clock
    pub const FAST_OFFSETS: [(i32, i32); 16] = [
        (0, -3), (1, -3), (2, -2), (3, -1),
        (3, 0), (3, 1), (2, 2), (1, 3),
        (0, 3), (-1, 3), (-2, 2), (-3, 1),
        (-3, 0), (-3, -1), (-2, -2), (-1, -3),
    ];

    /// Detect corners row-parallel; keypoints carry their response and
    /// integer level coordinates, ordered by row then column
    pub fn detect(img: &GrayFrame, threshold: u8) -> Vec<Keypoint> {
        let (width, height) = img.dimensions();
        if width < 2 * RING_RADIUS + 1 || height < 2 * RING_RADIUS + 1 {
            return Vec::new();
        }

        (RING_RADIUS..height - RING_RADIUS)
            .into_par_iter()
            .flat_map_iter(|y| {
                let mut row = Vec::new();
                for x in RING_RADIUS..width - RING_RADIUS {
                    let response = Self::corner_response(img, x, y, threshold);
                    if response > 0.0 {
                        let mut kp = Keypoint::new(x as f32, y as f32);
                        kp.response = response;
                        row.push(kp);
                    }
                }
                row
            })
            .collect()
    }

    /// Segment test at one pixel
    pub(crate) fn classify(img: &GrayFrame, x: u32, y: u32, threshold: u8) -> CornerType {
        let center = img.get_pixel(x, y)[0] as i32;
        let t = threshold as i32;

        let mut bright = 0u16;
        let mut dark = 0u16;
        for (i, &(dx, dy)) in Self::FAST_OFFSETS.iter().enumerate() {
            let p = Self::ring_pixel(img, x, y, dx, dy);
            if p > center + t {
                bright |= 1 << i;
            } else if p < center - t {
                dark |= 1 << i;
            }
        }

        // Any 9-arc must cover at least two of the four compass points
        let compass = |mask: u16| (mask & 0x1111).count_ones() >= 2;
        if compass(bright) && has_contiguous_arc(bright, ARC_LENGTH) {
            CornerType::Bright
        } else if compass(dark) && has_contiguous_arc(dark, ARC_LENGTH) {
            CornerType::Dark
        } else {
            CornerType::None
        }
    }

    /// Mean squared ring contrast beyond the threshold, 0 when not a corner
    pub fn corner_response(img: &GrayFrame, x: u32, y: u32, threshold: u8) -> f32 {
        let (width, height) = img.dimensions();
        if x < RING_RADIUS
            || y < RING_RADIUS
            || x + RING_RADIUS >= width
            || y + RING_RADIUS >= height
        {
            return 0.0;
        }

        let corner_type = Self::classify(img, x, y, threshold);
        if corner_type == CornerType::None {
            return 0.0;
        }

        let center = img.get_pixel(x, y)[0] as f32;
        let mut sum_diff = 0.0f32;
        let mut count = 0;
        for &(dx, dy) in Self::FAST_OFFSETS.iter() {
            let p = Self::ring_pixel(img, x, y, dx, dy) as f32;
            let diff = match corner_type {
                CornerType::Bright => p - center,
                CornerType::Dark => center - p,
                CornerType::None => 0.0,
            };
            if diff > threshold as f32 {
                sum_diff += diff * diff;
                count += 1;
            }
        }

        if count > 0 {
            sum_diff / count as f32
        } else {
            0.0
        }
    }

    #[inline]
    fn ring_pixel(img: &GrayFrame, x: u32, y: u32, dx: i32, dy: i32) -> i32 {
        let px = (x as i32 + dx) as u32;
        let py = (y as i32 + dy) as u32;
        img.get_pixel(px, py)[0] as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn uniform(width: u32, height: u32, value: u8) -> GrayFrame {
        GrayFrame::from_pixel(width, height, Luma([value]))
    }

    /// Bright square on a dark background; its corners are FAST corners
    fn square_image(width: u32, height: u32) -> GrayFrame {
        let mut img = uniform(width, height, 40);
        for y in height / 2 - 5..height / 2 + 5 {
            for x in width / 2 - 5..width / 2 + 5 {
                img.put_pixel(x, y, Luma([220]));
            }
        }
        img
    }

    #[test]
    fn test_uniform_image_has_no_corners() {
        assert!(CornerDetector::detect(&uniform(32, 32, 128), 20).is_empty());
    }

    #[test]
    fn test_square_corners_detected() {
        let img = square_image(40, 40);
        let corners = CornerDetector::detect(&img, 20);
        assert!(!corners.is_empty());
        // The top-left corner of the square sits at (15, 15)
        assert!(corners
            .iter()
            .any(|kp| (kp.x - 15.0).abs() <= 1.0 && (kp.y - 15.0).abs() <= 1.0));
        assert!(corners.iter().all(|kp| kp.response > 0.0 && kp.response.is_finite()));
    }

    #[test]
    fn test_straight_edge_is_not_a_corner() {
        let mut img = uniform(40, 40, 40);
        for y in 0..40 {
            for x in 20..40 {
                img.put_pixel(x, y, Luma([220]));
            }
        }
        assert!(CornerDetector::detect(&img, 20).is_empty());
    }

    #[test]
    fn test_tiny_image_is_empty_not_error() {
        assert!(CornerDetector::detect(&uniform(5, 5, 0), 20).is_empty());
    }

    #[test]
    fn test_response_is_zero_near_border() {
        let img = square_image(40, 40);
        assert_eq!(CornerDetector::corner_response(&img, 1, 1, 20), 0.0);
    }

    #[test]
    fn test_detection_is_deterministic() {
        let img = square_image(64, 48);
        let a = CornerDetector::detect(&img, 20);
        let b = CornerDetector::detect(&img, 20);
        assert_eq!(a, b);
    }
}
