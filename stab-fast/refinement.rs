use crate::corner_detection::CornerDetector;
use stab_core::{GrayFrame, Keypoint};
use std::collections::HashMap;

/// Subpixel refinement, orientation and suppression of detected corners
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Refine a keypoint by fitting a quadratic to the 3x3 corner-response surface.
    ///
    /// The offset is clamped to half a pixel; flat or saddle surfaces leave the
    /// keypoint where it is.
    pub fn refine_keypoint_subpixel(img: &GrayFrame, threshold: u8, kp: Keypoint) -> Keypoint {
        let (x, y) = (kp.x.round() as i64, kp.y.round() as i64);
        let (width, height) = img.dimensions();
        if x < 1 || y < 1 || x + 1 >= width as i64 || y + 1 >= height as i64 {
            return kp;
        }

        let mut s = [[0.0f32; 3]; 3];
        for (j, row) in s.iter_mut().enumerate() {
            for (i, v) in row.iter_mut().enumerate() {
                let sx = (x + i as i64 - 1) as u32;
                let sy = (y + j as i64 - 1) as u32;
                *v = CornerDetector::corner_response(img, sx, sy, threshold);
            }
        }

        let dx = (s[1][2] - s[1][0]) / 2.0;
        let dy = (s[2][1] - s[0][1]) / 2.0;
        let dxx = s[1][2] - 2.0 * s[1][1] + s[1][0];
        let dyy = s[2][1] - 2.0 * s[1][1] + s[0][1];
        let dxy = (s[2][2] - s[2][0] - s[0][2] + s[0][0]) / 4.0;

        // Only a maximum (negative definite Hessian) gives a meaningful peak
        let det = dxx * dyy - dxy * dxy;
        if det <= 1e-6 || dxx >= 0.0 {
            return kp;
        }

        let offset_x = (-(dyy * dx - dxy * dy) / det).clamp(-0.5, 0.5);
        let offset_y = (-(dxx * dy - dxy * dx) / det).clamp(-0.5, 0.5);

        Keypoint {
            x: kp.x + offset_x,
            y: kp.y + offset_y,
            ..kp
        }
    }

    /// Orientation by the intensity centroid of a circular patch of radius `half`
    pub fn compute_orientation(img: &GrayFrame, x: f32, y: f32, half: i32) -> f32 {
        let (width, height) = (img.width() as i32, img.height() as i32);
        let (cx, cy) = (x.round() as i32, y.round() as i32);
        let r2 = half * half;

        let mut m10 = 0i64;
        let mut m01 = 0i64;
        for dy in -half..=half {
            let yy = cy + dy;
            if yy < 0 || yy >= height {
                continue;
            }
            for dx in -half..=half {
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                let xx = cx + dx;
                if xx < 0 || xx >= width {
                    continue;
                }
                let val = img.get_pixel(xx as u32, yy as u32)[0] as i64;
                m10 += dx as i64 * val;
                m01 += dy as i64 * val;
            }
        }

        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }

    /// Keep the strongest keypoints such that no two survivors are closer than `min_distance`.
    ///
    /// Survivors are bucketed in a grid of `min_distance` cells so each candidate
    /// only checks its 3x3 cell neighbourhood.
    pub fn non_maximum_suppression(keypoints: &[Keypoint], min_distance: f32) -> Vec<Keypoint> {
        if keypoints.is_empty() {
            return Vec::new();
        }
        if min_distance <= 0.0 {
            return keypoints.to_vec();
        }

        let mut sorted = keypoints.to_vec();
        sorted.sort_by(|a, b| b.response.total_cmp(&a.response));

        let cell = min_distance;
        let min_distance_sq = min_distance * min_distance;
        let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        let mut suppressed: Vec<Keypoint> = Vec::new();

        for candidate in sorted {
            let key = (
                (candidate.x / cell).floor() as i64,
                (candidate.y / cell).floor() as i64,
            );
            let mut is_local_max = true;
            'search: for gy in key.1 - 1..=key.1 + 1 {
                for gx in key.0 - 1..=key.0 + 1 {
                    let Some(bucket) = grid.get(&(gx, gy)) else {
                        continue;
                    };
                    for &idx in bucket {
                        let existing = &suppressed[idx];
                        let dx = candidate.x - existing.x;
                        let dy = candidate.y - existing.y;
                        if dx * dx + dy * dy < min_distance_sq {
                            is_local_max = false;
                            break 'search;
                        }
                    }
                }
            }

            if is_local_max {
                grid.entry(key).or_default().push(suppressed.len());
                suppressed.push(candidate);
            }
        }

        suppressed
    }
}
