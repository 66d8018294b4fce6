use image::GrayImage;
use imageproc::filter::gaussian_blur_f32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use stab_core::{Descriptor, GrayFrame, Keypoint};

const DESCRIPTOR_SIZE: usize = 32;
const DESCRIPTOR_BITS: usize = DESCRIPTOR_SIZE * 8;

/// Fixed so every generator (and every run) shares one test pattern
const PATTERN_SEED: u64 = 0x5EED_B41E;

/// Blur applied before sampling; BRIEF tests are noise-sensitive otherwise
pub const SMOOTHING_SIGMA: f32 = 2.0;

/// Steered BRIEF: 256 intensity comparisons rotated by the keypoint angle
#[derive(Debug, Clone)]
pub struct BriefGenerator {
    pairs: Vec<(f32, f32, f32, f32)>,
    radius: i32,
}

impl BriefGenerator {
    /// Test pairs lie in a disc two pixels inside the patch, so any rotation
    /// of them stays within `patch_size / 2` of the keypoint.
    pub fn new(patch_size: usize) -> Self {
        let radius = ((patch_size / 2) as i32 - 2).max(1);
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let point = |rng: &mut StdRng| loop {
            let dx = rng.gen_range(-radius..=radius);
            let dy = rng.gen_range(-radius..=radius);
            if dx * dx + dy * dy <= radius * radius {
                return (dx as f32, dy as f32);
            }
        };

        let mut pairs = Vec::with_capacity(DESCRIPTOR_BITS);
        while pairs.len() < DESCRIPTOR_BITS {
            let (x1, y1) = point(&mut rng);
            let (x2, y2) = point(&mut rng);
            if (x1, y1) != (x2, y2) {
                pairs.push((x1, y1, x2, y2));
            }
        }
        Self { pairs, radius }
    }

    /// Sampling radius of the test pattern in level pixels
    pub fn radius(&self) -> i32 {
        self.radius
    }

    /// Gaussian-smoothed copy of `img` to sample descriptors from
    pub fn smooth(img: &GrayFrame) -> GrayFrame {
        gaussian_blur_f32(img, SMOOTHING_SIGMA)
    }

    /// Blur `img` and describe `kps`, which must be in `img`'s coordinates
    pub fn describe(&self, img: &GrayFrame, kps: &[Keypoint]) -> Vec<Descriptor> {
        if kps.is_empty() {
            return Vec::new();
        }
        self.generate_descriptors(&Self::smooth(img), kps)
    }

    /// One descriptor per keypoint, in order. `img` should already be smoothed.
    pub fn generate_descriptors(&self, img: &GrayImage, kps: &[Keypoint]) -> Vec<Descriptor> {
        kps.par_iter()
            .map(|kp| {
                let (s, c) = kp.angle.sin_cos();
                let (cx, cy) = (kp.x, kp.y);
                let mut d = [0u8; DESCRIPTOR_SIZE];

                for (i, &(dx1, dy1, dx2, dy2)) in self.pairs.iter().enumerate() {
                    let (rx1, ry1) = (cx + c * dx1 - s * dy1, cy + s * dx1 + c * dy1);
                    let (rx2, ry2) = (cx + c * dx2 - s * dy2, cy + s * dx2 + c * dy2);

                    let val1 = bilinear_sample(img, rx1, ry1);
                    let val2 = bilinear_sample(img, rx2, ry2);

                    let bit = (val1 < val2) as u8;
                    d[i / 8] |= bit << (i % 8);
                }
                d
            })
            .collect()
    }
}

/// Number of differing bits between two descriptors
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Bilinear interpolation for subpixel sampling, clamped at the borders
fn bilinear_sample(img: &GrayImage, x: f32, y: f32) -> f32 {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }
    let max_x = (w - 1) as f32;
    let max_y = (h - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor();
    let y0 = y.floor();
    let dx = x - x0;
    let dy = y - y0;

    let x0_idx = x0 as u32;
    let y0_idx = y0 as u32;
    let x1_idx = (x0_idx + 1).min(w - 1);
    let y1_idx = (y0_idx + 1).min(h - 1);

    let p00 = img.get_pixel(x0_idx, y0_idx)[0] as f32;
    let p10 = img.get_pixel(x1_idx, y0_idx)[0] as f32;
    let p01 = img.get_pixel(x0_idx, y1_idx)[0] as f32;
    let p11 = img.get_pixel(x1_idx, y1_idx)[0] as f32;

    let top = p00 * (1.0 - dx) + p10 * dx;
    let bottom = p01 * (1.0 - dx) + p11 * dx;

    top * (1.0 - dy) + bottom * dy
}
