use image::Rgba;
use rayon::prelude::*;
use stab_core::{Frame, Result, StabilizeError, Transform, WarpSettings};
use tracing::debug;

/// Resamples a frame into the reference frame of a transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameWarper {
    background: Rgba<u8>,
}

impl Default for FrameWarper {
    fn default() -> Self {
        Self::new(&WarpSettings::default())
    }
}

impl FrameWarper {
    pub fn new(settings: &WarpSettings) -> Self {
        Self {
            background: Rgba(settings.background),
        }
    }

    pub fn with_background(background: [u8; 4]) -> Self {
        Self {
            background: Rgba(background),
        }
    }

    pub fn background(&self) -> Rgba<u8> {
        self.background
    }

    /// Warp `frame` so that its content lands where `transform` sends it.
    ///
    /// Each output pixel is pulled back through the inverse transform and
    /// sampled bilinearly; pixels that fall outside the source are filled with
    /// the background colour. Invalid transforms are rejected.
    pub fn warp(&self, frame: &Frame, transform: &Transform, output: (u32, u32)) -> Result<Frame> {
        transform.ensure_valid().map_err(|_| StabilizeError::InvalidTransform)?;
        let inverse = transform.inverse().ok_or(StabilizeError::InvalidTransform)?;

        let (out_w, out_h) = output;
        if out_w == 0 || out_h == 0 {
            return Ok(Frame::new(out_w, out_h));
        }

        let m = *inverse.matrix();
        let row_len = out_w as usize * 4;
        let mut buf = vec![0u8; row_len * out_h as usize];

        buf.par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
            let yf = y as f64;
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let xf = x as f64;
                let w = m[(2, 0)] * xf + m[(2, 1)] * yf + m[(2, 2)];
                let value = if w.abs() < 1e-12 {
                    self.background
                } else {
                    let sx = (m[(0, 0)] * xf + m[(0, 1)] * yf + m[(0, 2)]) / w;
                    let sy = (m[(1, 0)] * xf + m[(1, 1)] * yf + m[(1, 2)]) / w;
                    sample_bilinear(frame, sx, sy).unwrap_or(self.background)
                };
                px.copy_from_slice(&value.0);
            }
        });

        debug!(
            src_width = frame.width(),
            src_height = frame.height(),
            out_width = out_w,
            out_height = out_h,
            "warped frame"
        );
        Frame::from_raw(out_w, out_h, buf).ok_or(StabilizeError::InvalidTransform)
    }
}

/// Bilinear RGBA sample; `None` outside the half-pixel border of the image
fn sample_bilinear(frame: &Frame, x: f64, y: f64) -> Option<Rgba<u8>> {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 || !x.is_finite() || !y.is_finite() {
        return None;
    }
    let (max_x, max_y) = ((w - 1) as f64, (h - 1) as f64);
    if x < -0.5 || y < -0.5 || x > max_x + 0.5 || y > max_y + 0.5 {
        return None;
    }

    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor();
    let y0 = y.floor();
    let dx = x - x0;
    let dy = y - y0;
    let (x0, y0) = (x0 as u32, y0 as u32);
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);

    let p00 = frame.get_pixel(x0, y0).0;
    let p10 = frame.get_pixel(x1, y0).0;
    let p01 = frame.get_pixel(x0, y1).0;
    let p11 = frame.get_pixel(x1, y1).0;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] as f64 * (1.0 - dx) + p10[c] as f64 * dx;
        let bottom = p01[c] as f64 * (1.0 - dx) + p11[c] as f64 * dx;
        out[c] = (top * (1.0 - dy) + bottom * dy).round().clamp(0.0, 255.0) as u8;
    }
    Some(Rgba(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stab_core::MotionModel;

    fn pattern(width: u32, height: u32) -> Frame {
        Frame::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    #[test]
    fn test_identity_is_exact() {
        let frame = pattern(37, 23);
        let out = FrameWarper::default()
            .warp(&frame, &Transform::identity(MotionModel::Homography), (37, 23))
            .unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_translation_shifts_content() {
        let frame = pattern(40, 30);
        let out = FrameWarper::default()
            .warp(&frame, &Transform::translation(3.0, 2.0), (40, 30))
            .unwrap();
        assert_eq!(out.get_pixel(13, 12), frame.get_pixel(10, 10));
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_background_fill_and_output_size() {
        let frame = pattern(20, 20);
        let warper = FrameWarper::with_background([9, 8, 7, 255]);
        let out = warper
            .warp(&frame, &Transform::translation(100.0, 0.0), (30, 10))
            .unwrap();
        assert_eq!(out.dimensions(), (30, 10));
        assert!(out.pixels().all(|p| p.0 == [9, 8, 7, 255]));
    }

    #[test]
    fn test_invalid_transform_rejected() {
        let frame = pattern(10, 10);
        let warper = FrameWarper::default();
        for t in [
            Transform::degenerate(MotionModel::Homography),
            Transform::insufficient(MotionModel::Affine, 1),
        ] {
            assert!(matches!(
                warper.warp(&frame, &t, (10, 10)),
                Err(StabilizeError::InvalidTransform)
            ));
        }
    }

    #[test]
    fn test_half_pixel_border_counts_as_inside() {
        let frame = Frame::from_pixel(4, 4, Rgba([50, 60, 70, 255]));
        assert_eq!(sample_bilinear(&frame, -0.5, 3.5), Some(Rgba([50, 60, 70, 255])));
        assert_eq!(sample_bilinear(&frame, -0.6, 1.0), None);
    }

    #[test]
    fn test_empty_output() {
        let frame = pattern(8, 8);
        let out = FrameWarper::default()
            .warp(&frame, &Transform::identity(MotionModel::Affine), (0, 5))
            .unwrap();
        assert_eq!(out.dimensions(), (0, 5));
    }
}
