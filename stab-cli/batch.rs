use crate::controller::StabilizationController;
use stab_core::{FeatureExtraction, FeatureMatching, Frame, Result, TransformEstimation};
use tracing::info;

/// Frames buffered per batch by default
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// Collects streamed frames and stabilizes them in fixed-size batches
/// against the controller's anchor
#[derive(Debug, Clone)]
pub struct FrameBatcher {
    batch_size: usize,
    pending: Vec<Frame>,
    batches: usize,
}

impl Default for FrameBatcher {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl FrameBatcher {
    /// A `batch_size` of 0 is treated as 1
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            pending: Vec::with_capacity(batch_size),
            batches: 0,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Batches stabilized so far
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Buffer `frame`; once the batch is full it is stabilized and returned
    pub fn push<E, M, T>(
        &mut self,
        frame: Frame,
        controller: &mut StabilizationController<E, M, T>,
    ) -> Result<Option<Vec<Frame>>>
    where
        E: FeatureExtraction,
        M: FeatureMatching,
        T: TransformEstimation,
    {
        self.pending.push(frame);
        if self.pending.len() < self.batch_size {
            return Ok(None);
        }
        self.flush(controller).map(Some)
    }

    /// Stabilize whatever is buffered, possibly fewer than `batch_size` frames
    pub fn flush<E, M, T>(
        &mut self,
        controller: &mut StabilizationController<E, M, T>,
    ) -> Result<Vec<Frame>>
    where
        E: FeatureExtraction,
        M: FeatureMatching,
        T: TransformEstimation,
    {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let batch = std::mem::take(&mut self.pending);
        let out = controller.stabilized_with_image_list(&batch)?;
        self.batches += 1;
        info!(batch = self.batches, frames = out.len(), "batch stabilized");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use stab_core::StabilizerConfig;

    fn frame(v: u8) -> Frame {
        Frame::from_pixel(16, 16, Rgba([v, v, v, 255]))
    }

    #[test]
    fn test_batches_fill_then_flush() {
        let mut controller = StabilizationController::new(StabilizerConfig::default()).unwrap();
        controller.set_enabled(false);
        let mut batcher = FrameBatcher::default();

        assert!(batcher.push(frame(1), &mut controller).unwrap().is_none());
        assert!(batcher.push(frame(2), &mut controller).unwrap().is_none());
        let batch = batcher.push(frame(3), &mut controller).unwrap().unwrap();
        assert_eq!(batch, vec![frame(1), frame(2), frame(3)]);
        assert_eq!(batcher.pending(), 0);

        batcher.push(frame(4), &mut controller).unwrap();
        assert_eq!(batcher.flush(&mut controller).unwrap(), vec![frame(4)]);
        assert!(batcher.flush(&mut controller).unwrap().is_empty());
        assert_eq!(batcher.batches(), 2);
    }

    #[test]
    fn test_zero_batch_size_is_one() {
        assert_eq!(FrameBatcher::new(0).batch_size(), 1);
    }
}
