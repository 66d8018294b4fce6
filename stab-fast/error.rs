use stab_core::StabilizeError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FastError {
    #[error("Invalid image dimensions: {width}x{height} (must be > 0)")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("Invalid threshold: {0} (must be 1-127)")]
    InvalidThreshold(u8),

    #[error("Invalid patch size {0} (must be odd and at least 7)")]
    InvalidPatchSize(usize),

    #[error("Invalid pyramid: {levels} levels with scale factor {scale_factor}")]
    InvalidPyramid { levels: usize, scale_factor: f32 },
}

pub type FastResult<T> = Result<T, FastError>;

impl From<FastError> for StabilizeError {
    fn from(err: FastError) -> Self {
        match err {
            FastError::InvalidImageSize { .. } => StabilizeError::extraction(err.to_string()),
            _ => StabilizeError::Config(err.to_string()),
        }
    }
}
