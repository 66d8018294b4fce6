use thiserror::Error;

#[derive(Error, Debug)]
pub enum StabilizeError {
    #[error("Feature extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    #[error("Insufficient correspondences: found {found}, need at least {required}")]
    InsufficientCorrespondences { found: usize, required: usize },

    #[error("Estimated transform is degenerate")]
    DegenerateTransform,

    #[error("Cannot warp with an invalid transform")]
    InvalidTransform,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StabilizeError {
    pub fn extraction(reason: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            reason: reason.into(),
        }
    }

    /// Conditions that degrade stabilization to pass-through instead of failing the caller
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientCorrespondences { .. } | Self::DegenerateTransform
        )
    }
}

pub type Result<T> = std::result::Result<T, StabilizeError>;
