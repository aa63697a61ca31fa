use thiserror::Error;

pub type Result<T> = std::result::Result<T, SpotterError>;

#[derive(Error, Debug)]
pub enum SpotterError {
    /// The audio source could not be parsed as audio
    #[error("Audio decode error: {0}")]
    Decode(#[from] hound::Error),

    /// No classifier could be loaded from the configured artifact
    #[error("No classifier could be found.")]
    ClassifierUnavailable,

    #[error("Model loading error: {0}")]
    ModelLoadError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Clip has {samples} samples, at most {max} are accepted")]
    ClipTooLong { samples: usize, max: usize },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpotterError {
    /// Conditions a caller can retry once a classifier artifact is in place
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SpotterError::ClassifierUnavailable)
    }

    /// Conditions caused by the uploaded audio rather than by the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SpotterError::Decode(_) | SpotterError::ClipTooLong { .. }
        )
    }
}
