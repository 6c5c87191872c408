use facekit_core::ModelError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceKitError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to load {}: {reason}", path.display())]
    LoadFailure { path: PathBuf, reason: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
    #[error("annotation font: {0}")]
    Font(String),
}

impl FaceKitError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        FaceKitError::LoadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<ModelError> for FaceKitError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::ModelNotFound(path) => FaceKitError::load(path, "model file not found"),
            ModelError::Ort(e) => FaceKitError::Ort(e),
            other => FaceKitError::Inference(other.to_string()),
        }
    }
}

/// Reject an absent image path the way every entry point does.
pub(crate) fn require_path(path: &std::path::Path, name: &str) -> Result<(), FaceKitError> {
    if path.as_os_str().is_empty() {
        return Err(FaceKitError::InvalidArgument(format!("please input {name}")));
    }
    Ok(())
}
