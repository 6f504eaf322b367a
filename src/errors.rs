use std::path::PathBuf;
use thiserror::Error;

use crate::pipeline::Stage;

/// Structured error types for the avatar pipeline.
///
/// Each variant carries the context of the domain it comes from (filesystem,
/// a pipeline stage, the model, matting) so the orchestrator can report a
/// readable single-line message without parsing strings.
#[derive(Error, Debug)]
pub enum AvatarSegError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}: {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {stage} failed (file: {path}): {source}")]
    ImageProcessing {
        path: String,
        stage: Stage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model error: {operation} failed: {source}")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The matting pass could not produce an alpha matte. Recovered by the
    /// simple segmentation path.
    #[error("Matting error: {reason}")]
    Matting { reason: String },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, AvatarSegError>;

impl AvatarSegError {
    pub(crate) fn at_stage(self, path: &std::path::Path, stage: Stage) -> Self {
        match self {
            // already carries its own context
            err @ (Self::FileSystem { .. } | Self::ImageProcessing { .. }) => err,
            other => Self::ImageProcessing {
                path: path.display().to_string(),
                stage,
                source: Box::new(other),
            },
        }
    }
}

/// Convert I/O errors to filesystem errors.
///
/// Code that knows the path and operation should build
/// `AvatarSegError::FileSystem` directly instead of relying on this.
impl From<std::io::Error> for AvatarSegError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<image::ImageError> for AvatarSegError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            stage: Stage::Loaded,
            source: Box::new(err),
        }
    }
}

/// Mask application rejects mismatched or unusable inputs.
impl From<imageops_ai::AlphaMaskError> for AvatarSegError {
    fn from(err: imageops_ai::AlphaMaskError) -> Self {
        Self::Validation {
            field: "alpha mask".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<ort::Error> for AvatarSegError {
    fn from(err: ort::Error) -> Self {
        Self::Model {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Shape errors only show up while reshaping model tensors, so they are
/// reported as model errors.
impl From<ndarray::ShapeError> for AvatarSegError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}
