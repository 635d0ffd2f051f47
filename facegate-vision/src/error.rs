use std::io;
use std::path::PathBuf;

use image::ImageError;
use thiserror::Error;

/// Every way a request can end without an aligned face.
#[derive(Debug, Error)]
pub enum FaceGateError {
    /// The source could not be accepted (missing, too large, wrong extension).
    #[error("{0}")]
    Input(String),

    #[error("failed to decode image {source_name}: {source}")]
    Decode {
        source_name: String,
        #[source]
        source: ImageError,
    },

    /// No face, or a mesh with the wrong topology.
    #[error("{0}")]
    Detection(String),

    /// Carries the message of the first failing check in battery order.
    #[error("{0}")]
    Validation(String),

    /// Validation passed but the face could not be warped.
    #[error("alignment failed: {0}")]
    Alignment(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FaceGateError {
    /// Stable tag used in logs and by callers that need to branch on the cause.
    pub fn kind(&self) -> &'static str {
        match self {
            FaceGateError::Input(_) | FaceGateError::Decode { .. } => "input_error",
            FaceGateError::Detection(_) => "detection_error",
            FaceGateError::Validation(_) => "validation_failure",
            FaceGateError::Alignment(_) => "alignment_failure",
            FaceGateError::Io { .. } => "io_error",
        }
    }
}

pub type Result<T, E = FaceGateError> = std::result::Result<T, E>;
