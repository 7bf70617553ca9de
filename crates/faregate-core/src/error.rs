use std::path::PathBuf;

use thiserror::Error;

use crate::boundary::BoundaryError;
use crate::frame::FrameError;
use crate::store::StoreError;

/// Failures surfaced by the pipeline's management operations.
///
/// Recognition paths never return this: they fold boundary trouble into
/// `RecognitionResult::Error` so callers branch on one closed enum.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid identity {identity:?}: use letters, digits and '-'")]
    InvalidIdentity { identity: String },
    #[error("invalid display name {name:?}: use letters, digits, spaces and '-'")]
    InvalidDisplayName { name: String },
    #[error("no face detected in image")]
    NoFaceDetected,
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("boundary error: {0}")]
    Boundary(#[from] BoundaryError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
