use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single recognition call. Always recoverable at the page level.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("recognition timed out after {0:?}")]
    Timeout(Duration),

    #[error("recognition engine failed: {0}")]
    Engine(String),

    #[error("recognition I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("recognition request failed: {0}")]
    Http(String),
}

impl From<image::ImageError> for RecognitionError {
    fn from(err: image::ImageError) -> Self {
        RecognitionError::Engine(format!("could not encode page image: {err}"))
    }
}

/// Errors surfaced by extraction and ingestion
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Recognition(#[from] RecognitionError),

    #[error("unsupported format: .{0}")]
    UnsupportedFormat(String),

    #[error("malformed container {path}: {reason}")]
    MalformedContainer { path: PathBuf, reason: String },

    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ExtractionError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractionError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn decode(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        ExtractionError::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error must abort the caller rather than degrade to empty text
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExtractionError::Filesystem { .. } | ExtractionError::Storage(_)
        )
    }
}
