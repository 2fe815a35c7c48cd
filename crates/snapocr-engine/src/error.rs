//! Engine error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort engine construction or a whole OCR call.
///
/// Per-region problems (low scores, empty text, a failed crop) are reported
/// as [`snapocr_protocol::OcrStatus`] values instead.
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("label file not found: {}", path.display())]
    LabelsNotFound { path: PathBuf },

    #[error("failed to read label file {}: {source}", path.display())]
    LabelsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("label file is empty: {}", path.display())]
    EmptyLabels { path: PathBuf },

    #[error("failed to load model from {}: {message}", path.display())]
    ModelLoad { path: PathBuf, message: String },

    #[error("unexpected model output shape: {0}")]
    ModelShape(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine result type.
pub type Result<T> = std::result::Result<T, OcrError>;
