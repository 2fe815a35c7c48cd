//! Command implementations.

pub mod find;
pub mod recognize;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use snapocr_engine::{OcrEngine, OcrError, OcrOutput};
use snapocr_protocol::ErrorCode;

/// Decode `path` and run OCR on a blocking worker.
pub(crate) async fn read_image(engine: &Arc<OcrEngine>, path: &Path) -> anyhow::Result<OcrOutput> {
    let engine = Arc::clone(engine);
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> anyhow::Result<OcrOutput> {
        let image = image::open(&path)
            .with_context(|| format!("Failed to read image {:?}", path))?
            .to_rgb8();
        Ok(engine.recognize(&image)?)
    })
    .await
    .context("OCR worker panicked")?
}

/// Map a failure to the error code reported to the caller.
pub(crate) fn error_code(error: &anyhow::Error) -> ErrorCode {
    if error.downcast_ref::<image::ImageError>().is_some() {
        return ErrorCode::InvalidImage;
    }
    match error.downcast_ref::<OcrError>() {
        Some(OcrError::InvalidImage(_)) => ErrorCode::InvalidImage,
        Some(
            OcrError::LabelsNotFound { .. }
            | OcrError::LabelsRead { .. }
            | OcrError::EmptyLabels { .. }
            | OcrError::ModelLoad { .. },
        ) => ErrorCode::ModelLoadFailed,
        _ => ErrorCode::InternalError,
    }
}

/// Expand `~` and glob patterns into image paths, keeping argument order.
pub(crate) fn expand_images(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        let expanded = shellexpand::tilde(pattern);
        if !expanded.contains(['*', '?', '[']) {
            paths.push(PathBuf::from(expanded.as_ref()));
            continue;
        }

        let mut matched: Vec<PathBuf> = glob::glob(&expanded)
            .with_context(|| format!("Invalid glob pattern '{}'", pattern))?
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .collect();
        if matched.is_empty() {
            anyhow::bail!("No images match '{}'", pattern);
        }
        matched.sort();
        paths.append(&mut matched);
    }
    Ok(paths)
}
