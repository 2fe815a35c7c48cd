//! Model discovery and engine construction.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use snapocr_engine::{ModelPaths, OcrConfig, OcrEngine};
use snapocr_protocol::ErrorCode;
use tracing::debug;

use crate::output::Output;

/// Expand `~` in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Find the models directory relative to the executable.
///
/// Models live at `bin/../models`, matching the release archive layout.
pub fn find_models_dir() -> Result<PathBuf> {
    let exe_path = std::env::current_exe().context("Failed to get executable path")?;

    let models_dir = exe_path
        .parent() // bin/
        .and_then(|p| p.parent()) // package root
        .map(|p| p.join("models"))
        .context("Failed to compute models directory path")?;

    if ModelPaths::in_dir(&models_dir).exist() {
        debug!("Found models directory at {:?}", models_dir);
        return Ok(models_dir);
    }

    anyhow::bail!(
        "Could not find OCR models at {:?}. Pass --models or set SNAPOCR_MODELS_DIR.",
        models_dir
    )
}

/// Load the engine on a blocking worker.
///
/// Failures are reported through `output` before being returned.
pub async fn load_engine(
    models: Option<&str>,
    config: Option<&str>,
    output: &Output,
) -> Result<Arc<OcrEngine>> {
    let models = models.map(expand_path);
    let config = config.map(expand_path);

    let loaded = tokio::task::spawn_blocking(move || -> Result<OcrEngine> {
        let config = match config {
            Some(path) => OcrConfig::from_file(&path)
                .with_context(|| format!("Failed to load config from {:?}", path))?,
            None => OcrConfig::default(),
        };
        let models_dir = match models {
            Some(dir) => dir,
            None => find_models_dir()?,
        };
        let paths = ModelPaths::in_dir(&models_dir);
        OcrEngine::with_config(&paths, config)
            .with_context(|| format!("Failed to load OCR models from {:?}", models_dir))
    })
    .await
    .context("Engine loader panicked")?;

    match loaded {
        Ok(engine) => Ok(Arc::new(engine)),
        Err(e) => {
            output.print_error(ErrorCode::ModelLoadFailed, &format!("{:#}", e));
            Err(e)
        }
    }
}
