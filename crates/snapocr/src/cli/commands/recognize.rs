//! Recognize command implementation.

use std::sync::Arc;

use snapocr_engine::OcrEngine;
use snapocr_protocol::{Response, ResponseData};
use tracing::debug;

use super::{error_code, expand_images, read_image};
use crate::cli::RecognizeArgs;
use crate::output::Output;

pub async fn run(engine: Arc<OcrEngine>, args: RecognizeArgs, output: &Output) -> anyhow::Result<()> {
    let paths = expand_images(&args.images)?;
    let show_headers = paths.len() > 1 && !output.is_json();

    let mut failures = 0;
    for (index, path) in paths.iter().enumerate() {
        let shown = path.display().to_string();
        if show_headers {
            if index > 0 {
                println!();
            }
            println!("==> {} <==", shown);
        }

        match read_image(&engine, path).await {
            Ok(result) => {
                debug!("{}: {} lines", shown, result.lines.len());
                output.print_response(&Response::success(ResponseData::OcrResult {
                    path: shown,
                    lines: result.lines,
                    status: result.status,
                }))?;
            }
            Err(e) => {
                failures += 1;
                output.print_error(error_code(&e), &format!("{:#}", e));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} images could not be read", failures, paths.len());
    }
    Ok(())
}
