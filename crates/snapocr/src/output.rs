//! Output formatting for CLI responses.

use snapocr_protocol::{ErrorCode, Response, ResponseData};

/// Output formatter.
pub struct Output {
    json: bool,
}

impl Output {
    /// Create a new output formatter.
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Whether JSON output is enabled.
    pub fn is_json(&self) -> bool {
        self.json
    }

    /// Print a response.
    pub fn print_response(&self, response: &Response) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(response)?);
        } else if response.success {
            if let Some(ref data) = response.data {
                self.print_data(data);
            } else {
                println!("OK");
            }
        } else if let Some(ref error) = response.error {
            eprintln!("Error [{}]: {}", error.code, error.message);
        }
        Ok(())
    }

    /// Print response data in human-readable format.
    fn print_data(&self, data: &ResponseData) {
        match data {
            ResponseData::OcrResult {
                path,
                lines,
                status,
            } => {
                if lines.is_empty() {
                    match status {
                        Some(status) => println!("No text found in {} ({})", path, status),
                        None => println!("No text found in {}", path),
                    }
                }
                for line in lines {
                    println!("{}", line.text);
                }
            }
            ResponseData::LocateResult(result) => {
                if result.matches.is_empty() {
                    println!(
                        "No matching lines found ({} lines detected)",
                        result.total_lines
                    );
                    return;
                }
                println!(
                    "Found {} line(s) ({} lines detected):",
                    result.matches.len(),
                    result.total_lines
                );
                for m in &result.matches {
                    println!(
                        "  '{}' at ({}, {}) size {}x{} - center: ({}, {})",
                        m.text, m.x, m.y, m.width, m.height, m.center_x, m.center_y
                    );
                }
            }
        }
    }

    /// Print an error message.
    pub fn print_error(&self, code: ErrorCode, message: &str) {
        if self.json {
            let response = Response::error(code, message);
            match serde_json::to_string(&response) {
                Ok(json) => println!("{}", json),
                Err(_) => eprintln!("Error [{}]: {}", code, message),
            }
        } else {
            eprintln!("Error [{}]: {}", code, message);
        }
    }
}
