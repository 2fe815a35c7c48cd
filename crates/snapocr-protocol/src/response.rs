//! Response envelope printed by the CLI in JSON mode.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::result::{OcrResult, OcrStatus};

/// A response for one processed screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Whether the operation succeeded.
    pub success: bool,

    /// Response data on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,

    /// Error details on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl Response {
    /// Create a successful response with data.
    pub fn success(data: ResponseData) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorInfo {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Response data variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseData {
    /// Lines read from a screenshot.
    OcrResult {
        /// Source image path.
        path: String,
        /// Merged lines in reading order.
        lines: Vec<OcrResult>,
        /// Last soft failure recorded, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<OcrStatus>,
    },

    /// Lines matching a search query.
    LocateResult(LocateResult),
}

/// Lines matching a text query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocateResult {
    /// Source image path.
    pub path: String,
    /// Matching lines.
    pub matches: Vec<OcrMatch>,
    /// Total lines read from the image.
    pub total_lines: u32,
}

/// A line found by OCR, with click-friendly geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrMatch {
    /// Recognized text.
    pub text: String,
    /// Left edge X coordinate.
    pub x: i32,
    /// Top edge Y coordinate.
    pub y: i32,
    /// Width of bounding box.
    pub width: i32,
    /// Height of bounding box.
    pub height: i32,
    /// Center X coordinate.
    pub center_x: i32,
    /// Center Y coordinate.
    pub center_y: i32,
    /// Recognition confidence.
    pub confidence: f32,
}

impl From<&OcrResult> for OcrMatch {
    fn from(result: &OcrResult) -> Self {
        let b = result.bbox;
        Self {
            text: result.text.clone(),
            x: b.x_min,
            y: b.y_min,
            width: b.width(),
            height: b.height(),
            center_x: b.x_min + b.width() / 2,
            center_y: b.y_min + b.height() / 2,
            confidence: result.confidence,
        }
    }
}

/// Error information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
}

/// Error codes for structured error handling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Models or labels could not be loaded.
    #[error("model load failed")]
    ModelLoadFailed,

    /// The input image could not be read.
    #[error("invalid image")]
    InvalidImage,

    /// Internal engine error.
    #[error("internal error")]
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    #[test]
    fn test_success_response() {
        let resp = Response::success(ResponseData::OcrResult {
            path: "shot.png".to_string(),
            lines: vec![OcrResult::new("abc", 0.8, BoundingBox::new(0, 0, 10, 10))],
            status: None,
        });

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("\"type\":\"ocr_result\""));
        assert!(!json.contains("\"status\""));
    }

    #[test]
    fn test_error_response() {
        let resp = Response::error(ErrorCode::ModelLoadFailed, "missing det_model.rten");

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"code\":\"model_load_failed\""));
    }

    #[test]
    fn test_error_code_names() {
        let names: Vec<String> = [
            ErrorCode::ModelLoadFailed,
            ErrorCode::InvalidImage,
            ErrorCode::InternalError,
        ]
        .iter()
        .map(|code| serde_json::to_string(code).unwrap())
        .collect();
        assert_eq!(
            names,
            vec!["\"model_load_failed\"", "\"invalid_image\"", "\"internal_error\""]
        );
        assert_eq!(ErrorCode::InvalidImage.to_string(), "invalid image");
    }

    #[test]
    fn test_no_text_status_is_reported() {
        let resp = Response::success(ResponseData::OcrResult {
            path: "blank.png".to_string(),
            lines: vec![],
            status: Some(OcrStatus::NoTextRegion),
        });

        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"lines\":[]"));
        assert!(json.contains("\"kind\":\"no_text_region\""));
    }

    #[test]
    fn test_match_from_result() {
        let result = OcrResult::new("Save", 0.95, BoundingBox::new(100, 200, 140, 220));
        let m = OcrMatch::from(&result);
        assert_eq!(m.width, 40);
        assert_eq!(m.height, 20);
        assert_eq!((m.center_x, m.center_y), (120, 210));
    }
}
