//! OCR result types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Axis-aligned box in original-image pixel coordinates.
///
/// Edges are inclusive on the min side; `width()` and `height()` are plain
/// differences of the edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge.
    pub x_min: i32,
    /// Top edge.
    pub y_min: i32,
    /// Right edge.
    pub x_max: i32,
    /// Bottom edge.
    pub y_max: i32,
}

impl BoundingBox {
    /// Create a box from its four edges.
    pub fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn width(&self) -> i32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> i32 {
        self.y_max - self.y_min
    }

    /// Horizontal center, used to order boxes within a line.
    pub fn center_x(&self) -> f32 {
        (self.x_min + self.x_max) as f32 / 2.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f32 {
        (self.y_min + self.y_max) as f32 / 2.0
    }

    /// Clamp all four edges into `[0, width - 1] x [0, height - 1]`.
    pub fn clamped(self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as i32;
        let max_y = height.saturating_sub(1) as i32;
        Self {
            x_min: self.x_min.clamp(0, max_x),
            y_min: self.y_min.clamp(0, max_y),
            x_max: self.x_max.clamp(0, max_x),
            y_max: self.y_max.clamp(0, max_y),
        }
    }

    /// Intersect with an image of the given size, treating the box as the
    /// half-open region `[x_min, x_max) x [y_min, y_max)`.
    ///
    /// Returns `None` when the intersection has zero area.
    pub fn intersect_image(&self, width: u32, height: u32) -> Option<Self> {
        let x_min = self.x_min.max(0);
        let y_min = self.y_min.max(0);
        let x_max = self.x_max.min(width as i32);
        let y_max = self.y_max.min(height as i32);
        if x_max <= x_min || y_max <= y_min {
            return None;
        }
        Some(Self::new(x_min, y_min, x_max, y_max))
    }
}

/// Recognized text for one region, or for one merged line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    /// Decoded text.
    pub text: String,
    /// Mean probability of the emitted characters, in `[0, 1]`.
    pub confidence: f32,
    /// Region the text was read from.
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl OcrResult {
    pub fn new(text: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            confidence,
            bbox,
        }
    }
}

/// Non-fatal outcome recorded while processing a screenshot.
///
/// These never abort a call; the most recent one is kept as the engine's
/// last status so a caller can explain an empty result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OcrStatus {
    /// The detector found no text region.
    NoTextRegion,
    /// A candidate region scored below the box threshold.
    LowBoxScore {
        /// Mean probability inside the region.
        score: f32,
        /// Configured threshold.
        threshold: f32,
    },
    /// The detector produced more than one output channel; only the first was used.
    ChannelMismatch {
        /// Channel count reported by the detector.
        actual: usize,
    },
    /// A detected box fell outside the image after intersection.
    DegenerateRegion,
    /// The recognizer produced no characters for a region.
    EmptyRecognition,
    /// Recognition failed for a single region.
    RecognitionFailed {
        /// Error description.
        message: String,
    },
}

impl fmt::Display for OcrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrStatus::NoTextRegion => write!(f, "no text region detected"),
            OcrStatus::LowBoxScore { score, threshold } => write!(
                f,
                "region score {:.3} is below the threshold {:.3}",
                score, threshold
            ),
            OcrStatus::ChannelMismatch { actual } => write!(
                f,
                "detector returned {} channels, expected 1; using the first",
                actual
            ),
            OcrStatus::DegenerateRegion => write!(f, "region lies outside the image"),
            OcrStatus::EmptyRecognition => write!(f, "recognition result is empty"),
            OcrStatus::RecognitionFailed { message } => {
                write!(f, "recognition failed: {}", message)
            }
        }
    }
}
