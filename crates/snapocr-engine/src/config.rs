//! Typed engine configuration.
//!
//! Every field has a default matching the PP-OCR reference settings, so a
//! JSON config file only needs the keys it wants to override.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::preprocess::{NormalizeParams, PreprocessParams, ResizePolicy};

/// File name of the detection model inside a models directory.
pub const DETECTION_MODEL_FILE: &str = "det_model.rten";
/// File name of the recognition model inside a models directory.
pub const RECOGNITION_MODEL_FILE: &str = "rec_model.rten";
/// File name of the recognition label dictionary inside a models directory.
pub const LABELS_FILE: &str = "ppocr_keys_v1.txt";

/// Locations of the two models and the label dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPaths {
    pub detection_model: PathBuf,
    pub recognition_model: PathBuf,
    pub labels: PathBuf,
}

impl ModelPaths {
    pub fn new(
        detection_model: impl AsRef<Path>,
        recognition_model: impl AsRef<Path>,
        labels: impl AsRef<Path>,
    ) -> Self {
        Self {
            detection_model: detection_model.as_ref().to_path_buf(),
            recognition_model: recognition_model.as_ref().to_path_buf(),
            labels: labels.as_ref().to_path_buf(),
        }
    }

    /// Standard file names inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(
            dir.join(DETECTION_MODEL_FILE),
            dir.join(RECOGNITION_MODEL_FILE),
            dir.join(LABELS_FILE),
        )
    }

    /// Whether all three files exist.
    pub fn exist(&self) -> bool {
        self.detection_model.exists() && self.recognition_model.exists() && self.labels.exists()
    }
}

/// How the detection input is scaled before inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    /// Shrink so the longer side does not exceed the limit.
    Max,
    /// Enlarge so the shorter side reaches the limit.
    Min,
}

/// Channel order fed to the models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

impl ChannelOrder {
    /// Source channel index for each model channel.
    pub fn source_channels(self) -> [usize; 3] {
        match self {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Bgr => [2, 1, 0],
        }
    }
}

/// Detection preprocessing and DB postprocessing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub limit_type: LimitType,
    pub limit_side_len: u32,
    pub mean: [f32; 3],
    pub scale: [f32; 3],
    pub is_scale: bool,
    /// A pixel is text when its probability exceeds `1 - db_thresh`.
    pub db_thresh: f32,
    /// Minimum mean probability inside a candidate region.
    pub box_thresh: f32,
    /// Expansion factor applied to fitted rectangles.
    pub unclip_ratio: f32,
    /// Dilate the binary mask with a 2x2 kernel before contour extraction.
    pub use_dilation: bool,
    /// Regions whose longer side is shorter than this are dropped.
    pub min_side: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            limit_type: LimitType::Max,
            limit_side_len: 960,
            mean: [0.485, 0.456, 0.406],
            scale: [1.0 / 0.229, 1.0 / 0.224, 1.0 / 0.225],
            is_scale: true,
            db_thresh: 0.3,
            box_thresh: 0.6,
            unclip_ratio: 1.5,
            use_dilation: false,
            min_side: 16.0,
        }
    }
}

impl DetectionConfig {
    pub fn preprocess_params(&self) -> PreprocessParams {
        PreprocessParams {
            resize: ResizePolicy::LimitSide {
                limit_type: self.limit_type,
                limit_side_len: self.limit_side_len,
            },
            normalize: NormalizeParams {
                mean: self.mean,
                scale: self.scale,
                is_scale: self.is_scale,
            },
        }
    }
}

/// Recognition preprocessing parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub image_height: u32,
    pub mean: [f32; 3],
    pub scale: [f32; 3],
    pub is_scale: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            image_height: 48,
            mean: [0.5, 0.5, 0.5],
            scale: [1.0 / 0.5, 1.0 / 0.5, 1.0 / 0.5],
            is_scale: true,
        }
    }
}

impl RecognitionConfig {
    pub fn preprocess_params(&self) -> PreprocessParams {
        PreprocessParams {
            resize: ResizePolicy::FixedHeight {
                height: self.image_height,
            },
            normalize: NormalizeParams {
                mean: self.mean,
                scale: self.scale,
                is_scale: self.is_scale,
            },
        }
    }
}

/// Line grouping parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// Maximum top/bottom edge distance (pixels) between neighbours on a line.
    pub threshold: i32,
    /// Text inserted between merged regions.
    pub separator: String,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            threshold: 16,
            separator: "    ".to_string(),
        }
    }
}

/// Bounds for the reuse pools.
///
/// `max_*` caps what a pool holds while a call runs; after each call the
/// engine trims the pools down to `idle_*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_buffers: usize,
    pub max_objects: usize,
    pub idle_buffers: usize,
    pub idle_objects: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_buffers: 100,
            max_objects: 100,
            idle_buffers: 4,
            idle_objects: 16,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub detection: DetectionConfig,
    pub recognition: RecognitionConfig,
    pub lines: LineConfig,
    pub pool: PoolConfig,
    pub channel_order: ChannelOrder,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            recognition: RecognitionConfig::default(),
            lines: LineConfig::default(),
            pool: PoolConfig::default(),
            channel_order: ChannelOrder::Bgr,
        }
    }
}

impl OcrConfig {
    /// Load a JSON config file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
