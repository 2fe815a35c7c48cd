//! The OCR pipeline: detection, per-region recognition and line assembly.

use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use parking_lot::Mutex;
use snapocr_protocol::{BoundingBox, OcrResult, OcrStatus};
use tracing::{debug, trace, warn};

use crate::config::{ModelPaths, OcrConfig};
use crate::detection::{DbPostProcessor, Detections};
use crate::error::{OcrError, Result};
use crate::inference::{InferenceModel, RtenModel};
use crate::labels::LabelDictionary;
use crate::lines::LineAssembler;
use crate::pool::{BufferPool, ObjectPool};
use crate::preprocess::{ImageRegion, Preprocessor};
use crate::recognition::{CtcDecoder, Decoded};

/// Result of one OCR call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutput {
    /// Merged lines in reading order.
    pub lines: Vec<OcrResult>,
    /// Last soft failure recorded during the call.
    pub status: Option<OcrStatus>,
}

impl OcrOutput {
    /// All lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Idle entries held by the engine's pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolUsage {
    pub buffers: usize,
    pub masks: usize,
    pub results: usize,
}

/// Screen-region OCR engine.
///
/// One call runs sequentially. The engine can be shared between threads; the
/// pools are internally synchronized, but concurrent calls overwrite each
/// other's [`last_status`](Self::last_status).
pub struct OcrEngine {
    config: OcrConfig,
    detector: Box<dyn InferenceModel>,
    recognizer: Box<dyn InferenceModel>,
    preprocessor: Preprocessor,
    postprocessor: DbPostProcessor,
    decoder: CtcDecoder,
    assembler: LineAssembler,
    float_pool: BufferPool<f32>,
    mask_pool: BufferPool<u8>,
    result_pool: ObjectPool<OcrResult>,
    last_status: Mutex<Option<OcrStatus>>,
}

impl OcrEngine {
    /// Load models and labels with the default configuration.
    pub fn new(paths: &ModelPaths) -> Result<Self> {
        Self::with_config(paths, OcrConfig::default())
    }

    pub fn with_config(paths: &ModelPaths, config: OcrConfig) -> Result<Self> {
        let labels = LabelDictionary::load(&paths.labels)?;

        debug!("Loading detection model from {:?}", paths.detection_model);
        let detector = RtenModel::load(&paths.detection_model)?;

        debug!("Loading recognition model from {:?}", paths.recognition_model);
        let recognizer = RtenModel::load(&paths.recognition_model)?;

        let engine = Self::from_models(Box::new(detector), Box::new(recognizer), labels, config);
        debug!("OCR engine initialized successfully");
        Ok(engine)
    }

    /// Build an engine around already loaded models.
    pub fn from_models(
        detector: Box<dyn InferenceModel>,
        recognizer: Box<dyn InferenceModel>,
        labels: Arc<LabelDictionary>,
        config: OcrConfig,
    ) -> Self {
        let float_pool = BufferPool::new(config.pool.max_buffers);
        let mask_pool = BufferPool::new(config.pool.max_buffers);
        Self {
            preprocessor: Preprocessor::new(float_pool.clone(), config.channel_order),
            postprocessor: DbPostProcessor::new(
                &config.detection,
                float_pool.clone(),
                mask_pool.clone(),
            ),
            decoder: CtcDecoder::new(labels),
            assembler: LineAssembler::new(&config.lines),
            result_pool: ObjectPool::new(config.pool.max_objects),
            float_pool,
            mask_pool,
            detector,
            recognizer,
            config,
            last_status: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    /// Run OCR over `image` and return its lines.
    ///
    /// Finding no text is not an error: the lines are empty and the status
    /// says why.
    pub fn recognize(&self, image: &RgbImage) -> Result<OcrOutput> {
        *self.last_status.lock() = None;
        let output = self.run(image);
        self.cleanup();
        let lines = output?;
        Ok(OcrOutput {
            lines,
            status: self.last_status(),
        })
    }

    /// Recognize already detected `boxes` and assemble them into lines.
    ///
    /// Boxes that do not overlap the image are skipped with
    /// [`OcrStatus::DegenerateRegion`].
    pub fn recognize_boxes(&self, image: &RgbImage, boxes: &[BoundingBox]) -> OcrOutput {
        *self.last_status.lock() = None;
        let lines = self.read_boxes(image, boxes);
        self.cleanup();
        OcrOutput {
            lines,
            status: self.last_status(),
        }
    }

    /// Run OCR over a decoded image of any color type.
    pub fn perform_ocr(&self, image: &DynamicImage) -> Result<Vec<OcrResult>> {
        Ok(self.recognize(&image.to_rgb8())?.lines)
    }

    /// Most recent soft failure of the last call.
    pub fn last_status(&self) -> Option<OcrStatus> {
        self.last_status.lock().clone()
    }

    /// Find text regions in `image`.
    pub fn detect(&self, image: &RgbImage) -> Result<Detections> {
        if image.width() == 0 || image.height() == 0 {
            return Err(OcrError::InvalidImage("image has zero size".into()));
        }

        let params = self.config.detection.preprocess_params();
        let input = self
            .preprocessor
            .preprocess(image, ImageRegion::full(image), &params)?;
        trace!(
            "Detection input {}x{} (ratio {:.3}, {:.3})",
            input.width,
            input.height,
            input.ratio_w,
            input.ratio_h
        );

        let output = self.detector.run(input.into_tensor())?;
        self.postprocessor
            .process(&output, image.width(), image.height())
    }

    /// Recognize the text inside `bbox`.
    pub fn recognize_region(&self, image: &RgbImage, bbox: &BoundingBox) -> Result<Decoded> {
        let region = bbox
            .intersect_image(image.width(), image.height())
            .ok_or_else(|| OcrError::InvalidImage(format!("{bbox:?} lies outside the image")))?;
        let mut text = String::new();
        let confidence = self.recognize_into(image, &region, &mut text)?;
        Ok(Decoded { text, confidence })
    }

    /// Release idle pool entries beyond the configured idle bounds.
    ///
    /// Runs at the end of every call.
    pub fn cleanup(&self) {
        let pool = &self.config.pool;
        self.float_pool.trim(pool.idle_buffers);
        self.mask_pool.trim(pool.idle_buffers);
        self.result_pool.trim(pool.idle_objects);
        trace!("Pools after cleanup: {:?}", self.pool_usage());
    }

    pub fn pool_usage(&self) -> PoolUsage {
        PoolUsage {
            buffers: self.float_pool.len(),
            masks: self.mask_pool.len(),
            results: self.result_pool.len(),
        }
    }

    fn run(&self, image: &RgbImage) -> Result<Vec<OcrResult>> {
        let detections = self.detect(image)?;
        if let Some(status) = detections.status {
            self.record(status);
        }
        if detections.boxes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.read_boxes(image, &detections.boxes))
    }

    fn read_boxes(&self, image: &RgbImage, boxes: &[BoundingBox]) -> Vec<OcrResult> {
        let mut results = Vec::with_capacity(boxes.len());
        for &bbox in boxes {
            let Some(region) = bbox.intersect_image(image.width(), image.height()) else {
                debug!("Skipping degenerate region {:?}", bbox);
                self.record(OcrStatus::DegenerateRegion);
                continue;
            };

            let mut result = self.result_pool.rent();
            match self.recognize_into(image, &region, &mut result.text) {
                Ok(_) if result.text.is_empty() => {
                    debug!("No text recognized in {:?}", bbox);
                    self.record(OcrStatus::EmptyRecognition);
                    self.result_pool.give_back(result);
                }
                Ok(confidence) => {
                    result.confidence = confidence;
                    result.bbox = bbox;
                    results.push(result);
                }
                Err(e) => {
                    warn!("Recognition failed for {:?}: {}", bbox, e);
                    self.record(OcrStatus::RecognitionFailed {
                        message: e.to_string(),
                    });
                    self.result_pool.give_back(result);
                }
            }
        }

        debug!("Recognized {} regions", results.len());
        self.assembler.assemble(results, &self.result_pool)
    }

    fn recognize_into(&self, image: &RgbImage, region: &BoundingBox, text: &mut String) -> Result<f32> {
        let params = self.config.recognition.preprocess_params();
        let input = self
            .preprocessor
            .preprocess(image, ImageRegion::from_box(region), &params)?;
        let output = self.recognizer.run(input.into_tensor())?;
        self.decoder.decode_into(&output, text)
    }

    fn record(&self, status: OcrStatus) {
        *self.last_status.lock() = Some(status);
    }
}
