//! End-to-end pipeline tests with stand-in models.
//!
//! The fake detector marks every non-white pixel as text. The fake recognizer
//! reads "a" for red ink and "b" for blue ink.

use std::sync::Arc;

use image::{Rgb, RgbImage};
use snapocr_engine::{
    InferenceModel, InputTensor, LabelDictionary, ModelPaths, OcrConfig, OcrEngine, OcrError,
    OutputTensor, PoolUsage, Result,
};
use snapocr_protocol::{BoundingBox, OcrStatus};

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

fn canvas(width: u32, height: u32, rects: &[(u32, u32, u32, u32, Rgb<u8>)]) -> RgbImage {
    let mut image = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    for &(x, y, w, h, color) in rects {
        for py in y..y + h {
            for px in x..x + w {
                image.put_pixel(px, py, color);
            }
        }
    }
    image
}

fn labels() -> Arc<LabelDictionary> {
    Arc::new(LabelDictionary::from_lines(["a", "b", "c"]))
}

fn fake_detector() -> Box<dyn InferenceModel> {
    Box::new(|input: InputTensor| -> Result<OutputTensor> {
        let [_, _, h, w] = input.shape();
        let data = input.data();
        let plane = h * w;
        let logits = (0..plane)
            .map(|i| {
                if (0..3).any(|c| data[c * plane + i] < 0.0) {
                    10.0
                } else {
                    -10.0
                }
            })
            .collect();
        Ok(OutputTensor::new(vec![1, 1, h, w], logits))
    })
}

/// Emits `[class, blank]` with probability 0.9, where class 1 is "a".
fn one_hot(class: usize) -> OutputTensor {
    let classes = 5;
    let mut data = vec![0.0; 2 * classes];
    data[class] = 0.9;
    data[classes] = 0.9;
    OutputTensor::new(vec![1, 2, classes], data)
}

fn fake_recognizer() -> Box<dyn InferenceModel> {
    Box::new(|input: InputTensor| -> Result<OutputTensor> {
        let [_, _, h, w] = input.shape();
        assert_eq!(h, 48);
        let data = input.data();
        let plane = h * w;
        // Planes are in BGR order.
        let red = (0..plane).any(|i| data[i] < 0.0 && data[2 * plane + i] > 0.0);
        Ok(one_hot(if red { 1 } else { 2 }))
    })
}

fn engine(recognizer: Box<dyn InferenceModel>) -> OcrEngine {
    OcrEngine::from_models(fake_detector(), recognizer, labels(), OcrConfig::default())
}

fn two_line_image() -> RgbImage {
    canvas(
        320,
        160,
        &[
            (160, 22, 100, 20, BLUE),
            (20, 20, 80, 20, RED),
            (20, 100, 100, 20, RED),
        ],
    )
}

#[test]
fn test_recognize_merges_lines_in_reading_order() {
    let engine = engine(fake_recognizer());
    let output = engine.recognize(&two_line_image()).unwrap();

    let texts: Vec<&str> = output.lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["a    b", "a"]);
    assert_eq!(output.text(), "a    b\na");
    assert_eq!(output.status, None);

    let first = output.lines[0].bbox;
    assert!(first.x_min < 20 && first.x_max > 259, "{first:?}");
    assert!(first.y_min < 20 && first.y_max > 41, "{first:?}");
    assert!((output.lines[0].confidence - 0.9).abs() < 1e-6);

    let second = output.lines[1].bbox;
    assert!(second.y_min > first.y_max, "{second:?}");
}

#[test]
fn test_repeated_calls_are_stable() {
    let engine = engine(fake_recognizer());
    let image = two_line_image();
    let first = engine.recognize(&image).unwrap();
    let second = engine.recognize(&image).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_blank_image_reports_no_text() {
    let engine = engine(fake_recognizer());
    let output = engine.recognize(&canvas(200, 100, &[])).unwrap();
    assert!(output.lines.is_empty());
    assert_eq!(output.status, Some(OcrStatus::NoTextRegion));
    assert_eq!(engine.last_status(), Some(OcrStatus::NoTextRegion));
}

#[test]
fn test_status_is_cleared_between_calls() {
    let engine = engine(fake_recognizer());
    engine.recognize(&canvas(200, 100, &[])).unwrap();
    let output = engine.recognize(&two_line_image()).unwrap();
    assert_eq!(output.status, None);
    assert_eq!(engine.last_status(), None);
}

#[test]
fn test_empty_recognition_is_skipped() {
    let blank_only = Box::new(|_: InputTensor| -> Result<OutputTensor> { Ok(one_hot(0)) });
    let engine = engine(blank_only);
    let output = engine.recognize(&two_line_image()).unwrap();
    assert!(output.lines.is_empty());
    assert_eq!(output.status, Some(OcrStatus::EmptyRecognition));
}

#[test]
fn test_recognizer_failure_skips_the_region() {
    let failing = Box::new(|_: InputTensor| -> Result<OutputTensor> {
        Err(OcrError::Inference("out of memory".into()))
    });
    let engine = engine(failing);
    let output = engine.recognize(&two_line_image()).unwrap();
    assert!(output.lines.is_empty());
    assert!(matches!(
        output.status,
        Some(OcrStatus::RecognitionFailed { ref message }) if message.contains("out of memory")
    ));
}

#[test]
fn test_detector_shape_error_is_fatal() {
    let flat = Box::new(|_: InputTensor| -> Result<OutputTensor> {
        Ok(OutputTensor::new(vec![4], vec![0.0; 4]))
    });
    let engine = OcrEngine::from_models(flat, fake_recognizer(), labels(), OcrConfig::default());
    let err = engine.recognize(&two_line_image()).unwrap_err();
    assert!(matches!(err, OcrError::ModelShape(_)));
}

#[test]
fn test_zero_sized_image_is_invalid() {
    let engine = engine(fake_recognizer());
    let err = engine.recognize(&RgbImage::new(0, 0)).unwrap_err();
    assert!(matches!(err, OcrError::InvalidImage(_)));
}

#[test]
fn test_recognize_region() {
    let engine = engine(fake_recognizer());
    let image = two_line_image();
    let decoded = engine
        .recognize_region(&image, &BoundingBox::new(150, 10, 280, 55))
        .unwrap();
    assert_eq!(decoded.text, "b");

    let outside = engine.recognize_region(&image, &BoundingBox::new(400, 10, 500, 55));
    assert!(outside.is_err());
}

#[test]
fn test_detect_boxes() {
    let engine = engine(fake_recognizer());
    let detections = engine.detect(&two_line_image()).unwrap();
    assert_eq!(detections.boxes.len(), 3);
    assert_eq!(detections.status, None);
}

#[test]
fn test_boxes_outside_the_image_are_skipped() {
    let engine = engine(fake_recognizer());
    let image = two_line_image();
    let boxes = [
        BoundingBox::new(10, 10, 110, 50),
        BoundingBox::new(320, 10, 400, 50),
        BoundingBox::new(40, 160, 90, 190),
    ];

    let output = engine.recognize_boxes(&image, &boxes);
    assert_eq!(output.lines.len(), 1);
    assert_eq!(output.lines[0].text, "a");
    assert_eq!(output.status, Some(OcrStatus::DegenerateRegion));
    assert_eq!(engine.last_status(), Some(OcrStatus::DegenerateRegion));

    let output = engine.recognize_boxes(&image, &boxes[..1]);
    assert_eq!(output.status, None);
}

#[test]
fn test_cleanup_trims_pools_to_idle_bounds() {
    let mut config = OcrConfig::default();
    config.pool.idle_buffers = 1;
    config.pool.idle_objects = 0;
    let engine = OcrEngine::from_models(fake_detector(), fake_recognizer(), labels(), config);

    engine.recognize(&two_line_image()).unwrap();
    let usage = engine.pool_usage();
    assert!(usage.buffers <= 1, "{usage:?}");
    assert!(usage.masks <= 1, "{usage:?}");
    assert_eq!(usage.results, 0);

    let mut config = OcrConfig::default();
    config.pool.idle_buffers = 0;
    config.pool.idle_objects = 0;
    let engine = OcrEngine::from_models(fake_detector(), fake_recognizer(), labels(), config);
    engine.recognize(&two_line_image()).unwrap();
    assert_eq!(engine.pool_usage(), PoolUsage::default());
}

#[test]
fn test_idle_entries_are_kept_for_the_next_call() {
    let engine = engine(fake_recognizer());
    engine.recognize(&two_line_image()).unwrap();

    let usage = engine.pool_usage();
    let pool = engine.config().pool;
    assert!(usage.masks >= 1 && usage.masks <= pool.idle_buffers, "{usage:?}");
    assert!(usage.buffers <= pool.idle_buffers, "{usage:?}");
    // The merged line absorbs one region, which goes back to the pool.
    assert!(usage.results >= 1 && usage.results <= pool.idle_objects, "{usage:?}");
}

#[test]
fn test_perform_ocr_accepts_dynamic_images() {
    let engine = engine(fake_recognizer());
    let image = image::DynamicImage::ImageRgb8(two_line_image()).to_rgba8();
    let lines = engine
        .perform_ocr(&image::DynamicImage::ImageRgba8(image))
        .unwrap();
    assert_eq!(lines.len(), 2);
}

#[test]
fn test_missing_files_fail_construction() {
    let dir = tempfile::tempdir().unwrap();
    let err = OcrEngine::new(&ModelPaths::in_dir(dir.path())).err().unwrap();
    assert!(matches!(err, OcrError::LabelsNotFound { .. }));

    std::fs::write(dir.path().join("ppocr_keys_v1.txt"), "a\nb\n").unwrap();
    let err = OcrEngine::new(&ModelPaths::in_dir(dir.path())).err().unwrap();
    assert!(matches!(err, OcrError::ModelLoad { .. }));
}

/// Runs the real models from `SNAPOCR_MODELS_DIR`.
#[test]
#[ignore]
fn test_real_models() {
    let Ok(dir) = std::env::var("SNAPOCR_MODELS_DIR") else {
        return;
    };
    let engine = OcrEngine::new(&ModelPaths::in_dir(dir)).unwrap();
    let output = engine.recognize(&canvas(200, 100, &[])).unwrap();
    assert!(output.lines.is_empty());
}
