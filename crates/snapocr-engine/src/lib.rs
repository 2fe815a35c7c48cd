//! Text detection and recognition for captured screen regions.
//!
//! The pipeline runs a DB-style text detector over the whole image, decodes
//! each detected region with a CTC recognizer and merges the per-region
//! results into reading-order lines. Both models sit behind
//! [`InferenceModel`]; [`OcrEngine::new`] loads `.rten` files with rten.

pub mod config;
pub mod detection;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod inference;
pub mod labels;
pub mod lines;
pub mod pool;
pub mod preprocess;
pub mod recognition;

pub use config::{ChannelOrder, LimitType, ModelPaths, OcrConfig};
pub use detection::{DbPostProcessor, Detections};
pub use engine::{OcrEngine, OcrOutput, PoolUsage};
pub use error::{OcrError, Result};
pub use inference::{InferenceModel, InputTensor, OutputTensor, RtenModel};
pub use labels::LabelDictionary;
pub use lines::LineAssembler;
pub use recognition::{CtcDecoder, Decoded};
