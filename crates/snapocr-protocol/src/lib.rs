//! Shared types for snapocr.
//!
//! This crate defines the OCR result model produced by the engine and the
//! response envelope the CLI prints in JSON mode.

mod response;
mod result;

pub use response::*;
pub use result::*;
