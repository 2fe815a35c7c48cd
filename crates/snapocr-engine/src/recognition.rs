//! Greedy CTC decoding of recognizer output.

use std::sync::Arc;

use crate::error::{OcrError, Result};
use crate::inference::OutputTensor;
use crate::labels::LabelDictionary;

/// Emitted for class indices the dictionary does not cover.
pub const UNKNOWN_CHAR: &str = "?";

/// Decoded text of one region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decoded {
    pub text: String,
    /// Mean probability of the emitted steps, or 0 when nothing was emitted.
    pub confidence: f32,
}

/// Decodes `[1, T, C]` class probabilities into text.
///
/// A step emits its argmax class unless it is the blank or repeats the
/// previous step's argmax. The previous index is tracked on every step, so
/// a blank between two equal classes lets the second one through.
pub struct CtcDecoder {
    labels: Arc<LabelDictionary>,
}

impl CtcDecoder {
    pub fn new(labels: Arc<LabelDictionary>) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &LabelDictionary {
        &self.labels
    }

    pub fn decode(&self, output: &OutputTensor) -> Result<Decoded> {
        let mut text = String::new();
        let confidence = self.decode_into(output, &mut text)?;
        Ok(Decoded { text, confidence })
    }

    /// Append the decoded text of the first batch item to `text` and return
    /// its confidence.
    pub fn decode_into(&self, output: &OutputTensor, text: &mut String) -> Result<f32> {
        output.expect_rank(3, "recognizer")?;
        let (steps, classes) = (output.shape[1], output.shape[2]);
        if classes == 0 {
            return Err(OcrError::ModelShape(
                "recognizer output has no classes".into(),
            ));
        }
        Ok(self.decode_steps(&output.data[..steps * classes], classes, text))
    }

    /// Decode row-major `steps x classes` probabilities.
    pub fn decode_steps(&self, probs: &[f32], classes: usize, text: &mut String) -> f32 {
        let blank = self.labels.blank_index();
        let mut last = blank;
        let (mut sum, mut count) = (0.0f32, 0usize);

        for (step, row) in probs.chunks_exact(classes).enumerate() {
            let (index, prob) = argmax(row);
            if index != blank && !(step > 0 && index == last) {
                sum += prob;
                count += 1;
                text.push_str(self.labels.get(index).unwrap_or(UNKNOWN_CHAR));
            }
            last = index;
        }

        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }
}

/// Index and value of the first maximum.
fn argmax(row: &[f32]) -> (usize, f32) {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| {
            if v > bv {
                (i, v)
            } else {
                (bi, bv)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(n: usize) -> CtcDecoder {
        let labels: Vec<String> = (0..n).map(|i| format!("c{i}")).collect();
        CtcDecoder::new(Arc::new(LabelDictionary::from_lines(labels)))
    }

    /// One-hot steps with probability `p` on each chosen class.
    fn steps(indices: &[usize], classes: usize, p: f32) -> OutputTensor {
        let mut data = vec![0.0; indices.len() * classes];
        for (t, &i) in indices.iter().enumerate() {
            data[t * classes + i] = p;
        }
        OutputTensor::new(vec![1, indices.len(), classes], data)
    }

    #[test]
    fn test_collapse_rule() {
        let decoder = decoder(8);
        let decoded = decoder.decode(&steps(&[5, 5, 0, 5, 3, 3], 10, 0.9)).unwrap();
        // Labels are shifted by the blank: class k is "c{k-1}".
        assert_eq!(decoded.text, "c4c4c2");
        assert!((decoded.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_all_blank_is_empty() {
        let decoder = decoder(3);
        let decoded = decoder.decode(&steps(&[0, 0, 0], 5, 0.8)).unwrap();
        assert!(decoded.text.is_empty());
        assert_eq!(decoded.confidence, 0.0);
    }

    #[test]
    fn test_out_of_range_index_is_unknown() {
        let decoder = decoder(2);
        // Dictionary has 4 classes; the model reports 6.
        let decoded = decoder.decode(&steps(&[1, 5], 6, 1.0)).unwrap();
        assert_eq!(decoded.text, format!("c0{UNKNOWN_CHAR}"));
    }

    #[test]
    fn test_trailing_space_class() {
        let decoder = decoder(2);
        let decoded = decoder.decode(&steps(&[1, 3, 2], 4, 1.0)).unwrap();
        assert_eq!(decoded.text, "c0 c1");
    }

    #[test]
    fn test_confidence_averages_emitted_steps() {
        let decoder = decoder(4);
        let mut output = steps(&[1, 0, 2], 6, 0.0);
        output.data[1] = 0.6;
        output.data[6] = 0.9;
        output.data[2 * 6 + 2] = 0.8;
        let decoded = decoder.decode(&output).unwrap();
        assert_eq!(decoded.text, "c0c1");
        assert!((decoded.confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_argmax_takes_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.5, 0.5]), (1, 0.5));
    }

    #[test]
    fn test_decode_into_appends() {
        let decoder = decoder(2);
        let mut text = String::from(">");
        decoder
            .decode_into(&steps(&[1, 2], 4, 1.0), &mut text)
            .unwrap();
        assert_eq!(text, ">c0c1");
    }

    #[test]
    fn test_wrong_rank() {
        let decoder = decoder(2);
        let output = OutputTensor::new(vec![2, 4], vec![0.0; 8]);
        assert!(matches!(
            decoder.decode(&output),
            Err(OcrError::ModelShape(_))
        ));
    }
}
