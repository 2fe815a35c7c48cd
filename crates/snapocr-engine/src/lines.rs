//! Reading-order line reconstruction.

use snapocr_protocol::OcrResult;

use crate::config::LineConfig;
use crate::pool::ObjectPool;

/// Groups per-region results into lines and merges each line into one result.
#[derive(Debug, Clone)]
pub struct LineAssembler {
    threshold: i32,
    separator: String,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new(&LineConfig::default())
    }
}

impl LineAssembler {
    pub fn new(config: &LineConfig) -> Self {
        Self {
            threshold: config.threshold,
            separator: config.separator.clone(),
        }
    }

    /// Split results into lines, top to bottom.
    ///
    /// Results are ordered by top edge; one joins the current line when both
    /// its top and bottom edges are within the threshold of the line's most
    /// recently added member.
    pub fn group(&self, mut results: Vec<OcrResult>) -> Vec<Vec<OcrResult>> {
        results.sort_by_key(|r| r.bbox.y_min);

        let mut lines: Vec<Vec<OcrResult>> = Vec::new();
        let mut current: Vec<OcrResult> = Vec::new();
        for result in results {
            let joins = current.last().map_or(true, |last| {
                (result.bbox.y_min - last.bbox.y_min).abs() < self.threshold
                    && (result.bbox.y_max - last.bbox.y_max).abs() < self.threshold
            });
            if !joins {
                lines.push(std::mem::take(&mut current));
            }
            current.push(result);
        }
        if !current.is_empty() {
            lines.push(current);
        }
        lines
    }

    /// Merge one line left to right into its leftmost member.
    ///
    /// Texts are joined with the separator and the leftmost box is extended
    /// to the right edge of the rightmost member. Absorbed members go back to
    /// `pool`.
    pub fn merge(&self, mut line: Vec<OcrResult>, pool: &ObjectPool<OcrResult>) -> Option<OcrResult> {
        line.sort_by(|a, b| a.bbox.center_x().total_cmp(&b.bbox.center_x()));

        let mut members = line.into_iter();
        let mut merged = members.next()?;
        for member in members {
            merged.text.push_str(&self.separator);
            merged.text.push_str(&member.text);
            merged.bbox.x_max = member.bbox.x_max;
            pool.give_back(member);
        }
        Some(merged)
    }

    /// Group and merge, returning one result per line.
    pub fn assemble(&self, results: Vec<OcrResult>, pool: &ObjectPool<OcrResult>) -> Vec<OcrResult> {
        self.group(results)
            .into_iter()
            .filter_map(|line| self.merge(line, pool))
            .collect()
    }
}
