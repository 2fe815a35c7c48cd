//! Recognition label dictionary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{OcrError, Result};

/// Placeholder stored at the blank class index.
const BLANK_LABEL: &str = "#";

static CACHE: OnceLock<Mutex<HashMap<PathBuf, Arc<LabelDictionary>>>> = OnceLock::new();

/// Class labels of the recognition model.
///
/// Index 0 is the CTC blank and the last entry is a space, so a dictionary
/// built from `n` file lines has `n + 2` classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDictionary {
    labels: Vec<String>,
}

impl LabelDictionary {
    /// Load a dictionary, sharing one instance per file across the process.
    pub fn load(path: impl AsRef<Path>) -> Result<Arc<Self>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(OcrError::LabelsNotFound {
                path: path.to_path_buf(),
            });
        }
        let key = path.canonicalize().map_err(|source| OcrError::LabelsRead {
            path: path.to_path_buf(),
            source,
        })?;

        let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
        let mut cache = cache.lock();
        if let Some(labels) = cache.get(&key) {
            return Ok(Arc::clone(labels));
        }

        let labels = Arc::new(Self::read(path)?);
        debug!("Loaded {} labels from {:?}", labels.len(), path);
        cache.insert(key, Arc::clone(&labels));
        Ok(labels)
    }

    /// Read a dictionary without consulting the cache.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                OcrError::LabelsNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                OcrError::LabelsRead {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        if content.is_empty() {
            return Err(OcrError::EmptyLabels {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::from_lines(content.lines()))
    }

    /// Build a dictionary from file lines, adding the blank and space classes.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut labels = vec![BLANK_LABEL.to_string()];
        labels.extend(
            lines
                .into_iter()
                .map(|l| l.as_ref().trim_end_matches('\r').to_string()),
        );
        labels.push(" ".to_string());
        Self { labels }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Number of classes, including blank and space.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn blank_index(&self) -> usize {
        0
    }
}
