//! Boundary to the external detection and recognition models.

use std::path::Path;

use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::{NdTensor, Tensor};
use tracing::debug;

use crate::error::{OcrError, Result};

/// A dense `[batch, channels, height, width]` input in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl InputTensor {
    pub fn new(shape: [usize; 4], data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// A dense model output in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl OutputTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self { shape, data }
    }

    /// Check the output rank, naming `what` in the error.
    pub fn expect_rank(&self, rank: usize, what: &str) -> Result<()> {
        if self.shape.len() != rank {
            return Err(OcrError::ModelShape(format!(
                "{what} output has shape {:?}, expected rank {rank}",
                self.shape
            )));
        }
        let expected: usize = self.shape.iter().product();
        if self.data.len() != expected {
            return Err(OcrError::ModelShape(format!(
                "{what} output has {} values for shape {:?}",
                self.data.len(),
                self.shape
            )));
        }
        Ok(())
    }
}

/// A model invoked as a single-input, single-output function.
pub trait InferenceModel: Send + Sync {
    fn input_name(&self) -> &str {
        "input"
    }

    fn output_name(&self) -> &str {
        "output"
    }

    fn run(&self, input: InputTensor) -> Result<OutputTensor>;
}

impl<F> InferenceModel for F
where
    F: Fn(InputTensor) -> Result<OutputTensor> + Send + Sync,
{
    fn run(&self, input: InputTensor) -> Result<OutputTensor> {
        self(input)
    }
}

/// An `.rten` model file run through the rten runtime.
pub struct RtenModel {
    model: Model,
    input_name: String,
    output_name: String,
}

impl RtenModel {
    pub fn load(path: &Path) -> Result<Self> {
        let model = Model::load_file(path).map_err(|e| OcrError::ModelLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let node_name = |ids: &[_]| -> Option<String> {
            let id = *ids.first()?;
            model
                .node_info(id)
                .and_then(|info| info.name().map(str::to_string))
        };
        let input_name = node_name(model.input_ids()).ok_or_else(|| OcrError::ModelLoad {
            path: path.to_path_buf(),
            message: "model declares no input".into(),
        })?;
        let output_name = node_name(model.output_ids()).ok_or_else(|| OcrError::ModelLoad {
            path: path.to_path_buf(),
            message: "model declares no output".into(),
        })?;

        debug!(
            "Loaded model {:?} (input {:?}, output {:?})",
            path, input_name, output_name
        );
        Ok(Self {
            model,
            input_name,
            output_name,
        })
    }
}

impl InferenceModel for RtenModel {
    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn output_name(&self) -> &str {
        &self.output_name
    }

    fn run(&self, input: InputTensor) -> Result<OutputTensor> {
        let shape = input.shape();
        let data = input.into_data();
        if data.len() != shape.iter().product::<usize>() {
            return Err(OcrError::Inference(format!(
                "input has {} values for shape {:?}",
                data.len(),
                shape
            )));
        }

        let tensor = NdTensor::from_data(shape, data);
        let output = self
            .model
            .run_one(tensor.view().into(), None)
            .map_err(|e| OcrError::Inference(e.to_string()))?;
        let output = Tensor::<f32>::try_from(output)
            .map_err(|e| OcrError::Inference(format!("unexpected output type: {e:?}")))?;

        Ok(OutputTensor::new(output.shape().to_vec(), output.to_vec()))
    }
}
