use std::path::PathBuf;

use ndarray::{Array4, ArrayD};
use ort::{inputs, GraphOptimizationLevel, Session};
use tracing::instrument;

use crate::error::{Error, Result};

/// A model that maps one `N × C × H × W` tensor to one output tensor.
///
/// Calls take `&mut self`: a session is driven by one caller at a time.
pub trait InferenceEngine {
    fn infer(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>>;
}

impl<F> InferenceEngine for F
where
    F: FnMut(Array4<f32>) -> Result<ArrayD<f32>>,
{
    fn infer(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        self(input)
    }
}

/// ONNX Runtime session feeding its first input and reading its first output.
pub struct OrtEngine {
    session: Session,
    input_name: String,
}

impl OrtEngine {
    #[instrument(level = "debug")]
    pub fn init(path: PathBuf, num_threads: usize) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_inter_threads(num_threads)?
            .with_intra_threads(num_threads)?
            .commit_from_file(&path)?;

        log::debug!("Session inputs: {:?}", session.inputs);
        log::debug!("Session outputs: {:?}", session.outputs);

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| {
                Error::InferenceOutput(format!("model {} declares no inputs", path.display()))
            })?;

        Ok(Self {
            session,
            input_name,
        })
    }
}

impl InferenceEngine for OrtEngine {
    #[instrument(level = "trace", skip(self, input))]
    fn infer(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        let outputs = self
            .session
            .run(inputs![self.input_name.as_str() => input]?)?;
        let (_, output) = outputs
            .first_key_value()
            .ok_or_else(|| Error::InferenceOutput("model produced no outputs".into()))?;
        let tensor = output.try_extract_tensor::<f32>()?.to_owned();
        log::trace!("Output tensor shape: {:?}", tensor.shape());
        Ok(tensor)
    }
}
