use image::{imageops::FilterType, DynamicImage};
use ndarray::{Array2, ArrayD, Axis};
use tracing::instrument;

use crate::{
    ctc::{decode, CharacterTable},
    engine::InferenceEngine,
    error::{Error, Result},
    normalize::subtract_mean_normalize,
    result::DecodeResult,
};

const MEAN_VALUES: [f32; 3] = [0.0, 0.0, 0.0];
const NORM_VALUES: [f32; 3] = [1.0, 1.0, 1.0];

pub struct CrnnNet<E> {
    engine: E,
    keys: CharacterTable,
    dest_height: u32,
}

impl<E: InferenceEngine> CrnnNet<E> {
    pub fn new(engine: E, keys: CharacterTable, dest_height: u32) -> Self {
        Self {
            engine,
            keys,
            dest_height,
        }
    }

    pub fn keys(&self) -> &CharacterTable {
        &self.keys
    }

    /// Recognizes the text in one rectified patch.
    #[instrument(level = "trace", skip(self, image))]
    pub fn get_text_line(&mut self, image: &DynamicImage) -> Result<DecodeResult> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::Image("cannot recognize an empty patch".into()));
        }
        let scale = self.dest_height as f32 / image.height() as f32;
        let dest_width = ((image.width() as f32 * scale).round() as u32).max(1);
        let image = image.resize_exact(dest_width, self.dest_height, FilterType::Triangle);

        let tensor_values =
            subtract_mean_normalize(&image, &MEAN_VALUES, &NORM_VALUES).insert_axis(Axis(0));
        let output = self.engine.infer(tensor_values)?;
        let scores = class_scores(output)?;
        log::trace!("Recognition output: {} steps x {} classes", scores.nrows(), scores.ncols());

        Ok(decode(scores.view(), &self.keys))
    }
}

/// Checks the `1 × T × C` output contract and drops the batch axis.
fn class_scores(output: ArrayD<f32>) -> Result<Array2<f32>> {
    let shape = output.shape().to_vec();
    match shape.as_slice() {
        [1, steps, classes] => output
            .into_shape((*steps, *classes))
            .map_err(|err| Error::InferenceOutput(err.to_string())),
        _ => Err(Error::InferenceOutput(format!(
            "recognition output must be 1xTxC, got {shape:?}"
        ))),
    }
}
