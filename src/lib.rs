use std::path::PathBuf;

use crnn_net::CrnnNet;
use dbnet::DbNet;
use image::DynamicImage;
use tracing::instrument;

pub mod binarize;
pub mod crnn_net;
pub mod ctc;
pub mod dbnet;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod mapping;
pub mod normalize;
pub mod options;
pub mod rectify;
pub mod regions;
mod result;
pub mod score;
pub mod unclip;

pub use ctc::CharacterTable;
pub use engine::{InferenceEngine, OrtEngine};
pub use error::{Error, Result, Stage};
pub use geometry::Quad;
pub use normalize::TransformContext;
pub use options::{DetectionOptions, RecognitionOptions};
pub use regions::Region;
pub use result::*;

pub use ort as runtime;

pub struct OcrBuilder {
    threads: usize,
    det_path: Option<PathBuf>,
    rec_paths: Option<(PathBuf, PathBuf)>,
    detection: DetectionOptions,
    recognition: RecognitionOptions,
}

impl OcrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn det_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.det_path = Some(path.into());
        self
    }

    pub fn rec_model(
        mut self,
        model_path: impl Into<PathBuf>,
        keys_path: impl Into<PathBuf>,
    ) -> Self {
        self.rec_paths = Some((model_path.into(), keys_path.into()));
        self
    }

    pub fn detection_options(mut self, options: DetectionOptions) -> Self {
        self.detection = options;
        self
    }

    pub fn recognition_options(mut self, options: RecognitionOptions) -> Self {
        self.recognition = options;
        self
    }

    #[instrument(skip(self))]
    pub fn build(self) -> Result<Ocr<OrtEngine, OrtEngine>> {
        if self.threads == 0 {
            return Err(Error::Config("threads must be positive".into()));
        }
        let det_path = self
            .det_path
            .ok_or_else(|| Error::Config("no detection model configured".into()))?;
        let (rec_path, keys_path) = self
            .rec_paths
            .ok_or_else(|| Error::Config("no recognition model configured".into()))?;

        // Settings and dictionary are checked before any model is loaded.
        self.detection.validate()?;
        self.recognition.validate()?;
        let keys = CharacterTable::load(&keys_path)?;

        Ocr::new(
            OrtEngine::init(det_path, self.threads)?,
            OrtEngine::init(rec_path, self.threads)?,
            keys,
            self.detection,
            self.recognition,
        )
    }
}

impl Default for OcrBuilder {
    fn default() -> Self {
        Self {
            threads: 4,
            det_path: None,
            rec_paths: None,
            detection: DetectionOptions::default(),
            recognition: RecognitionOptions::default(),
        }
    }
}

/// Detection and recognition over one pair of inference engines.
///
/// An `Ocr` owns its engines, so concurrent pipelines each need their own.
pub struct Ocr<D, R> {
    det_model: DbNet<D>,
    rec_model: CrnnNet<R>,
    detection: DetectionOptions,
    recognition: RecognitionOptions,
}

impl<D: InferenceEngine, R: InferenceEngine> Ocr<D, R> {
    pub fn new(
        det_engine: D,
        rec_engine: R,
        keys: CharacterTable,
        detection: DetectionOptions,
        recognition: RecognitionOptions,
    ) -> Result<Self> {
        detection.validate()?;
        recognition.validate()?;
        Ok(Self {
            det_model: DbNet::new(det_engine),
            rec_model: CrnnNet::new(rec_engine, keys, recognition.image_height),
            detection,
            recognition,
        })
    }

    pub fn detection_options(&self) -> &DetectionOptions {
        &self.detection
    }

    /// Text regions in original-image coordinates, in detection order.
    #[instrument(skip(self, image))]
    pub fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Region>> {
        self.det_model.get_text_regions(image, &self.detection)
    }

    /// Recognizes an already rectified patch.
    pub fn recognize(&mut self, patch: &DynamicImage) -> Result<DecodeResult> {
        self.rec_model.get_text_line(patch)
    }

    /// Detects, rectifies and recognizes every text region of `image`.
    ///
    /// Regions that cannot be rectified, or whose patch is smaller than
    /// `min_patch_area`, are left out; results keep detection order.
    #[instrument(skip(self, image))]
    pub fn run(&mut self, image: &DynamicImage) -> Result<Vec<OcrResult>> {
        let regions = self.detect(image)?;
        log::debug!("Detected {} regions", regions.len());
        if regions.is_empty() {
            return Ok(Vec::new());
        }

        let source = image.to_rgb8();
        let mut results = Vec::with_capacity(regions.len());
        for (index, region) in regions.into_iter().enumerate() {
            let patch = match rectify::rectify(&source, &region.polygon) {
                Ok(patch) => patch,
                Err(err) if err.is_local() => {
                    log::debug!("Dropping region: {}", err.for_region(index));
                    continue;
                }
                Err(err) => return Err(err),
            };
            let area = patch.width() as u64 * patch.height() as u64;
            if area < self.recognition.min_patch_area as u64 {
                log::debug!("Skipping region {index}: patch area {area} is too small");
                continue;
            }
            let text = self.rec_model.get_text_line(&patch)?;
            results.push(OcrResult {
                bounds: region,
                text,
            });
        }
        Ok(results)
    }

    /// Runs every image independently; one failing image does not stop the rest.
    pub fn run_batch<'a>(
        &mut self,
        images: impl IntoIterator<Item = &'a DynamicImage>,
    ) -> Vec<Result<Vec<OcrResult>>> {
        images
            .into_iter()
            .enumerate()
            .map(|(index, image)| {
                self.run(image).map_err(|err| {
                    log::warn!("Image {index} failed: {err}");
                    err
                })
            })
            .collect()
    }
}
