use image::DynamicImage;
use ndarray::{Array2, ArrayD, ArrayView2};
use tracing::instrument;

use crate::{
    binarize::binarize,
    engine::InferenceEngine,
    error::{Error, Result},
    mapping::map_to_original,
    normalize::{letterbox, TransformContext},
    options::DetectionOptions,
    regions::{Region, RegionExtractor},
    score::ScoreFilter,
    unclip::unclip,
};

pub struct DbNet<E> {
    engine: E,
}

impl<E: InferenceEngine> DbNet<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Text regions of `image` in original-image pixel coordinates, in the
    /// order their components were found.
    #[instrument(skip(self, image), level = "debug")]
    pub fn get_text_regions(
        &mut self,
        image: &DynamicImage,
        options: &DetectionOptions,
    ) -> Result<Vec<Region>> {
        let letterboxed = letterbox(image, options.max_side_len)?;
        let output = self.engine.infer(letterboxed.tensor)?;
        let pred_data = probability_map(output)?;
        log::debug!("Probability map is {}x{}", pred_data.ncols(), pred_data.nrows());

        let mask = binarize(
            pred_data.view(),
            options.det_db_thresh,
            options.det_db_use_dilate,
        );
        let regions = RegionExtractor {
            min_side: options.min_region_side,
            max_candidates: options.max_candidates,
        }
        .extract(&mask, pred_data.view());

        Ok(find_text_regions(
            pred_data.view(),
            regions,
            &letterboxed.context,
            options,
        ))
    }
}

/// Checks the `1 × 1 × H′ × W′` output contract and drops the unit axes.
fn probability_map(output: ArrayD<f32>) -> Result<Array2<f32>> {
    let shape = output.shape().to_vec();
    match shape.as_slice() {
        [1, 1, height, width] => output
            .into_shape((*height, *width))
            .map_err(|err| Error::InferenceOutput(err.to_string())),
        _ => Err(Error::InferenceOutput(format!(
            "detection output must be 1x1xHxW, got {shape:?}"
        ))),
    }
}

/// Unclips, filters and maps extracted regions back onto the source image.
/// A region failing any step is dropped on its own.
#[instrument(skip(pred_data, regions), level = "trace")]
fn find_text_regions(
    pred_data: ArrayView2<f32>,
    regions: Vec<Region>,
    context: &TransformContext,
    options: &DetectionOptions,
) -> Vec<Region> {
    let filter = ScoreFilter {
        box_thresh: options.det_db_box_thresh,
        min_side: options.min_box_side,
    };
    let map_size = (pred_data.ncols(), pred_data.nrows());

    regions
        .into_iter()
        .enumerate()
        .filter_map(|(index, region)| {
            let expanded = unclip(&region.polygon, options.det_db_unclip_ratio)
                .map_err(|err| log::debug!("Dropping region: {}", err.for_region(index)))
                .ok()?;
            if !filter.accepts(region.score, &expanded) {
                log::debug!("Region {index} rejected by score filter");
                return None;
            }
            let polygon = map_to_original(&expanded, context, map_size)
                .map_err(|err| log::debug!("Dropping region: {}", err.for_region(index)))
                .ok()?;
            Some(Region {
                polygon,
                score: region.score,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use ndarray::{Array4, IxDyn};

    fn stub(map: Array2<f32>) -> impl FnMut(Array4<f32>) -> Result<ArrayD<f32>> {
        move |_| {
            let (h, w) = map.dim();
            Ok(map.clone().into_shape(IxDyn(&[1, 1, h, w])).unwrap())
        }
    }

    #[test]
    fn rejects_malformed_output() {
        let mut net = DbNet::new(|_: Array4<f32>| {
            Ok::<_, Error>(ArrayD::<f32>::zeros(IxDyn(&[1, 2, 4, 4])))
        });
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let result = net.get_text_regions(&image, &DetectionOptions::default());
        assert!(matches!(result, Err(Error::InferenceOutput(_))));
    }

    #[test]
    fn finds_block_in_original_coordinates() {
        // 100x50 image in a 32x32 input: scale 0.32, 8 rows of padding on top.
        let mut map = Array2::<f32>::zeros((32, 32));
        for y in 12..20 {
            for x in 4..28 {
                map[[y, x]] = 0.95;
            }
        }
        let options = DetectionOptions {
            max_side_len: 32,
            ..Default::default()
        };
        let mut net = DbNet::new(stub(map));
        let image = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        let regions = net.get_text_regions(&image, &options).unwrap();

        assert_eq!(regions.len(), 1);
        assert!((regions[0].score - 0.95).abs() < 1e-6);
        for (x, y) in regions[0].polygon.as_pixels() {
            assert!((0..100).contains(&x) && (0..50).contains(&y));
        }
        // The unclipped box is wider than the raw 24-pixel block.
        let [(x0, _), (x1, _), _, _] = regions[0].polygon.as_pixels();
        assert!(x1 - x0 > 75);
    }

    #[test]
    fn dilation_bridges_one_pixel_gaps() {
        // Two 8x8 blocks with an empty column at x = 12 between them.
        let mut map = Array2::<f32>::zeros((32, 32));
        for y in 10..18 {
            for x in (4..12).chain(13..21) {
                map[[y, x]] = 0.9;
            }
        }
        let image = DynamicImage::ImageRgb8(RgbImage::new(32, 32));
        let mut options = DetectionOptions {
            max_side_len: 32,
            ..Default::default()
        };

        let mut net = DbNet::new(stub(map.clone()));
        assert_eq!(net.get_text_regions(&image, &options).unwrap().len(), 2);

        options.det_db_use_dilate = true;
        let mut net = DbNet::new(stub(map));
        let regions = net.get_text_regions(&image, &options).unwrap();
        assert_eq!(regions.len(), 1);
        let [(x0, _), (x1, _), _, _] = regions[0].polygon.as_pixels();
        assert!(x1 - x0 > 17);
    }

    #[test]
    fn low_scoring_regions_are_dropped() {
        let mut map = Array2::<f32>::zeros((32, 32));
        for y in 10..20 {
            for x in 10..20 {
                map[[y, x]] = 0.4;
            }
        }
        let options = DetectionOptions {
            max_side_len: 32,
            det_db_thresh: 0.3,
            det_db_box_thresh: 0.5,
            ..Default::default()
        };
        let mut net = DbNet::new(stub(map));
        let image = DynamicImage::ImageRgb8(RgbImage::new(32, 32));
        assert!(net.get_text_regions(&image, &options).unwrap().is_empty());
    }
}
