use std::collections::HashMap;

use geo::Coord;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::ArrayView2;
use tracing::instrument;

use crate::{
    error::{Result, Stage},
    geometry::Quad,
    score::box_score,
};

/// A candidate text region in probability-map pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub polygon: Quad,
    pub score: f32,
}

/// Horizontal extent of a component on one row, `x_max` inclusive.
#[derive(Debug, Clone, Copy)]
struct Run {
    y: u32,
    x_min: u32,
    x_max: u32,
}

/// Groups foreground pixels into 8-connected components, in the order their
/// first pixel appears in a raster scan.
fn component_runs(mask: &GrayImage) -> Vec<Vec<Run>> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));
    let mut slots: HashMap<u32, usize> = HashMap::new();
    let mut components: Vec<Vec<Run>> = Vec::new();

    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let slot = *slots.entry(label).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        let runs = &mut components[slot];
        match runs.last_mut() {
            Some(run) if run.y == y => run.x_max = x,
            _ => runs.push(Run { y, x_min: x, x_max: x }),
        }
    }
    components
}

/// Oriented minimal rectangle around a component's pixel footprint.
///
/// Each pixel covers the unit square `[x, x + 1] × [y, y + 1]`; the hull of a
/// component only depends on the outermost corners of each row.
fn footprint_quad(runs: &[Run]) -> Result<Quad> {
    let corners = runs
        .iter()
        .flat_map(|run| {
            let (left, right) = (run.x_min as f64, run.x_max as f64 + 1.0);
            let (top, bottom) = (run.y as f64, run.y as f64 + 1.0);
            [
                Coord { x: left, y: top },
                Coord { x: right, y: top },
                Coord { x: left, y: bottom },
                Coord { x: right, y: bottom },
            ]
        })
        .collect::<Vec<_>>();
    Quad::minimum_bounding(&corners).map_err(|e| e.at(Stage::Extract))
}

#[derive(Debug, Clone, Copy)]
pub struct RegionExtractor {
    /// Components whose rectangle has a side shorter than this are noise.
    pub min_side: f64,
    pub max_candidates: usize,
}

impl RegionExtractor {
    /// Extracts one scored region per surviving foreground component.
    #[instrument(level = "debug", skip(self, mask, pred))]
    pub fn extract(&self, mask: &GrayImage, pred: ArrayView2<f32>) -> Vec<Region> {
        component_runs(mask)
            .into_iter()
            .take(self.max_candidates)
            .enumerate()
            .filter_map(|(index, runs)| match footprint_quad(&runs) {
                Ok(quad) => Some(quad),
                Err(err) => {
                    log::debug!("Dropping component: {}", err.for_region(index));
                    None
                }
            })
            .filter(|quad| {
                let keep = quad.min_side() >= self.min_side;
                if !keep {
                    log::trace!("Dropping component below noise floor: {quad:?}");
                }
                keep
            })
            .map(|polygon| Region {
                score: box_score(&polygon, pred),
                polygon,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binarize::binarize;
    use ndarray::Array2;

    fn extractor() -> RegionExtractor {
        RegionExtractor {
            min_side: 2.0,
            max_candidates: 1000,
        }
    }

    fn extract(pred: &Array2<f32>, thresh: f32) -> Vec<Region> {
        let mask = binarize(pred.view(), thresh, false);
        extractor().extract(&mask, pred.view())
    }

    #[test]
    fn all_zero_map_has_no_regions() {
        let pred = Array2::<f32>::zeros((16, 16));
        for thresh in [0.0, 0.1, 0.5, 0.99] {
            assert!(extract(&pred, thresh).is_empty());
        }
    }

    #[test]
    fn single_block_yields_tight_quad() {
        let mut pred = Array2::<f32>::zeros((4, 4));
        for y in 1..=2 {
            for x in 1..=2 {
                pred[[y, x]] = 0.9;
            }
        }
        let regions = extract(&pred, 0.5);

        assert_eq!(regions.len(), 1);
        assert_eq!(
            regions[0].polygon,
            Quad::from_tuples([(1.0, 1.0), (3.0, 1.0), (3.0, 3.0), (1.0, 3.0)]).unwrap()
        );
        assert!((regions[0].score - 0.9).abs() <= 0.01);
    }

    #[test]
    fn diagonal_neighbours_form_one_component() {
        let mut pred = Array2::<f32>::zeros((8, 8));
        for (y, x) in [(1, 1), (1, 2), (2, 1), (2, 2), (3, 3), (3, 4), (4, 3), (4, 4)] {
            pred[[y, x]] = 1.0;
        }
        let regions = extract(&pred, 0.5);
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn separate_blocks_keep_raster_order() {
        let mut pred = Array2::<f32>::zeros((10, 12));
        for y in 6..9 {
            for x in 1..4 {
                pred[[y, x]] = 0.8;
            }
        }
        for y in 1..3 {
            for x in 7..11 {
                pred[[y, x]] = 0.7;
            }
        }
        let regions = extract(&pred, 0.5);

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].polygon.points()[0], Coord { x: 7.0, y: 1.0 });
        assert_eq!(regions[1].polygon.points()[0], Coord { x: 1.0, y: 6.0 });
        assert!((regions[0].score - 0.7).abs() < 1e-6);
        assert!((regions[1].score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn thin_components_are_noise() {
        let mut pred = Array2::<f32>::zeros((6, 10));
        for x in 1..9 {
            pred[[2, x]] = 1.0;
        }
        assert!(extract(&pred, 0.5).is_empty());
    }

    #[test]
    fn candidate_limit_is_respected() {
        let mut pred = Array2::<f32>::zeros((4, 20));
        for block in 0..4 {
            for y in 1..3 {
                for x in block * 5..block * 5 + 2 {
                    pred[[y, x]] = 1.0;
                }
            }
        }
        let mask = binarize(pred.view(), 0.5, false);
        let limited = RegionExtractor {
            max_candidates: 3,
            ..extractor()
        };
        assert_eq!(limited.extract(&mask, pred.view()).len(), 3);
    }
}
