use geo::{point, BoundingRect, Contains};
use ndarray::{s, ArrayView2, Axis};

use crate::geometry::Quad;

/// Mean probability over the map pixels whose centres fall inside `quad`.
///
/// Pixels outside the map are ignored; a quad covering no pixel centre scores 0.
pub(crate) fn box_score(quad: &Quad, pred_data: ArrayView2<f32>) -> f32 {
    let height = pred_data.len_of(Axis(0));
    let width = pred_data.len_of(Axis(1));
    let polygon = quad.to_polygon();
    let Some(bounds) = polygon.bounding_rect() else {
        return 0.0;
    };

    let clamp = |value: f64, limit: usize| value.max(0.0).min(limit as f64) as usize;
    let x_min = clamp(bounds.min().x.floor(), width);
    let x_max = clamp(bounds.max().x.ceil(), width);
    let y_min = clamp(bounds.min().y.floor(), height);
    let y_max = clamp(bounds.max().y.ceil(), height);
    if x_min >= x_max || y_min >= y_max {
        return 0.0;
    }

    let sliced = pred_data.slice(s![y_min..y_max, x_min..x_max]);
    let (sum, count) = sliced
        .indexed_iter()
        .filter(|((y, x), _)| {
            polygon.contains(&point! {
                x: (x_min + x) as f64 + 0.5,
                y: (y_min + y) as f64 + 0.5,
            })
        })
        .fold((0.0f64, 0usize), |(sum, count), (_, value)| {
            (sum + *value as f64, count + 1)
        });

    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}

/// Rejects regions that score too low or whose expanded polygon is too small.
#[derive(Debug, Clone, Copy)]
pub struct ScoreFilter {
    pub box_thresh: f32,
    pub min_side: f64,
}

impl ScoreFilter {
    pub fn accepts(&self, score: f32, expanded: &Quad) -> bool {
        if score < self.box_thresh {
            log::trace!("Score {score} below threshold {}", self.box_thresh);
            return false;
        }
        if expanded.min_side() < self.min_side {
            log::trace!("Expanded polygon too small: {expanded:?}");
            return false;
        }
        true
    }
}
