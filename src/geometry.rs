use geo::{
    Area, ConvexHull, Coord, EuclideanLength, Intersects, Line, LineString, MultiPoint, Polygon,
};
use thiserror::Error;

use crate::error::{Error, Stage};

const AREA_EPSILON: f64 = 1e-6;
const VERTEX_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidQuad {
    #[error("vertex coordinates are not finite")]
    NonFinite,
    #[error("two vertices coincide")]
    DuplicateVertex,
    #[error("polygon has zero area")]
    ZeroArea,
    #[error("polygon is self-intersecting")]
    SelfIntersecting,
}

impl InvalidQuad {
    pub(crate) fn at(self, stage: Stage) -> Error {
        Error::degenerate(stage, self.to_string())
    }
}

/// Four distinct vertices, clockwise on screen from the top-left-most one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    points: [Coord<f64>; 4],
}

impl Quad {
    /// Builds a quad from four vertices in any order.
    pub fn new(points: [Coord<f64>; 4]) -> Result<Self, InvalidQuad> {
        if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(InvalidQuad::NonFinite);
        }
        for i in 0..4 {
            for j in i + 1..4 {
                if distance(points[i], points[j]) <= VERTEX_EPSILON {
                    return Err(InvalidQuad::DuplicateVertex);
                }
            }
        }

        let quad = Self {
            points: order_clockwise(points),
        };
        if quad.area() <= AREA_EPSILON {
            return Err(InvalidQuad::ZeroArea);
        }
        if quad.is_self_intersecting() {
            return Err(InvalidQuad::SelfIntersecting);
        }
        Ok(quad)
    }

    pub fn from_tuples(points: [(f64, f64); 4]) -> Result<Self, InvalidQuad> {
        Self::new(points.map(|(x, y)| Coord { x, y }))
    }

    /// Minimum-area oriented rectangle enclosing `points`.
    pub fn minimum_bounding(points: &[Coord<f64>]) -> Result<Self, InvalidQuad> {
        let hull = MultiPoint::from(points.to_vec()).convex_hull();
        let ring = hull.exterior();

        let mut best: Option<(f64, [Coord<f64>; 4])> = None;
        for edge in ring.lines() {
            let length = edge.euclidean_length();
            if length <= VERTEX_EPSILON {
                continue;
            }
            let u = edge.delta() / length;
            let n = Coord { x: -u.y, y: u.x };

            let (mut u_min, mut u_max) = (f64::INFINITY, f64::NEG_INFINITY);
            let (mut n_min, mut n_max) = (f64::INFINITY, f64::NEG_INFINITY);
            for p in ring.coords() {
                let a = dot(*p, u);
                let b = dot(*p, n);
                u_min = u_min.min(a);
                u_max = u_max.max(a);
                n_min = n_min.min(b);
                n_max = n_max.max(b);
            }

            let area = (u_max - u_min) * (n_max - n_min);
            if best.map_or(true, |(best_area, _)| area < best_area) {
                let corners = [
                    u * u_min + n * n_min,
                    u * u_max + n * n_min,
                    u * u_max + n * n_max,
                    u * u_min + n * n_max,
                ];
                best = Some((area, corners));
            }
        }

        let (_, corners) = best.ok_or(InvalidQuad::ZeroArea)?;
        Self::new(corners)
    }

    pub fn points(&self) -> &[Coord<f64>; 4] {
        &self.points
    }

    pub fn as_pixels(&self) -> [(i32, i32); 4] {
        self.points
            .map(|p| (p.x.round() as i32, p.y.round() as i32))
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(LineString::from(self.points.to_vec()), vec![])
    }

    pub fn area(&self) -> f64 {
        self.to_polygon().unsigned_area()
    }

    pub(crate) fn signed_area(&self) -> f64 {
        self.to_polygon().signed_area()
    }

    pub fn perimeter(&self) -> f64 {
        self.to_polygon().exterior().euclidean_length()
    }

    pub fn side_lengths(&self) -> [f64; 4] {
        [0, 1, 2, 3].map(|i| distance(self.points[i], self.points[(i + 1) % 4]))
    }

    pub fn min_side(&self) -> f64 {
        self.side_lengths().into_iter().fold(f64::INFINITY, f64::min)
    }

    pub fn max_side(&self) -> f64 {
        self.side_lengths().into_iter().fold(0.0, f64::max)
    }

    fn is_self_intersecting(&self) -> bool {
        let edge = |i: usize| Line::new(self.points[i], self.points[(i + 1) % 4]);
        edge(0).intersects(&edge(2)) || edge(1).intersects(&edge(3))
    }
}

pub(crate) fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

pub(crate) fn dot(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.x + a.y * b.y
}

pub(crate) fn cross(a: Coord<f64>, b: Coord<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

// Start vertex: smallest x + y, then smallest y, then smallest x.
fn order_clockwise(mut points: [Coord<f64>; 4]) -> [Coord<f64>; 4] {
    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;
    points.sort_by(|a, b| {
        let angle_a = (a.y - cy).atan2(a.x - cx);
        let angle_b = (b.y - cy).atan2(b.x - cx);
        angle_a.total_cmp(&angle_b)
    });

    let start = (0..4)
        .min_by(|&i, &j| {
            let (a, b) = (points[i], points[j]);
            (a.x + a.y)
                .total_cmp(&(b.x + b.y))
                .then(a.y.total_cmp(&b.y))
                .then(a.x.total_cmp(&b.x))
        })
        .unwrap_or(0);
    points.rotate_left(start);
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(points: [(f64, f64); 4]) -> [Coord<f64>; 4] {
        points.map(|(x, y)| Coord { x, y })
    }

    #[test]
    fn orders_vertices_clockwise_from_top_left() {
        let quad = Quad::from_tuples([(10.0, 5.0), (0.0, 0.0), (0.0, 5.0), (10.0, 0.0)]).unwrap();
        assert_eq!(
            quad.points(),
            &coords([(0.0, 0.0), (10.0, 0.0), (10.0, 5.0), (0.0, 5.0)])
        );
        assert!(quad.signed_area() > 0.0);
    }

    #[test]
    fn diamond_starts_at_top_vertex() {
        let quad = Quad::from_tuples([(0.0, 5.0), (5.0, 10.0), (10.0, 5.0), (5.0, 0.0)]).unwrap();
        assert_eq!(
            quad.points(),
            &coords([(5.0, 0.0), (10.0, 5.0), (5.0, 10.0), (0.0, 5.0)])
        );
    }

    #[test]
    fn bowtie_input_is_reordered_into_simple_quad() {
        let quad = Quad::from_tuples([(0.0, 0.0), (4.0, 4.0), (4.0, 0.0), (0.0, 4.0)]).unwrap();
        assert!((quad.area() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_degenerate_input() {
        assert_eq!(
            Quad::from_tuples([(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)]),
            Err(InvalidQuad::ZeroArea)
        );
        assert_eq!(
            Quad::from_tuples([(0.0, 0.0), (0.0, 0.0), (2.0, 0.0), (0.0, 2.0)]),
            Err(InvalidQuad::DuplicateVertex)
        );
        assert_eq!(
            Quad::from_tuples([(f64::NAN, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]),
            Err(InvalidQuad::NonFinite)
        );
    }

    #[test]
    fn measures_sides_area_and_perimeter() {
        let quad = Quad::from_tuples([(0.0, 0.0), (6.0, 0.0), (6.0, 2.0), (0.0, 2.0)]).unwrap();
        assert_eq!(quad.side_lengths(), [6.0, 2.0, 6.0, 2.0]);
        assert_eq!(quad.min_side(), 2.0);
        assert_eq!(quad.max_side(), 6.0);
        assert!((quad.area() - 12.0).abs() < 1e-9);
        assert!((quad.perimeter() - 16.0).abs() < 1e-9);
    }

    #[test]
    fn minimum_bounding_is_tight_for_axis_aligned_points() {
        let points = [(1.0, 1.0), (3.0, 1.0), (1.0, 3.0), (3.0, 3.0), (2.0, 2.0)]
            .map(|(x, y)| Coord { x, y });
        let quad = Quad::minimum_bounding(&points).unwrap();
        assert_eq!(
            quad.points(),
            &coords([(1.0, 1.0), (3.0, 1.0), (3.0, 3.0), (1.0, 3.0)])
        );
    }

    #[test]
    fn minimum_bounding_follows_rotation() {
        // Square of side sqrt(2) rotated by 45 degrees.
        let points = [(1.0, 0.0), (2.0, 1.0), (1.0, 2.0), (0.0, 1.0)].map(|(x, y)| Coord { x, y });
        let quad = Quad::minimum_bounding(&points).unwrap();
        assert!((quad.area() - 2.0).abs() < 1e-9);
        for side in quad.side_lengths() {
            assert!((side - 2f64.sqrt()).abs() < 1e-9);
        }
    }

    #[test]
    fn minimum_bounding_of_collinear_points_fails() {
        let points = [(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)].map(|(x, y)| Coord { x, y });
        assert!(Quad::minimum_bounding(&points).is_err());
    }
}
