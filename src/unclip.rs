use geo::Coord;

use crate::{
    error::{Error, Result, Stage},
    geometry::{cross, Quad},
};

/// Offsets every edge outward by `area * ratio / perimeter`.
pub fn unclip(quad: &Quad, unclip_ratio: f32) -> Result<Quad> {
    if !unclip_ratio.is_finite() || unclip_ratio < 0.0 {
        return Err(Error::Config(format!(
            "unclip ratio must be non-negative, got {unclip_ratio}"
        )));
    }
    let perimeter = quad.perimeter();
    if perimeter <= 0.0 {
        return Err(Error::degenerate(Stage::Unclip, "polygon has no perimeter"));
    }
    let distance = quad.area() * unclip_ratio as f64 / perimeter;
    let points = quad.points();
    let outward = quad.signed_area().signum();

    // Offset edge i as (origin, direction), running from vertex i to i + 1.
    let edges: [(Coord<f64>, Coord<f64>); 4] = [0, 1, 2, 3].map(|i| {
        let start = points[i];
        let direction = points[(i + 1) % 4] - start;
        let length = direction.x.hypot(direction.y);
        let normal = Coord {
            x: direction.y,
            y: -direction.x,
        } * (outward / length);
        (start + normal * distance, direction)
    });

    let mut expanded = [Coord::zero(); 4];
    for (i, vertex) in expanded.iter_mut().enumerate() {
        let (p, r) = edges[(i + 3) % 4];
        let (q, s) = edges[i];
        let denominator = cross(r, s);
        if denominator.abs() <= f64::EPSILON * r.x.hypot(r.y) * s.x.hypot(s.y) {
            return Err(Error::degenerate(Stage::Unclip, "adjacent edges are parallel"));
        }
        let t = cross(q - p, s) / denominator;
        *vertex = p + r * t;
    }

    let unclipped = Quad::new(expanded).map_err(|e| e.at(Stage::Unclip))?;
    if unclipped.area() + 1e-9 < quad.area() {
        return Err(Error::degenerate(Stage::Unclip, "offset polygon folded over"));
    }
    Ok(unclipped)
}
