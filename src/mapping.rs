use geo::Coord;

use crate::{
    error::{Error, Result, Stage},
    geometry::{InvalidQuad, Quad},
    normalize::TransformContext,
};

/// Maps a quad from probability-map pixels back onto the original image.
///
/// `map_size` is the `(width, height)` of the probability map; when the model
/// output differs from the square input, coordinates are first rescaled into
/// letterbox space. Vertices are rounded and clipped into the image; a quad
/// that clipping flattens to zero width or height is rejected.
pub fn map_to_original(
    quad: &Quad,
    context: &TransformContext,
    map_size: (usize, usize),
) -> Result<Quad> {
    let (map_width, map_height) = map_size;
    if map_width == 0 || map_height == 0 || context.scale <= 0.0 {
        return Err(Error::Config(format!(
            "cannot map from a {map_width}x{map_height} map with scale {}",
            context.scale
        )));
    }
    let to_input_x = context.input_size as f64 / map_width as f64;
    let to_input_y = context.input_size as f64 / map_height as f64;
    let scale = context.scale as f64;
    let max_x = context.original_width.saturating_sub(1) as f64;
    let max_y = context.original_height.saturating_sub(1) as f64;

    let clip = |p: Coord<f64>| Coord {
        x: p.x.round().clamp(0.0, max_x),
        y: p.y.round().clamp(0.0, max_y),
    };
    let points = quad.points().map(|p| {
        clip(Coord {
            x: (p.x * to_input_x - context.pad_left as f64) / scale,
            y: (p.y * to_input_y - context.pad_top as f64) / scale,
        })
    });

    let collapsed_x = points.iter().all(|p| p.x == points[0].x);
    let collapsed_y = points.iter().all(|p| p.y == points[0].y);
    if collapsed_x || collapsed_y {
        return Err(Error::degenerate(
            Stage::Map,
            "polygon collapsed to zero width or height after clipping",
        ));
    }
    // Clipping at a corner can merge vertices; fit a new quad around what is left.
    Quad::new(points)
        .or_else(|_| {
            Quad::minimum_bounding(&points).and_then(|fitted| Quad::new(fitted.points().map(clip)))
        })
        .or_else(|_| bounding_box(&points))
        .map_err(|e| e.at(Stage::Map))
}

fn bounding_box(points: &[Coord<f64>; 4]) -> std::result::Result<Quad, InvalidQuad> {
    let (x0, x1) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.x), hi.max(p.x))
    });
    let (y0, y1) = points.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        (lo.min(p.y), hi.max(p.y))
    });
    Quad::from_tuples([(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TransformContext {
        // 200x100 image letterboxed into 64x64.
        TransformContext {
            scale: 0.32,
            pad_left: 0,
            pad_top: 16,
            original_width: 200,
            original_height: 100,
            input_size: 64,
        }
    }

    #[test]
    fn inverts_letterbox_transform() {
        let quad = Quad::from_tuples([(8.0, 24.0), (40.0, 24.0), (40.0, 32.0), (8.0, 32.0)]).unwrap();
        let mapped = map_to_original(&quad, &context(), (64, 64)).unwrap();
        assert_eq!(mapped.as_pixels(), [(25, 25), (125, 25), (125, 50), (25, 50)]);
    }

    #[test]
    fn rescales_smaller_output_maps() {
        let quad = Quad::from_tuples([(2.0, 6.0), (10.0, 6.0), (10.0, 8.0), (2.0, 8.0)]).unwrap();
        let mapped = map_to_original(&quad, &context(), (16, 16)).unwrap();
        assert_eq!(mapped.as_pixels(), [(25, 25), (125, 25), (125, 50), (25, 50)]);
    }

    #[test]
    fn clips_into_image_bounds() {
        let quad = Quad::from_tuples([(-4.0, 0.0), (70.0, 0.0), (70.0, 60.0), (-4.0, 60.0)]).unwrap();
        let mapped = map_to_original(&quad, &context(), (64, 64)).unwrap();
        for (x, y) in mapped.as_pixels() {
            assert!((0..200).contains(&x));
            assert!((0..100).contains(&y));
        }
    }

    #[test]
    fn quad_inside_padding_collapses_and_is_dropped() {
        // Entirely within the top padding band: every y clips to 0.
        let quad = Quad::from_tuples([(0.0, 0.0), (10.0, 0.0), (10.0, 4.0), (0.0, 4.0)]).unwrap();
        let err = map_to_original(&quad, &context(), (64, 64)).unwrap_err();
        assert!(matches!(err, Error::DegenerateGeometry { stage: Stage::Map, .. }));
    }

    #[test]
    fn slanted_quad_past_a_corner_is_kept() {
        let context = TransformContext {
            scale: 1.0,
            pad_left: 0,
            pad_top: 0,
            original_width: 100,
            original_height: 100,
            input_size: 100,
        };
        // The two top-left vertices both clip onto (0, 0).
        let quad = Quad::from_tuples([(-4.0, -1.0), (-1.0, -4.0), (39.0, 36.0), (36.0, 39.0)]).unwrap();
        let mapped = map_to_original(&quad, &context, (100, 100)).unwrap();
        for (x, y) in mapped.as_pixels() {
            assert!((0..100).contains(&x) && (0..100).contains(&y));
        }
        assert!(mapped.max_side() > 30.0);
        assert!(mapped.area() > 100.0);
    }

    #[test]
    fn quad_collapsing_to_a_point_is_dropped() {
        let quad =
            Quad::from_tuples([(-20.0, -20.0), (-10.0, -20.0), (-10.0, -10.0), (-20.0, -10.0)]).unwrap();
        assert!(map_to_original(&quad, &context(), (64, 64)).is_err());
    }
}
