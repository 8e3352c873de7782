use geo::Coord;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use tracing::instrument;

use crate::{
    error::{Error, Result, Stage},
    geometry::{distance, Quad},
};

/// Output size of the rectified patch for `quad`: the longer of each pair of
/// opposite edges.
pub fn patch_size(quad: &Quad) -> (f64, f64) {
    let [v0, v1, v2, v3] = *quad.points();
    let width = distance(v0, v1).max(distance(v2, v3));
    let height = distance(v0, v3).max(distance(v1, v2));
    (width, height)
}

/// Projective transform taking `from[i]` onto `to[i]`.
pub fn perspective_transform(
    from: &[Coord<f64>; 4],
    to: &[Coord<f64>; 4],
) -> Option<Projection> {
    let control_points = |points: &[Coord<f64>; 4]| points.map(|p| (p.x as f32, p.y as f32));
    Projection::from_control_points(control_points(from), control_points(to))
}

/// Warps the region bounded by `quad` into an upright `width × height` patch.
#[instrument(level = "trace", skip(image))]
pub fn rectify(image: &RgbImage, quad: &Quad) -> Result<DynamicImage> {
    let (width, height) = patch_size(quad);
    if width < 1.0 || height < 1.0 {
        return Err(Error::degenerate(
            Stage::Rectify,
            format!("patch would be {width:.2}x{height:.2}"),
        ));
    }

    let corners = [
        Coord { x: 0.0, y: 0.0 },
        Coord { x: width - 1.0, y: 0.0 },
        Coord { x: width - 1.0, y: height - 1.0 },
        Coord { x: 0.0, y: height - 1.0 },
    ];
    let projection = perspective_transform(quad.points(), &corners)
        .ok_or_else(|| Error::degenerate(Stage::Rectify, "no projective transform exists"))?;

    let (out_width, out_height) = (width.round() as u32, height.round() as u32);
    let mut patch = RgbImage::new(out_width, out_height);
    warp_into(
        image,
        &projection,
        Interpolation::Bilinear,
        Rgb([0, 0, 0]),
        &mut patch,
    );
    log::trace!("Rectified {quad:?} into {out_width}x{out_height}");
    Ok(DynamicImage::ImageRgb8(patch))
}
