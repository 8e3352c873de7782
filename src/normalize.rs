use image::{imageops::FilterType, DynamicImage, Pixel, Rgb, Rgb32FImage, RgbImage};
use ndarray::{Array3, Array4, Axis};
use tracing::instrument;

use crate::error::{Error, Result};

pub const DET_MEAN_VALUES: [f32; 3] = [0.485, 0.456, 0.406];
pub const DET_NORM_VALUES: [f32; 3] = [1.0 / 0.229, 1.0 / 0.224, 1.0 / 0.225];

/// State needed to map detection-space coordinates back onto the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformContext {
    pub scale: f32,
    pub pad_left: u32,
    pub pad_top: u32,
    pub original_width: u32,
    pub original_height: u32,
    /// Side length of the square network input.
    pub input_size: u32,
}

#[derive(Debug, Clone)]
pub struct Letterboxed {
    /// `1 × 3 × S × S`, channel-planar and normalized.
    pub tensor: Array4<f32>,
    pub context: TransformContext,
}

/// Resizes `image` to fit an `S × S` square without changing its aspect ratio,
/// pads the remainder with black and normalizes it for the detection network.
#[instrument(level = "debug", skip(image))]
pub fn letterbox(image: &DynamicImage, target_size: u32) -> Result<Letterboxed> {
    if target_size == 0 {
        return Err(Error::Config("max_side_len must be positive".into()));
    }
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(Error::Image(format!(
            "image dimensions must be non-zero (got {width}x{height})"
        )));
    }

    let scale = target_size as f32 / width.max(height) as f32;
    let new_width = ((width as f32 * scale).round() as u32).clamp(1, target_size);
    let new_height = ((height as f32 * scale).round() as u32).clamp(1, target_size);

    let pad_width = target_size - new_width;
    let pad_height = target_size - new_height;
    let pad_left = pad_width / 2;
    let pad_top = pad_height / 2;
    log::debug!(
        "Letterboxing (w: {width}, h: {height}) into {target_size}x{target_size}: scale {scale}, resized to (w: {new_width}, h: {new_height}), padding left {pad_left}, top {pad_top}."
    );

    let resized = image
        .resize_exact(new_width, new_height, FilterType::Triangle)
        .to_rgb8();
    let mut canvas = RgbImage::new(target_size, target_size);
    image::imageops::replace(&mut canvas, &resized, pad_left as i64, pad_top as i64);

    let tensor = subtract_mean_normalize(
        &DynamicImage::ImageRgb8(canvas),
        &DET_MEAN_VALUES,
        &DET_NORM_VALUES,
    )
    .insert_axis(Axis(0));

    Ok(Letterboxed {
        tensor,
        context: TransformContext {
            scale,
            pad_left,
            pad_top,
            original_width: width,
            original_height: height,
            input_size: target_size,
        },
    })
}

/// Converts to `[0, 1]` floats, applies `(x - mean) * norm` per channel and
/// packs the result channel-planar as `3 × H × W`.
#[instrument(level = "trace", skip(image))]
pub(crate) fn subtract_mean_normalize(
    image: &DynamicImage,
    mean_vals: &[f32; 3],
    norm_vals: &[f32; 3],
) -> Array3<f32> {
    let mut image: Rgb32FImage = image.to_rgb32f();
    let norm = Rgb::<f32>(*norm_vals);
    let mean_vals = Rgb::<f32>(*mean_vals).map2(&norm, |c1, c2| c1 * c2);
    for pixel in image.pixels_mut() {
        *pixel = pixel
            .map2(&norm, |c1, c2| c1 * c2)
            .map2(&mean_vals, |c1, c2| c1 - c2);
    }
    Array3::<f32>::from_shape_fn(
        (3, image.height() as usize, image.width() as usize),
        |(ch, y, x)| image.get_pixel(x as u32, y as u32).channels()[ch],
    )
}
