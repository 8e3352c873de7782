use image::{GrayImage, ImageBuffer, Luma};
use imageproc::{
    contrast::{threshold_mut, ThresholdType},
    morphology::{grayscale_dilate, Mask},
};
use ndarray::{ArrayView2, Axis};
use tracing::instrument;

pub const FOREGROUND: u8 = 255;

/// Quantizes probabilities to 8 bits, `round(p * 255)`.
pub(crate) fn to_luma_image(data: ArrayView2<f32>) -> GrayImage {
    let height = data.len_of(Axis(0));
    let width = data.len_of(Axis(1));
    let pixel_data = data.iter().map(|p| quantize(*p)).collect::<Vec<u8>>();
    ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
        .unwrap_or_else(|| GrayImage::new(width as u32, height as u32))
}

fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Thresholds a probability map into a `0 / 255` mask.
///
/// The comparison happens on the 8-bit quantized values: a pixel is
/// foreground when `round(p * 255) > round(thresh * 255)`.
#[instrument(level = "debug", skip(pred))]
pub fn binarize(pred: ArrayView2<f32>, thresh: f32, dilate: bool) -> GrayImage {
    let mut mask = to_luma_image(pred);
    threshold_mut(&mut mask, quantize(thresh), ThresholdType::Binary);
    if dilate {
        mask = dilate_2x2(&mask);
    }
    mask
}

/// 2×2 dilation anchored at the bottom-right cell: each foreground pixel also
/// lights its right, lower and lower-right neighbours.
pub(crate) fn dilate_2x2(mask: &GrayImage) -> GrayImage {
    let kernel = Mask::from_image(&GrayImage::from_pixel(2, 2, Luma([FOREGROUND])), 1, 1);
    grayscale_dilate(mask, &kernel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn lit(mask: &GrayImage) -> Vec<(u32, u32)> {
        mask.enumerate_pixels()
            .filter(|(_, _, p)| p[0] == FOREGROUND)
            .map(|(x, y, _)| (x, y))
            .collect()
    }

    #[test]
    fn thresholds_on_quantized_values() {
        let pred = array![[0.0, 0.5, 0.502], [0.9, 0.3, 1.0]];
        let mask = binarize(pred.view(), 0.5, false);
        // 0.5 and 0.502 both quantize to 128, which is not above 128.
        assert_eq!(lit(&mask), vec![(0, 1), (2, 1)]);

        let mask = binarize(pred.view(), 0.49, false);
        assert_eq!(lit(&mask), vec![(1, 0), (2, 0), (0, 1), (2, 1)]);
    }

    #[test]
    fn all_zero_map_stays_empty() {
        let pred = Array2::<f32>::zeros((5, 7));
        for thresh in [0.0, 0.3, 1.0] {
            assert!(lit(&binarize(pred.view(), thresh, true)).is_empty());
        }
    }

    #[test]
    fn dilation_grows_right_and_down() {
        let mut pred = Array2::<f32>::zeros((4, 4));
        pred[[1, 1]] = 1.0;
        let mask = binarize(pred.view(), 0.5, true);
        assert_eq!(lit(&mask), vec![(1, 1), (2, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn dilation_clips_at_border() {
        let mut pred = Array2::<f32>::zeros((2, 2));
        pred[[1, 1]] = 1.0;
        let mask = binarize(pred.view(), 0.5, true);
        assert_eq!(lit(&mask), vec![(1, 1)]);
    }
}
