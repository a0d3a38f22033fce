// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Letterbox preprocessing for pose inference.
//!
//! Frames are resized to fit the model input while keeping their aspect ratio,
//! centered on a gray canvas, normalized to [0, 1] and laid out as NCHW.

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, GenericImageView};
use ndarray::Array4;
use rayon::prelude::*;

use crate::error::{AnalysisError, Result};
use crate::keypoint::Keypoint;

/// Default letterbox padding color (gray).
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Normalized letterbox padding value (114/255).
const LETTERBOX_NORM: f32 = 114.0 / 255.0;

const INV_255: f32 = 1.0 / 255.0;

/// Preprocessed frame plus the transform needed to map results back.
#[derive(Debug, Clone)]
pub struct LetterboxResult {
    /// Input tensor `(1, 3, H, W)` in [0, 1].
    pub tensor: Array4<f32>,
    /// Original frame size (height, width).
    pub orig_shape: (u32, u32),
    /// Scale factors applied (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
    /// Padding applied (`pad_top`, `pad_left`).
    pub padding: (f32, f32),
}

impl LetterboxResult {
    /// Map a point from model input space back to the original frame.
    ///
    /// The result is clamped to the frame bounds.
    #[must_use]
    pub fn unletterbox(&self, x: f32, y: f32) -> Keypoint {
        let (scale_y, scale_x) = self.scale;
        let (pad_top, pad_left) = self.padding;
        #[allow(clippy::cast_precision_loss)]
        let (h, w) = (self.orig_shape.0 as f32, self.orig_shape.1 as f32);
        Keypoint::new(
            ((x - pad_left) / scale_x).clamp(0.0, w),
            ((y - pad_top) / scale_y).clamp(0.0, h),
        )
    }

    /// Map a box `[x1, y1, x2, y2]` back to the original frame.
    #[must_use]
    pub fn unletterbox_box(&self, xyxy: [f32; 4]) -> [f32; 4] {
        let p1 = self.unletterbox(xyxy[0], xyxy[1]);
        let p2 = self.unletterbox(xyxy[2], xyxy[3]);
        [p1.x, p1.y, p2.x, p2.y]
    }
}

/// Letterbox `image` into a `target_size` (height, width) model input.
///
/// # Errors
///
/// Returns [`AnalysisError::ImageError`] for empty frames or if resizing fails.
pub fn letterbox(image: &DynamicImage, target_size: (usize, usize)) -> Result<LetterboxResult> {
    let (orig_width, orig_height) = image.dimensions();
    if orig_width == 0 || orig_height == 0 {
        return Err(AnalysisError::ImageError("Empty frame".to_string()));
    }

    let (new_width, new_height, pad_left, pad_top, scale) =
        calculate_letterbox_params(orig_width, orig_height, target_size);

    let resized = resize_rgb(image, new_width, new_height)?;
    let tensor = fill_tensor(
        &resized,
        target_size,
        (pad_top as usize, pad_left as usize),
        (new_height as usize, new_width as usize),
    );

    Ok(LetterboxResult {
        tensor,
        orig_shape: (orig_height, orig_width),
        scale,
        #[allow(clippy::cast_precision_loss)]
        padding: (pad_top as f32, pad_left as f32),
    })
}

/// Compute the scaled size and centered padding for a letterbox.
///
/// # Returns
///
/// `(new_width, new_height, pad_left, pad_top, (scale_y, scale_x))`.
#[must_use]
pub fn calculate_letterbox_params(
    orig_width: u32,
    orig_height: u32,
    target_size: (usize, usize),
) -> (u32, u32, u32, u32, (f32, f32)) {
    #[allow(clippy::cast_precision_loss)]
    let (target_h, target_w) = (target_size.0 as f32, target_size.1 as f32);
    #[allow(clippy::cast_precision_loss)]
    let (orig_h, orig_w) = (orig_height as f32, orig_width as f32);

    let scale = (target_h / orig_h).min(target_w / orig_w);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_w = ((orig_w * scale).round() as u32).max(1);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let new_h = ((orig_h * scale).round() as u32).max(1);

    #[allow(clippy::cast_possible_truncation)]
    let pad_w = (target_size.1 as u32).saturating_sub(new_w);
    #[allow(clippy::cast_possible_truncation)]
    let pad_h = (target_size.0 as u32).saturating_sub(new_h);

    #[allow(clippy::cast_precision_loss)]
    let scale_x = new_w as f32 / orig_w;
    #[allow(clippy::cast_precision_loss)]
    let scale_y = new_h as f32 / orig_h;

    (new_w, new_h, pad_w / 2, pad_h / 2, (scale_y, scale_x))
}

/// Bilinear resize to packed RGB8 bytes.
pub(crate) fn resize_rgb(image: &DynamicImage, width: u32, height: u32) -> Result<Vec<u8>> {
    let (src_w, src_h) = image.dimensions();
    let src_rgb = image.to_rgb8();
    if (src_w, src_h) == (width, height) {
        return Ok(src_rgb.into_raw());
    }

    let src_image = Image::from_vec_u8(src_w, src_h, src_rgb.into_raw(), PixelType::U8x3)
        .map_err(|e| AnalysisError::ImageError(format!("Failed to wrap frame: {e}")))?;
    let mut dst_image = Image::new(width, height, PixelType::U8x3);

    let options =
        ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src_image, &mut dst_image, Some(&options))
        .map_err(|e| AnalysisError::ImageError(format!("Failed to resize frame: {e}")))?;

    Ok(dst_image.into_vec())
}

/// Write packed RGB bytes into a gray NCHW canvas, one channel row per task.
fn fill_tensor(
    rgb: &[u8],
    target_size: (usize, usize),
    offset: (usize, usize),
    size: (usize, usize),
) -> Array4<f32> {
    let (dst_h, dst_w) = target_size;
    let (pad_top, pad_left) = offset;
    let (new_h, new_w) = size;
    let copy_w = new_w.min(dst_w.saturating_sub(pad_left));

    let mut data = vec![LETTERBOX_NORM; 3 * dst_h * dst_w];
    data.par_chunks_mut(dst_w)
        .enumerate()
        .for_each(|(row_index, row)| {
            let channel = row_index / dst_h;
            let dy = row_index % dst_h;
            if dy < pad_top || dy >= pad_top + new_h {
                return;
            }
            let src_row = &rgb[(dy - pad_top) * new_w * 3..];
            for (dx, value) in row[pad_left..pad_left + copy_w].iter_mut().enumerate() {
                *value = f32::from(src_row[dx * 3 + channel]) * INV_255;
            }
        });

    // Length is 3 * H * W by construction.
    Array4::from_shape_vec((1, 3, dst_h, dst_w), data)
        .unwrap_or_else(|_| Array4::from_elem((1, 3, dst_h, dst_w), LETTERBOX_NORM))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_letterbox_params_square() {
        let (new_w, new_h, pad_left, pad_top, _) = calculate_letterbox_params(640, 640, (640, 640));
        assert_eq!((new_w, new_h, pad_left, pad_top), (640, 640, 0, 0));
    }

    #[test]
    fn test_letterbox_params_wide() {
        let (new_w, new_h, pad_left, pad_top, scale) =
            calculate_letterbox_params(1280, 720, (640, 640));
        assert_eq!((new_w, new_h), (640, 360));
        assert_eq!((pad_left, pad_top), (0, 140));
        assert!((scale.0 - 0.5).abs() < 1e-6);
        assert!((scale.1 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_tensor_layout() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([255, 0, 0])));
        let result = letterbox(&image, (20, 20)).unwrap();

        assert_eq!(result.tensor.shape(), &[1, 3, 20, 20]);
        assert_eq!(result.padding, (5.0, 0.0));
        // Padding rows are gray, image rows carry the red channel.
        assert!((result.tensor[[0, 0, 0, 0]] - LETTERBOX_NORM).abs() < 1e-6);
        assert!((result.tensor[[0, 0, 10, 10]] - 1.0).abs() < 1e-6);
        assert!(result.tensor[[0, 1, 10, 10]].abs() < 1e-6);
    }

    #[test]
    fn test_unletterbox_round_trip() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(1280, 720));
        let result = letterbox(&image, (640, 640)).unwrap();

        let kp = result.unletterbox(320.0, 320.0);
        assert!((kp.x - 640.0).abs() < 1e-3);
        assert!((kp.y - 360.0).abs() < 1e-3);

        // Points in the padding clamp to the frame.
        let clipped = result.unletterbox(-50.0, 10.0);
        assert!(clipped.x.abs() < f32::EPSILON);
        assert!(clipped.y.abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_frame_is_error() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(letterbox(&image, (640, 640)).is_err());
    }
}
