//! Image/tensor conversion for segmentation inference
//!
//! Handles the forward path (RGB conversion, aspect-preserving resize, center
//! padding, NCHW normalization) and the inverse path (mapping the model's
//! square mask tensor back onto original image coordinates). Both directions
//! share the same scale and centering math, so the mask lines up with the
//! input pixel-for-pixel.

use crate::error::{NukkiError, Result};
use crate::models::PreprocessingConfig;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb};
use ndarray::Array4;

/// Scale and centering applied during preprocessing, kept for the inverse map
#[derive(Debug, Clone, Copy)]
struct Placement {
    scale: f32,
    offset_x: u32,
    offset_y: u32,
}

fn placement(original: (u32, u32), target_size: u32) -> Placement {
    let (orig_width, orig_height) = original;
    let target = target_size as f32;
    let scale = (target / orig_width as f32).min(target / orig_height as f32);
    let scaled_width = (orig_width as f32 * scale).round() as u32;
    let scaled_height = (orig_height as f32 * scale).round() as u32;
    Placement {
        scale,
        offset_x: (target_size - scaled_width.min(target_size)) / 2,
        offset_y: (target_size - scaled_height.min(target_size)) / 2,
    }
}

/// Shared image preprocessing for inference
pub struct Preprocessor;

impl Preprocessor {
    /// Convert an image into a normalized NCHW tensor
    ///
    /// The image is converted to RGB, resized preserving aspect ratio, padded
    /// to the model's square input with white, and normalized per channel.
    ///
    /// # Errors
    /// Degenerate target sizes that cannot be represented
    pub fn image_to_tensor(
        image: &DynamicImage,
        config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let target_size = config.target_size[0];
        let rgb = image.to_rgb8();
        let place = placement(rgb.dimensions(), target_size);

        let scaled_width = (rgb.width() as f32 * place.scale).round() as u32;
        let scaled_height = (rgb.height() as f32 * place.scale).round() as u32;
        let resized = image::imageops::resize(
            &rgb,
            scaled_width.max(1),
            scaled_height.max(1),
            image::imageops::FilterType::Triangle,
        );

        // White padding around the centered image
        let mut canvas = ImageBuffer::from_pixel(target_size, target_size, Rgb([255, 255, 255]));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let cx = x + place.offset_x;
            let cy = y + place.offset_y;
            if cx < target_size && cy < target_size {
                canvas.put_pixel(cx, cy, *pixel);
            }
        }

        let side = usize::try_from(target_size).map_err(|_| {
            NukkiError::processing("target size too large for tensor allocation")
        })?;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, pixel) in canvas.enumerate_pixels() {
            for channel in 0..3 {
                let normalized = (f32::from(pixel[channel]) / 255.0
                    - config.normalization_mean[channel])
                    / config.normalization_std[channel];
                tensor[[0, channel, y as usize, x as usize]] = normalized;
            }
        }
        Ok(tensor)
    }

    /// Map a model mask tensor back to an alpha channel at original resolution
    ///
    /// # Errors
    /// Output tensors that are not single-batch single-channel
    pub fn tensor_to_alpha(
        tensor: &Array4<f32>,
        original_dimensions: (u32, u32),
    ) -> Result<GrayImage> {
        let shape = tensor.shape();
        if shape.first().copied().unwrap_or(0) != 1 || shape.get(1).copied().unwrap_or(0) != 1 {
            return Err(NukkiError::processing(format!(
                "expected [1, 1, H, W] mask tensor, got {shape:?}"
            )));
        }
        let mask_height = shape.get(2).copied().unwrap_or(0) as u32;
        let mask_width = shape.get(3).copied().unwrap_or(0) as u32;
        let place = placement(original_dimensions, mask_width);

        let (orig_width, orig_height) = original_dimensions;
        let mut alpha = GrayImage::new(orig_width, orig_height);
        for y in 0..orig_height {
            for x in 0..orig_width {
                let tensor_x = (x as f32 * place.scale).round() as u32 + place.offset_x;
                let tensor_y = (y as f32 * place.scale).round() as u32 + place.offset_y;
                let value = if tensor_x < mask_width && tensor_y < mask_height {
                    tensor
                        .get([0, 0, tensor_y as usize, tensor_x as usize])
                        .copied()
                        .unwrap_or(0.0)
                } else {
                    // Outside the model's prediction area
                    0.0
                };
                alpha.put_pixel(x, y, Luma([(value.clamp(0.0, 1.0) * 255.0) as u8]));
            }
        }
        Ok(alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelName;

    fn test_config() -> PreprocessingConfig {
        ModelName::U2net.preprocessing()
    }

    #[test]
    fn test_image_to_tensor_shape() {
        let image = DynamicImage::new_rgb8(100, 50);
        let tensor = Preprocessor::image_to_tensor(&image, &test_config()).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 320, 320]);
    }

    #[test]
    fn test_rgba_and_rgb_inputs_produce_identical_tensors() {
        let rgb = DynamicImage::ImageRgb8(ImageBuffer::from_fn(31, 17, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, 99])
        }));
        let rgba = DynamicImage::ImageRgba8(rgb.to_rgba8());

        let from_rgb = Preprocessor::image_to_tensor(&rgb, &test_config()).unwrap();
        let from_rgba = Preprocessor::image_to_tensor(&rgba, &test_config()).unwrap();
        assert_eq!(from_rgb, from_rgba);
    }

    #[test]
    fn test_tensor_to_alpha_round_trip_dimensions() {
        let tensor = Array4::<f32>::from_elem((1, 1, 320, 320), 1.0);
        let alpha = Preprocessor::tensor_to_alpha(&tensor, (100, 50)).unwrap();
        assert_eq!(alpha.dimensions(), (100, 50));
        assert!(alpha.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_tensor_to_alpha_rejects_multi_channel() {
        let tensor = Array4::<f32>::zeros((1, 3, 320, 320));
        assert!(Preprocessor::tensor_to_alpha(&tensor, (10, 10)).is_err());
    }
}
