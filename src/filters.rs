//! Alpha-channel post-filters
//!
//! Local pixel operations used by the removal engine and the edge enhancer:
//! threshold-based matting refinement, alpha-only Gaussian blur, 3x3
//! smoothing, morphological erosion and a sharpness nudge. Color channels are
//! never touched by the alpha filters, so foreground color survives under
//! transparency.

use crate::config::MattingParams;
use image::{imageops, GrayImage, Luma, Rgba, RgbaImage};

/// 3x3 smoothing kernel (center-weighted box, normalized)
const SMOOTH_KERNEL: [f32; 9] = [
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    5.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
    1.0 / 13.0,
];

/// Extract the alpha channel as a grayscale image
#[must_use]
pub fn alpha_channel(image: &RgbaImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut alpha = GrayImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        alpha.put_pixel(x, y, Luma([pixel[3]]));
    }
    alpha
}

/// Recombine color channels with a replacement alpha channel
///
/// Dimensions must match; mismatched coordinates keep the original alpha.
#[must_use]
pub fn with_alpha(image: &RgbaImage, alpha: &GrayImage) -> RgbaImage {
    let mut result = image.clone();
    for (x, y, pixel) in result.enumerate_pixels_mut() {
        if let Some(a) = alpha.get_pixel_checked(x, y) {
            pixel[3] = a[0];
        }
    }
    result
}

/// Gaussian-blur only the alpha channel, leaving color untouched
#[must_use]
pub fn blur_alpha(image: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    let blurred = imageops::blur(&alpha_channel(image), sigma);
    with_alpha(image, &blurred)
}

/// Apply the 3x3 smoothing kernel to a grayscale channel
#[must_use]
pub fn smooth(channel: &GrayImage) -> GrayImage {
    imageops::filter3x3(channel, &SMOOTH_KERNEL)
}

/// Morphological erosion: square min-filter of the given kernel size
///
/// Shrinks bright (foreground) regions by removing boundary pixels. A kernel
/// size below 2 returns the input unchanged. Implemented as two separable
/// passes since the structuring element is square.
#[must_use]
pub fn erode(channel: &GrayImage, kernel_size: u32) -> GrayImage {
    let radius = (kernel_size / 2) as i64;
    if radius == 0 {
        return channel.clone();
    }
    let (width, height) = channel.dimensions();

    let mut horizontal = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut min = u8::MAX;
            for dx in -radius..=radius {
                let sx = x as i64 + dx;
                if sx >= 0 && sx < i64::from(width) {
                    min = min.min(channel.get_pixel(sx as u32, y)[0]);
                }
            }
            horizontal.put_pixel(x, y, Luma([min]));
        }
    }

    let mut eroded = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let mut min = u8::MAX;
            for dy in -radius..=radius {
                let sy = y as i64 + dy;
                if sy >= 0 && sy < i64::from(height) {
                    min = min.min(horizontal.get_pixel(x, sy as u32)[0]);
                }
            }
            eroded.put_pixel(x, y, Luma([min]));
        }
    }

    eroded
}

/// Threshold-based matting refinement of a soft alpha mask
///
/// Pixels at or above the foreground threshold are treated as definite
/// foreground, but only after eroding that region by `erode_size` so the
/// snap-to-opaque never reaches the boundary band. Pixels at or below the
/// background threshold become fully transparent. Everything in between keeps
/// its soft value, which is where hair strands and other fine detail live.
#[must_use]
pub fn refine_alpha(mask: &GrayImage, params: &MattingParams) -> GrayImage {
    if !params.use_matting {
        return mask.clone();
    }

    let (width, height) = mask.dimensions();
    let mut confident = GrayImage::new(width, height);
    for (x, y, pixel) in mask.enumerate_pixels() {
        let value = if pixel[0] >= params.foreground_threshold {
            255
        } else {
            0
        };
        confident.put_pixel(x, y, Luma([value]));
    }
    let confident = erode(&confident, params.erode_size);

    let mut refined = GrayImage::new(width, height);
    for (x, y, pixel) in mask.enumerate_pixels() {
        let value = if confident.get_pixel(x, y)[0] == 255 {
            255
        } else if pixel[0] <= params.background_threshold {
            0
        } else {
            pixel[0]
        };
        refined.put_pixel(x, y, Luma([value]));
    }
    refined
}

/// Adjust overall sharpness by blending against a smoothed copy
///
/// Factor 1.0 returns the image unchanged, below 1.0 softens, above 1.0
/// sharpens by extrapolating away from the smoothed copy.
#[must_use]
pub fn adjust_sharpness(image: &RgbaImage, factor: f32) -> RgbaImage {
    let smoothed = imageops::filter3x3(image, &SMOOTH_KERNEL);
    let (width, height) = image.dimensions();
    let mut result = RgbaImage::new(width, height);
    for (x, y, pixel) in image.enumerate_pixels() {
        let soft = smoothed.get_pixel(x, y);
        let mut blended = [0u8; 4];
        for c in 0..4 {
            let value = f32::from(soft[c]) + (f32::from(pixel[c]) - f32::from(soft[c])) * factor;
            blended[c] = value.round().clamp(0.0, 255.0) as u8;
        }
        result.put_pixel(x, y, Rgba(blended));
    }
    result
}
