//! Adaptive binarization: separate ink from paper.
//!
//! Each pixel is compared against the mean of its `block_size x
//! block_size` neighborhood minus a constant offset `c`. Pixels at or
//! below that local threshold become ink (255); everything else becomes
//! paper (0). The result is an inverted mask: line-work is white.
//!
//! A local threshold copes with scanned or shaded sheets where a single
//! global cutoff would swallow hatching or drop faint outlines.
//!
//! The neighborhood mean comes from `imageproc` filters
//! ([`box_filter`](imageproc::filter::box_filter) for the plain mean,
//! [`separable_filter_equal`](imageproc::filter::separable_filter_equal)
//! with a `block_size`-tap Gaussian kernel for the weighted one). Both
//! replicate edge pixels at the image border.

use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::types::PipelineError;

/// Ink value in binary masks.
pub const INK: u8 = 255;

/// Paper value in binary masks.
pub const PAPER: u8 = 0;

/// How neighborhood pixels are weighted when computing the local mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AdaptiveMethod {
    /// Gaussian-weighted mean with sigma derived from the block size.
    #[default]
    Gaussian,
    /// Unweighted mean over the square block.
    Mean,
}

/// Check that a block size describes a centered, symmetric window.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `block_size` is even or
/// smaller than 3.
pub fn validate_block_size(block_size: u32) -> Result<(), PipelineError> {
    if block_size % 2 == 0 {
        return Err(PipelineError::InvalidConfig(format!(
            "adaptive_block_size must be odd, got {block_size}"
        )));
    }
    if block_size < 3 {
        return Err(PipelineError::InvalidConfig(format!(
            "adaptive_block_size must be >= 3, got {block_size}"
        )));
    }
    Ok(())
}

/// Gaussian sigma for a given block size.
///
/// Uses the conventional `0.3 * ((k - 1) / 2 - 1) + 0.8` relation so the
/// kernel's effective support roughly matches the block.
fn gaussian_sigma(block_size: u32) -> f32 {
    #[allow(clippy::cast_precision_loss)]
    let k = block_size as f32;
    0.3f32.mul_add((k - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Normalized 1-D Gaussian kernel with exactly `block_size` taps.
fn gaussian_kernel(block_size: u32) -> Vec<f32> {
    let sigma = gaussian_sigma(block_size);
    let radius = i64::from(block_size / 2);
    #[allow(clippy::cast_precision_loss)]
    let weights: Vec<f32> = (-radius..=radius)
        .map(|offset| {
            let d = offset as f32;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Gaussian-weighted mean of each pixel's `block_size x block_size`
/// neighborhood, kept in `f32` so the threshold is not quantized.
fn gaussian_local_mean(gray: &GrayImage, block_size: u32) -> ImageBuffer<Luma<f32>, Vec<f32>> {
    let wide = ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        Luma([f32::from(gray.get_pixel(x, y).0[0])])
    });
    imageproc::filter::separable_filter_equal(&wide, &gaussian_kernel(block_size))
}

/// Binarize a grayscale page with a local adaptive threshold.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `block_size` is even or
/// smaller than 3.
pub fn adaptive_binarize(
    gray: &GrayImage,
    block_size: u32,
    c: f64,
    method: AdaptiveMethod,
) -> Result<GrayImage, PipelineError> {
    validate_block_size(block_size)?;

    let local_mean = match method {
        AdaptiveMethod::Mean => {
            let radius = block_size / 2;
            let mean = imageproc::filter::box_filter(gray, radius, radius);
            ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
                Luma([f32::from(mean.get_pixel(x, y).0[0])])
            })
        }
        AdaptiveMethod::Gaussian => gaussian_local_mean(gray, block_size),
    };

    Ok(GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = f64::from(gray.get_pixel(x, y).0[0]);
        let threshold = f64::from(local_mean.get_pixel(x, y).0[0]) - c;
        if value <= threshold {
            Luma([INK])
        } else {
            Luma([PAPER])
        }
    }))
}
