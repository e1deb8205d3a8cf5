//! Thickness gate: drop line-work lighter than a configured weight.
//!
//! A morphological opening with a square structuring element erodes the
//! ink mask and dilates it back. Strokes thinner than the element vanish
//! during erosion and never come back; heavier strokes regain roughly
//! their original shape. Thin lines on a plan are dimensions, hatching,
//! grid lines, and annotation, none of which bound a measurable region.
//!
//! An optional closing afterwards bridges small breaks in the surviving
//! outlines so that contour tracing sees closed boundaries.
//!
//! Odd element sides use `imageproc`'s distance-transform morphology
//! with the chessboard norm (an L-infinity ball of radius `r` is exactly
//! a `(2r + 1)` square). Even sides have no centered ball, so they fall
//! back to the mask-based grayscale operators with the anchor at
//! `side / 2`, which on a 0/255 mask behave as binary morphology.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::Mask;

use crate::types::{MAX_KERNEL_PX, PipelineError};

/// Check a structuring element side.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `side` is zero or larger
/// than [`MAX_KERNEL_PX`].
pub fn validate_kernel(name: &str, side: u32) -> Result<(), PipelineError> {
    if side == 0 {
        return Err(PipelineError::InvalidConfig(format!("{name} must be >= 1")));
    }
    if side > MAX_KERNEL_PX {
        return Err(PipelineError::InvalidConfig(format!(
            "{name} must be <= {MAX_KERNEL_PX}, got {side}"
        )));
    }
    Ok(())
}

/// Output of the thickness gate.
#[derive(Debug, Clone)]
pub struct GatedMask {
    /// Mask after opening.
    pub opened: GrayImage,
    /// Mask after closing, when a closing kernel was configured.
    pub closed: Option<GrayImage>,
}

impl GatedMask {
    /// The mask handed to contour tracing.
    #[must_use]
    pub fn into_final(self) -> GrayImage {
        self.closed.unwrap_or(self.opened)
    }
}

/// Remove line-work thinner than `line_weight_threshold_px`, then
/// optionally close gaps with a `close_kernel_px` square.
///
/// `close_kernel_px` of `None` or `Some(0)` skips the closing step.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if a kernel side is out of
/// range.
pub fn thickness_gate(
    mask: &GrayImage,
    line_weight_threshold_px: u32,
    close_kernel_px: Option<u32>,
) -> Result<GatedMask, PipelineError> {
    validate_kernel("line_weight_threshold_px", line_weight_threshold_px)?;
    let opened = open_square(mask, line_weight_threshold_px)?;

    let closed = match close_kernel_px.filter(|&k| k > 0) {
        Some(side) => {
            validate_kernel("close_kernel_px", side)?;
            Some(close_square(&opened, side)?)
        }
        None => None,
    };

    Ok(GatedMask { opened, closed })
}

/// Morphological opening with a `side x side` square.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `side` is out of range.
pub fn open_square(mask: &GrayImage, side: u32) -> Result<GrayImage, PipelineError> {
    match SquareElement::new(side)? {
        SquareElement::Identity => Ok(mask.clone()),
        SquareElement::Centered(radius) => {
            Ok(imageproc::morphology::open(mask, Norm::LInf, radius))
        }
        SquareElement::Anchored(element) => {
            Ok(imageproc::morphology::grayscale_open(mask, &element))
        }
    }
}

/// Morphological closing with a `side x side` square.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `side` is out of range.
pub fn close_square(mask: &GrayImage, side: u32) -> Result<GrayImage, PipelineError> {
    match SquareElement::new(side)? {
        SquareElement::Identity => Ok(mask.clone()),
        SquareElement::Centered(radius) => {
            Ok(imageproc::morphology::close(mask, Norm::LInf, radius))
        }
        SquareElement::Anchored(element) => {
            Ok(imageproc::morphology::grayscale_close(mask, &element))
        }
    }
}

/// A square structuring element in whichever form `imageproc` accepts.
enum SquareElement {
    /// A 1x1 element: morphology is a no-op.
    Identity,
    /// Odd side `2r + 1`: chessboard ball of radius `r`.
    Centered(u8),
    /// Even side: explicit mask anchored at `side / 2`.
    Anchored(Mask),
}

impl SquareElement {
    fn new(side: u32) -> Result<Self, PipelineError> {
        validate_kernel("structuring element side", side)?;
        if side == 1 {
            return Ok(Self::Identity);
        }
        let half = u8::try_from(side / 2).map_err(|_| {
            PipelineError::InvalidConfig(format!("structuring element side {side} is too large"))
        })?;
        if side % 2 == 1 {
            Ok(Self::Centered(half))
        } else {
            let footprint = GrayImage::from_pixel(side, side, Luma([255]));
            Ok(Self::Anchored(Mask::from_image(&footprint, half, half)))
        }
    }
}
