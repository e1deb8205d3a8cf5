//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::run_pipeline`] which runs every stage in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use slabtake_pipeline::{Calibration, GrayImage, Pipeline, PipelineConfig, PipelineError};
//! # fn run(page: GrayImage) -> Result<(), PipelineError> {
//! let calibration = Calibration::new(600.0, 4.0)?;
//! let staged = Pipeline::new(page, PipelineConfig::default(), calibration)?
//!     .binarize()?
//!     .gate()?
//!     .trace()
//!     .build_polygons()?
//!     .simplify()
//!     .filter()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying the previously computed
//! intermediates forward. The caller can inspect the current stage's
//! output via accessor methods at any point.
//!
//! # Memory
//!
//! Every stage retains the full raster stack (grayscale page, binary
//! mask, opened mask and, when enabled, closed mask). At 600 dpi a
//! 24x36 inch sheet is over 300 megapixels per raster, so callers that
//! only need polygons and metrics should prefer [`crate::run_pipeline`],
//! which drops each raster as soon as the next stage has consumed it.

use crate::calibration::Calibration;
use crate::contour::ContourTracer;
use crate::filter::FilterTally;
use crate::types::{
    Contour, Dimensions, GrayImage, PipelineConfig, PipelineError, PipelineResult, Polygon,
    StagedResult,
};

/// Rasters carried through every stage after binarization.
#[derive(Debug, Clone)]
struct Rasters {
    grayscale: GrayImage,
    binary: GrayImage,
    opened: GrayImage,
    closed: Option<GrayImage>,
}

impl Rasters {
    fn final_mask(&self) -> &GrayImage {
        self.closed.as_ref().unwrap_or(&self.opened)
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`binarize`](Self::binarize) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .binarize() to continue"]
#[derive(Debug)]
pub struct Pending {
    config: PipelineConfig,
    calibration: Calibration,
    grayscale: GrayImage,
}

/// Entry point for the incremental pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline over one grayscale page.
    ///
    /// The configuration is validated here, before any raster work.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` violates an
    /// invariant.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(
        grayscale: GrayImage,
        config: PipelineConfig,
        calibration: Calibration,
    ) -> Result<Pending, PipelineError> {
        config.validate()?;
        Ok(Pending {
            config,
            calibration,
            grayscale,
        })
    }
}

impl Pending {
    /// The input grayscale page.
    #[must_use]
    pub const fn grayscale(&self) -> &GrayImage {
        &self.grayscale
    }

    /// Run adaptive binarization and advance to [`Binarized`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an invalid block size.
    pub fn binarize(self) -> Result<Binarized, PipelineError> {
        let binary = crate::binarize::adaptive_binarize(
            &self.grayscale,
            self.config.adaptive_block_size,
            self.config.adaptive_c,
            self.config.adaptive_method,
        )?;
        tracing::debug!(
            width = binary.width(),
            height = binary.height(),
            block_size = self.config.adaptive_block_size,
            "binarized page"
        );
        Ok(Binarized {
            config: self.config,
            calibration: self.calibration,
            grayscale: self.grayscale,
            binary,
        })
    }
}

// ───────────────────────── Stage 1: Binarized ────────────────────────

/// Pipeline state after adaptive binarization.
#[must_use = "pipeline stages are consumed by advancing; call .gate() to continue"]
#[derive(Debug)]
pub struct Binarized {
    config: PipelineConfig,
    calibration: Calibration,
    grayscale: GrayImage,
    binary: GrayImage,
}

impl Binarized {
    /// The ink mask (ink = 255).
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// Apply the thickness gate and advance to [`Gated`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for an out-of-range
    /// kernel size.
    pub fn gate(self) -> Result<Gated, PipelineError> {
        let gated = crate::thickness::thickness_gate(
            &self.binary,
            self.config.line_weight_threshold_px,
            self.config.close_kernel_px,
        )?;
        tracing::debug!(
            line_weight_px = self.config.line_weight_threshold_px,
            closed = gated.closed.is_some(),
            "applied thickness gate"
        );
        Ok(Gated {
            config: self.config,
            calibration: self.calibration,
            rasters: Rasters {
                grayscale: self.grayscale,
                binary: self.binary,
                opened: gated.opened,
                closed: gated.closed,
            },
        })
    }
}

// ───────────────────────── Stage 2: Gated ────────────────────────────

/// Pipeline state after the thickness gate (opening and optional
/// closing).
#[must_use = "pipeline stages are consumed by advancing; call .trace() to continue"]
#[derive(Debug)]
pub struct Gated {
    config: PipelineConfig,
    calibration: Calibration,
    rasters: Rasters,
}

impl Gated {
    /// Mask after opening.
    #[must_use]
    pub const fn opened(&self) -> &GrayImage {
        &self.rasters.opened
    }

    /// Mask after closing, if closing ran.
    #[must_use]
    pub const fn closed(&self) -> Option<&GrayImage> {
        self.rasters.closed.as_ref()
    }

    /// The mask contour tracing will run on.
    #[must_use]
    pub fn final_mask(&self) -> &GrayImage {
        self.rasters.final_mask()
    }

    /// Trace external contours and advance to [`Traced`].
    pub fn trace(self) -> Traced {
        let contours = self.config.contour_tracer.trace(self.rasters.final_mask());
        tracing::debug!(contours = contours.len(), "traced external contours");
        Traced {
            config: self.config,
            calibration: self.calibration,
            rasters: self.rasters,
            contours,
        }
    }
}

// ───────────────────────── Stage 3: Traced ───────────────────────────

/// Pipeline state after contour extraction.
#[must_use = "pipeline stages are consumed by advancing; call .build_polygons() to continue"]
#[derive(Debug)]
pub struct Traced {
    config: PipelineConfig,
    calibration: Calibration,
    rasters: Rasters,
    contours: Vec<Contour>,
}

impl Traced {
    /// Traced contours in extraction order.
    #[must_use]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// Convert contours to polygons and advance to [`PolygonsBuilt`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedContour`] when a contour cannot
    /// become a polygon and the policy is
    /// [`Abort`](crate::MalformedContourPolicy::Abort).
    pub fn build_polygons(self) -> Result<PolygonsBuilt, PipelineError> {
        let polygons =
            crate::polygon::build_polygons(&self.contours, self.config.malformed_contour_policy)?;
        Ok(PolygonsBuilt {
            config: self.config,
            calibration: self.calibration,
            rasters: self.rasters,
            contours: self.contours,
            polygons,
            simplified: false,
        })
    }
}

// ───────────────────────── Stage 4: PolygonsBuilt ────────────────────

/// Pipeline state after polygon construction.
#[must_use = "pipeline stages are consumed by advancing; call .simplify() or .filter() to continue"]
#[derive(Debug)]
pub struct PolygonsBuilt {
    config: PipelineConfig,
    calibration: Calibration,
    rasters: Rasters,
    contours: Vec<Contour>,
    polygons: Vec<Polygon>,
    simplified: bool,
}

impl PolygonsBuilt {
    /// Polygons before filtering.
    #[must_use]
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Whether decimation was applied.
    #[must_use]
    pub const fn is_simplified(&self) -> bool {
        self.simplified
    }

    /// Apply optional decimation when `simplify_epsilon_ratio` is set.
    ///
    /// A no-op otherwise, and on polygons that were already decimated.
    /// Vertex counts seen by the filter reflect the decimated polygons.
    pub fn simplify(self) -> Self {
        if self.simplified {
            return self;
        }
        let Some(ratio) = self.config.simplify_epsilon_ratio else {
            return self;
        };
        let polygons = self
            .polygons
            .iter()
            .map(|p| crate::simplify::simplify_by_perimeter_ratio(p, ratio))
            .collect();
        Self {
            polygons,
            simplified: true,
            ..self
        }
    }

    /// Filter candidates and advance to [`Filtered`].
    pub fn filter(self) -> Filtered {
        let (result, tally) = crate::filter::filter_candidates_with_tally(
            &self.polygons,
            &self.calibration,
            &self.config,
        );
        Filtered {
            rasters: self.rasters,
            contours: self.contours,
            polygons: self.polygons,
            result,
            tally,
        }
    }
}

// ───────────────────────── Stage 5: Filtered ─────────────────────────

/// Final pipeline state: accepted candidates and all intermediates.
#[derive(Debug)]
pub struct Filtered {
    rasters: Rasters,
    contours: Vec<Contour>,
    polygons: Vec<Polygon>,
    result: PipelineResult,
    tally: FilterTally,
}

impl Filtered {
    /// Accepted polygons and metrics.
    #[must_use]
    pub const fn result(&self) -> &PipelineResult {
        &self.result
    }

    /// Per-rule rejection counts.
    #[must_use]
    pub const fn tally(&self) -> FilterTally {
        self.tally
    }

    /// Consume the pipeline, returning every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        let dimensions = Dimensions::of(&self.rasters.grayscale);
        StagedResult {
            grayscale: self.rasters.grayscale,
            binary: self.rasters.binary,
            opened: self.rasters.opened,
            closed: self.rasters.closed,
            contours: self.contours,
            polygons: self.polygons,
            result: self.result,
            dimensions,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::contour::ContourTracerKind;
    use crate::types::MalformedContourPolicy;

    /// White page with one heavy-outlined rectangle and one hairline box.
    fn plan_page() -> GrayImage {
        let mut img = GrayImage::from_pixel(200, 160, Luma([255]));
        draw_box(&mut img, 20, 20, 120, 80, 6);
        draw_box(&mut img, 150, 110, 40, 40, 1);
        img
    }

    /// Draw a hollow box outline of the given stroke weight in black.
    fn draw_box(img: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32, stroke: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                let inside = x >= x0 + stroke
                    && x < x0 + w - stroke
                    && y >= y0 + stroke
                    && y < y0 + h - stroke;
                if !inside {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
    }

    fn calibration() -> Calibration {
        Calibration::new(10.0, 1.0).unwrap()
    }

    #[test]
    fn invalid_config_is_rejected_before_binarization() {
        let config = PipelineConfig {
            adaptive_block_size: 10,
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(plan_page(), config, calibration());
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn stages_expose_intermediates() {
        let pending = Pipeline::new(plan_page(), PipelineConfig::default(), calibration()).unwrap();
        assert_eq!(pending.grayscale().dimensions(), (200, 160));

        let binarized = pending.binarize().unwrap();
        // Hairline box pixel is ink before gating.
        assert_eq!(binarized.binary().get_pixel(150, 130).0[0], 255);

        let gated = binarized.gate().unwrap();
        // Hairline is gone after opening; heavy outline survives.
        assert_eq!(gated.opened().get_pixel(150, 130).0[0], 0);
        assert_eq!(gated.opened().get_pixel(22, 50).0[0], 255);
        assert!(gated.closed().is_some());

        let traced = gated.trace();
        assert_eq!(traced.contours().len(), 1);

        let built = traced.build_polygons().unwrap();
        assert_eq!(built.polygons().len(), 1);
        assert!(!built.is_simplified());

        let filtered = built.simplify().filter();
        assert_eq!(filtered.result().len(), 1);
        assert_eq!(filtered.tally().accepted, 1);

        let staged = filtered.into_result();
        assert_eq!(staged.dimensions.width, 200);
        assert_eq!(staged.contours.len(), 1);
        assert_eq!(staged.result.metrics[0].vertex_count, 4);
    }

    #[test]
    fn heavy_outline_measures_its_outer_boundary() {
        let staged = Pipeline::new(plan_page(), PipelineConfig::default(), calibration())
            .unwrap()
            .binarize()
            .unwrap()
            .gate()
            .unwrap()
            .trace()
            .build_polygons()
            .unwrap()
            .filter()
            .into_result();
        let m = staged.result.metrics[0];
        // Outer boundary pixels span 20..=139 by 20..=99: 119 x 79 px.
        assert!((m.area_sqft - 119.0 * 79.0 / 100.0).abs() < 1e-9);
        assert!((m.perimeter_lf - 2.0 * (119.0 + 79.0) / 10.0).abs() < 1e-9);
    }

    #[test]
    fn no_close_kernel_skips_closing() {
        let config = PipelineConfig {
            close_kernel_px: None,
            ..PipelineConfig::default()
        };
        let gated = Pipeline::new(plan_page(), config, calibration())
            .unwrap()
            .binarize()
            .unwrap()
            .gate()
            .unwrap();
        assert!(gated.closed().is_none());
        assert_eq!(gated.final_mask(), gated.opened());
    }

    #[test]
    fn simplify_is_noop_without_ratio() {
        let built = Pipeline::new(plan_page(), PipelineConfig::default(), calibration())
            .unwrap()
            .binarize()
            .unwrap()
            .gate()
            .unwrap()
            .trace()
            .build_polygons()
            .unwrap();
        let before = built.polygons().to_vec();
        let after = built.simplify();
        assert!(!after.is_simplified());
        assert_eq!(after.polygons(), before.as_slice());
    }

    #[test]
    fn simplify_runs_with_ratio() {
        let config = PipelineConfig {
            simplify_epsilon_ratio: Some(0.002),
            malformed_contour_policy: MalformedContourPolicy::Skip,
            ..PipelineConfig::default()
        };
        let built = Pipeline::new(plan_page(), config, calibration())
            .unwrap()
            .binarize()
            .unwrap()
            .gate()
            .unwrap()
            .trace()
            .build_polygons()
            .unwrap()
            .simplify();
        assert!(built.is_simplified());
        assert_eq!(built.polygons()[0].vertex_count(), 4);
    }

    #[test]
    fn simplify_applies_once() {
        let config = PipelineConfig {
            simplify_epsilon_ratio: Some(0.05),
            contour_tracer: ContourTracerKind::ExternalFull,
            ..PipelineConfig::default()
        };
        let once = Pipeline::new(plan_page(), config, calibration())
            .unwrap()
            .binarize()
            .unwrap()
            .gate()
            .unwrap()
            .trace()
            .build_polygons()
            .unwrap()
            .simplify();
        let first = once.polygons().to_vec();
        let twice = once.simplify();
        assert_eq!(twice.polygons(), first.as_slice());
    }

    #[test]
    fn blank_page_yields_empty_result() {
        let page = GrayImage::from_pixel(64, 64, Luma([255]));
        let staged = Pipeline::new(page, PipelineConfig::default(), calibration())
            .unwrap()
            .binarize()
            .unwrap()
            .gate()
            .unwrap()
            .trace()
            .build_polygons()
            .unwrap()
            .filter()
            .into_result();
        assert!(staged.contours.is_empty());
        assert!(staged.result.is_empty());
    }
}
