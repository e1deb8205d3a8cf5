//! slabtake-pipeline: Pure raster takeoff pipeline (sans-IO).
//!
//! Turns a scanned or rendered construction plan page into candidate
//! slab regions with calibrated area and perimeter through:
//! adaptive binarization -> thickness gate -> external contour tracing ->
//! polygon construction -> optional decimation -> candidate filtering.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! rasters and byte slices and returns structured data. File output lives
//! in `slabtake-export` and the command line in `slabtake-cli`.

pub mod binarize;
pub mod calibration;
pub mod contour;
pub mod diagnostics;
pub mod filter;
pub mod geometry;
pub mod grayscale;
pub mod ledger;
pub mod pipeline;
pub mod polygon;
pub mod simplify;
pub mod thickness;
pub mod types;

pub use binarize::AdaptiveMethod;
pub use calibration::Calibration;
pub use contour::{ContourTracer, ContourTracerKind};
pub use geometry::{Geometry, compute_geometry};
pub use ledger::{AcceptedRegion, LedgerTotals, TakeoffLedger};
pub use pipeline::Pipeline;
pub use types::{
    CandidateMetrics, Contour, ContourDefect, Dimensions, GrayImage, LineWeightPreset,
    MalformedContourPolicy, PipelineConfig, PipelineError, PipelineResult, Point, Polygon,
    StagedResult,
};

/// Run the full takeoff pipeline on one grayscale page.
///
/// Rasters are dropped as soon as the next stage has consumed them. Use
/// [`Pipeline`] instead to keep every intermediate.
///
/// # Pipeline steps
///
/// 1. Adaptive binarization (ink = 255)
/// 2. Thickness gate: opening at the line weight, optional closing
/// 3. External contour tracing (pluggable strategy)
/// 4. Polygon construction
/// 5. Optional decimation (Ramer-Douglas-Peucker)
/// 6. Candidate filtering and measurement
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
/// Returns [`PipelineError::MalformedContour`] if a contour cannot become
/// a polygon under the abort policy.
pub fn run_pipeline(
    grayscale: &GrayImage,
    calibration: &Calibration,
    config: &PipelineConfig,
) -> Result<PipelineResult, PipelineError> {
    config.validate()?;

    // 1. Binarize.
    let binary = binarize::adaptive_binarize(
        grayscale,
        config.adaptive_block_size,
        config.adaptive_c,
        config.adaptive_method,
    )?;

    // 2. Thickness gate.
    let mask = thickness::thickness_gate(
        &binary,
        config.line_weight_threshold_px,
        config.close_kernel_px,
    )?
    .into_final();
    drop(binary);

    // 3. Contour tracing.
    let contours = config.contour_tracer.trace(&mask);
    drop(mask);
    tracing::debug!(contours = contours.len(), "traced external contours");

    // 4. Polygon construction.
    let polygons = polygon::build_polygons(&contours, config.malformed_contour_policy)?;

    // 5. Optional decimation.
    let polygons = match config.simplify_epsilon_ratio {
        Some(ratio) => polygons
            .iter()
            .map(|p| simplify::simplify_by_perimeter_ratio(p, ratio))
            .collect(),
        None => polygons,
    };

    // 6. Filter.
    Ok(filter::filter_candidates(&polygons, calibration, config))
}

/// Decode image bytes and run the pipeline on the resulting page.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty,
/// [`PipelineError::ImageDecode`] if the format is unrecognized, and
/// anything [`run_pipeline`] returns.
pub fn process(
    image_bytes: &[u8],
    calibration: &Calibration,
    config: &PipelineConfig,
) -> Result<(PipelineResult, Dimensions), PipelineError> {
    let gray = grayscale::load_grayscale(image_bytes)?;
    let dimensions = Dimensions::of(&gray);
    Ok((run_pipeline(&gray, calibration, config)?, dimensions))
}
