//! Candidate filtering: decide which polygons are worth presenting.
//!
//! Two hard filters drop candidates: a minimum calibrated area (noise,
//! text blobs, arrowheads) and a maximum vertex count (over-complex
//! traces of artwork or hatching). They are checked independently, so
//! either alone is enough to exclude a polygon.
//!
//! A third signal, the sanity score, is the raw pixel perimeter/area
//! ratio. Elongated or ragged shapes score high. It only sets the
//! advisory `flagged` bit for a human reviewer; it never excludes a
//! candidate, because legitimate irregular slabs can score high too.

use crate::calibration::Calibration;
use crate::geometry::compute_geometry;
use crate::types::{CandidateMetrics, PipelineConfig, PipelineResult, Polygon};

/// Pixel-space perimeter/area ratio.
///
/// Returns `+inf` for zero-area polygons. Uses raw pixel units, so the
/// score does not depend on calibration.
#[must_use]
pub fn sanity_score(polygon: &Polygon) -> f64 {
    perimeter_area_ratio(polygon.perimeter_px(), polygon.area_px())
}

fn perimeter_area_ratio(perimeter_px: f64, area_px: f64) -> f64 {
    if area_px == 0.0 {
        f64::INFINITY
    } else {
        perimeter_px / area_px
    }
}

/// Why a candidate was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Fewer than three distinct vertices.
    Degenerate,
    /// Calibrated area below `min_area_sqft`.
    TooSmall,
    /// More vertices than `max_vertex_count`.
    TooComplex,
}

/// Evaluate one polygon.
///
/// Returns its metrics when accepted, or the first rule it failed.
///
/// # Errors
///
/// Returns the [`Rejection`] reason when the polygon is excluded.
pub fn evaluate(
    polygon: &Polygon,
    contour_index: usize,
    calibration: &Calibration,
    config: &PipelineConfig,
) -> Result<CandidateMetrics, Rejection> {
    if polygon.is_degenerate() {
        return Err(Rejection::Degenerate);
    }

    let geometry = compute_geometry(polygon, calibration);
    let vertex_count = polygon.vertex_count();
    let score = perimeter_area_ratio(geometry.perimeter_px, geometry.area_px);
    let flagged = score > config.sanity_ratio_threshold;

    if geometry.area_sqft < config.min_area_sqft {
        return Err(Rejection::TooSmall);
    }
    if vertex_count > config.max_vertex_count {
        return Err(Rejection::TooComplex);
    }

    Ok(CandidateMetrics {
        contour_index,
        area_sqft: geometry.area_sqft,
        perimeter_lf: geometry.perimeter_lf,
        vertex_count,
        sanity_score: score,
        flagged,
    })
}

/// Rejection counts from one filtering pass, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterTally {
    /// Polygons examined.
    pub examined: usize,
    /// Polygons accepted.
    pub accepted: usize,
    /// Accepted polygons with the advisory flag set.
    pub flagged: usize,
    /// Dropped as degenerate.
    pub degenerate: usize,
    /// Dropped by the minimum area rule.
    pub too_small: usize,
    /// Dropped by the vertex count rule.
    pub too_complex: usize,
}

/// Filter polygons, keeping accepted polygons and metrics index-aligned.
///
/// `contour_index` in each metric is the polygon's position in
/// `polygons`. Accepted candidates keep their input order.
#[must_use]
pub fn filter_candidates(
    polygons: &[Polygon],
    calibration: &Calibration,
    config: &PipelineConfig,
) -> PipelineResult {
    filter_candidates_with_tally(polygons, calibration, config).0
}

/// Like [`filter_candidates`], also reporting why candidates were dropped.
#[must_use]
pub fn filter_candidates_with_tally(
    polygons: &[Polygon],
    calibration: &Calibration,
    config: &PipelineConfig,
) -> (PipelineResult, FilterTally) {
    let mut result = PipelineResult::default();
    let mut tally = FilterTally {
        examined: polygons.len(),
        ..FilterTally::default()
    };

    for (index, polygon) in polygons.iter().enumerate() {
        match evaluate(polygon, index, calibration, config) {
            Ok(metrics) => {
                tally.accepted += 1;
                if metrics.flagged {
                    tally.flagged += 1;
                }
                result.polygons.push(polygon.clone());
                result.metrics.push(metrics);
            }
            Err(Rejection::Degenerate) => tally.degenerate += 1,
            Err(Rejection::TooSmall) => tally.too_small += 1,
            Err(Rejection::TooComplex) => tally.too_complex += 1,
        }
    }

    tracing::debug!(
        examined = tally.examined,
        accepted = tally.accepted,
        flagged = tally.flagged,
        too_small = tally.too_small,
        too_complex = tally.too_complex,
        degenerate = tally.degenerate,
        "filtered candidates"
    );

    (result, tally)
}
