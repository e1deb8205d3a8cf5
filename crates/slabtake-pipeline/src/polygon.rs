//! Polygon construction from traced contours.
//!
//! A contour's boundary points are taken verbatim as the vertex list of
//! a closed polygon. No simplification happens here; see
//! [`crate::simplify`] for optional decimation.

use crate::types::{Contour, MalformedContourPolicy, PipelineError, Polygon};

/// Convert one traced contour into a polygon.
///
/// `index` is the contour's position in extraction order and is carried
/// into the error so callers can tell which boundary was bad.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedContour`] if the contour has fewer
/// than three points or a non-finite coordinate.
pub fn contour_to_polygon(contour: &Contour, index: usize) -> Result<Polygon, PipelineError> {
    Polygon::try_new(contour.points().to_vec())
        .map_err(|defect| PipelineError::MalformedContour { index, defect })
}

/// Convert every contour, applying `policy` to malformed ones.
///
/// With [`MalformedContourPolicy::Abort`] the first malformed contour
/// ends the run. With [`MalformedContourPolicy::Skip`] it is dropped
/// and the remaining contours keep their relative order.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedContour`] under the `Abort` policy.
pub fn build_polygons(
    contours: &[Contour],
    policy: MalformedContourPolicy,
) -> Result<Vec<Polygon>, PipelineError> {
    let mut polygons = Vec::with_capacity(contours.len());
    for (index, contour) in contours.iter().enumerate() {
        match contour_to_polygon(contour, index) {
            Ok(polygon) => polygons.push(polygon),
            Err(err) => match policy {
                MalformedContourPolicy::Abort => return Err(err),
                MalformedContourPolicy::Skip => {
                    tracing::warn!(index, error = %err, "skipping malformed contour");
                }
            },
        }
    }
    Ok(polygons)
}
