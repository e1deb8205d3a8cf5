//! Calibrated area and perimeter.
//!
//! Area uses the shoelace formula and perimeter sums consecutive edge
//! lengths including the closing edge. Both are computed in pixel space
//! and then scaled by the calibration: area by `feet_per_pixel^2`,
//! perimeter by `feet_per_pixel`.

use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::types::{Point, Polygon};

/// Raw and calibrated measurements of one polygon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Enclosed area in square pixels.
    pub area_px: f64,
    /// Closed perimeter in pixels.
    pub perimeter_px: f64,
    /// Enclosed area in square feet.
    pub area_sqft: f64,
    /// Closed perimeter in linear feet.
    pub perimeter_lf: f64,
}

/// Unsigned shoelace area of a closed vertex ring.
///
/// Winding direction does not matter. Fewer than three points enclose
/// nothing and yield 0.
#[must_use]
pub fn shoelace_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_signed: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x.mul_add(b.y, -(b.x * a.y)))
        .sum();
    twice_signed.abs() / 2.0
}

/// Perimeter of a closed vertex ring, including the closing edge.
#[must_use]
pub fn closed_perimeter(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(&a, &b)| a.distance(b))
        .sum()
}

/// Compute pixel and calibrated geometry for a polygon.
#[must_use]
pub fn compute_geometry(polygon: &Polygon, calibration: &Calibration) -> Geometry {
    let feet_per_pixel = calibration.feet_per_pixel();
    let area_px = polygon.area_px();
    let perimeter_px = polygon.perimeter_px();
    Geometry {
        area_px,
        perimeter_px,
        area_sqft: area_px * feet_per_pixel * feet_per_pixel,
        perimeter_lf: perimeter_px * feet_per_pixel,
    }
}
