//! Pixel-to-feet calibration.
//!
//! A [`Calibration`] is derived from two reference points picked on the
//! plan and the real-world distance between them. It is an immutable
//! value: recalibrating a page means building a new one.

use serde::{Deserialize, Serialize};

use crate::types::{PipelineError, Point};

/// Inches per foot, for scale-based calibration.
const INCHES_PER_FOOT: f64 = 12.0;

/// Feet-per-pixel scale for one rasterized page.
///
/// Both distances are validated on construction, so every
/// `Calibration` in existence has a finite, strictly positive
/// [`feet_per_pixel`](Self::feet_per_pixel).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CalibrationFields")]
pub struct Calibration {
    pixel_distance: f64,
    real_distance_feet: f64,
}

/// Unvalidated wire form used by `Deserialize`.
#[derive(Deserialize)]
struct CalibrationFields {
    pixel_distance: f64,
    real_distance_feet: f64,
}

impl TryFrom<CalibrationFields> for Calibration {
    type Error = PipelineError;

    fn try_from(fields: CalibrationFields) -> Result<Self, Self::Error> {
        Self::new(fields.pixel_distance, fields.real_distance_feet)
    }
}

impl Calibration {
    /// Build a calibration from a measured pixel distance and the known
    /// real-world distance in feet.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidCalibration`] if either distance
    /// is zero, negative, or not finite.
    pub fn new(pixel_distance: f64, real_distance_feet: f64) -> Result<Self, PipelineError> {
        if !(pixel_distance.is_finite() && pixel_distance > 0.0) {
            return Err(PipelineError::InvalidCalibration(format!(
                "pixel_distance must be > 0, got {pixel_distance}"
            )));
        }
        if !(real_distance_feet.is_finite() && real_distance_feet > 0.0) {
            return Err(PipelineError::InvalidCalibration(format!(
                "real_distance_feet must be > 0, got {real_distance_feet}"
            )));
        }
        Ok(Self {
            pixel_distance,
            real_distance_feet,
        })
    }

    /// Build a calibration from two reference points and the real-world
    /// distance between them.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidCalibration`] if the points
    /// coincide or `real_distance_feet` is not strictly positive.
    pub fn from_points(a: Point, b: Point, real_distance_feet: f64) -> Result<Self, PipelineError> {
        Self::new(a.distance(b), real_distance_feet)
    }

    /// Build a calibration from a printed drawing scale.
    ///
    /// `feet_per_inch` is the drawing scale expressed as real feet per
    /// printed inch: 1/4" = 1'-0" is `4.0`, 1" = 20' is `20.0`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidCalibration`] if `dpi` is zero or
    /// `feet_per_inch` is not strictly positive.
    pub fn from_scale(dpi: u32, feet_per_inch: f64) -> Result<Self, PipelineError> {
        // One printed inch spans `dpi` pixels.
        Self::new(f64::from(dpi), feet_per_inch)
    }

    /// Distance between the reference points in pixels.
    #[must_use]
    pub const fn pixel_distance(&self) -> f64 {
        self.pixel_distance
    }

    /// Real-world distance between the reference points in feet.
    #[must_use]
    pub const fn real_distance_feet(&self) -> f64 {
        self.real_distance_feet
    }

    /// Real-world feet covered by one pixel.
    #[must_use]
    pub fn feet_per_pixel(&self) -> f64 {
        self.real_distance_feet / self.pixel_distance
    }

    /// Real-world inches covered by one pixel.
    #[must_use]
    pub fn inches_per_pixel(&self) -> f64 {
        self.feet_per_pixel() * INCHES_PER_FOOT
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn feet_per_pixel_is_ratio() {
        let cal = Calibration::new(100.0, 10.0).unwrap();
        assert!((cal.feet_per_pixel() - 0.1).abs() < 1e-12);
        assert!((cal.inches_per_pixel() - 1.2).abs() < 1e-12);
    }

    #[test]
    fn zero_pixel_distance_is_rejected() {
        let result = Calibration::new(0.0, 10.0);
        assert!(matches!(result, Err(PipelineError::InvalidCalibration(_))));
    }

    #[test]
    fn negative_pixel_distance_is_rejected() {
        let result = Calibration::new(-5.0, 10.0);
        assert!(matches!(result, Err(PipelineError::InvalidCalibration(_))));
    }

    #[test]
    fn zero_real_distance_is_rejected() {
        let result = Calibration::new(100.0, 0.0);
        assert!(matches!(result, Err(PipelineError::InvalidCalibration(_))));
    }

    #[test]
    fn negative_real_distance_is_rejected() {
        let result = Calibration::new(100.0, -3.0);
        assert!(matches!(result, Err(PipelineError::InvalidCalibration(_))));
    }

    #[test]
    fn non_finite_distances_are_rejected() {
        assert!(Calibration::new(f64::NAN, 1.0).is_err());
        assert!(Calibration::new(1.0, f64::INFINITY).is_err());
    }

    #[test]
    fn from_points_uses_euclidean_distance() {
        let cal =
            Calibration::from_points(Point::new(10.0, 10.0), Point::new(40.0, 50.0), 25.0).unwrap();
        assert!((cal.pixel_distance() - 50.0).abs() < 1e-12);
        assert!((cal.feet_per_pixel() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn identical_click_points_are_rejected() {
        let p = Point::new(12.0, 34.0);
        let result = Calibration::from_points(p, p, 10.0);
        assert!(matches!(result, Err(PipelineError::InvalidCalibration(_))));
    }

    #[test]
    fn quarter_inch_scale_at_600_dpi() {
        // 1/4" = 1'-0" means one printed inch is four feet.
        let cal = Calibration::from_scale(600, 4.0).unwrap();
        assert!((cal.feet_per_pixel() - 4.0 / 600.0).abs() < 1e-12);
    }

    #[test]
    fn zero_dpi_scale_is_rejected() {
        assert!(Calibration::from_scale(0, 4.0).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let ok: Calibration =
            serde_json::from_str(r#"{"pixel_distance": 200.0, "real_distance_feet": 5.0}"#)
                .unwrap();
        assert!((ok.feet_per_pixel() - 0.025).abs() < 1e-12);

        let bad: Result<Calibration, _> =
            serde_json::from_str(r#"{"pixel_distance": 0.0, "real_distance_feet": 5.0}"#);
        assert!(bad.is_err());
    }
}
