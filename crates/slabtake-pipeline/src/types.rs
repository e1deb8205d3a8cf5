//! Shared types for the slabtake takeoff pipeline.

use serde::{Deserialize, Serialize};

use crate::binarize::AdaptiveMethod;
use crate::contour::ContourTracerKind;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Returns `true` if both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A traced raster boundary: an ordered, implicitly closed sequence of
/// pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a contour from boundary points in traversal order.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of boundary points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the contour and returns the underlying points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }
}

/// Structural defects that prevent a contour from becoming a [`Polygon`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContourDefect {
    /// A closed polygon needs at least three vertices.
    #[error("expected at least 3 points, found {0}")]
    TooFewPoints(usize),

    /// A vertex coordinate is NaN or infinite.
    #[error("point {0} has a non-finite coordinate")]
    NonFiniteCoordinate(usize),
}

/// A closed polygon in pixel space.
///
/// The first vertex implicitly connects to the last; the closing vertex
/// is never stored twice. Construction guarantees at least three finite
/// vertices. Self-intersection is not checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Polygon(Vec<Point>);

impl TryFrom<Vec<Point>> for Polygon {
    type Error = ContourDefect;

    fn try_from(vertices: Vec<Point>) -> Result<Self, Self::Error> {
        Self::try_new(vertices)
    }
}

impl From<Polygon> for Vec<Point> {
    fn from(polygon: Polygon) -> Self {
        polygon.0
    }
}

impl Polygon {
    /// Build a polygon from its vertex sequence.
    ///
    /// # Errors
    ///
    /// Returns [`ContourDefect::TooFewPoints`] for fewer than three
    /// vertices and [`ContourDefect::NonFiniteCoordinate`] if any vertex
    /// is NaN or infinite.
    pub fn try_new(vertices: Vec<Point>) -> Result<Self, ContourDefect> {
        if vertices.len() < 3 {
            return Err(ContourDefect::TooFewPoints(vertices.len()));
        }
        if let Some(i) = vertices.iter().position(|p| !p.is_finite()) {
            return Err(ContourDefect::NonFiniteCoordinate(i));
        }
        Ok(Self(vertices))
    }

    /// Number of vertices (the closing edge adds no vertex).
    #[must_use]
    pub const fn vertex_count(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all vertices.
    #[must_use]
    pub fn vertices(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polygon and returns the underlying vertices.
    #[must_use]
    pub fn into_vertices(self) -> Vec<Point> {
        self.0
    }

    /// Returns `true` if fewer than three vertices are distinct.
    ///
    /// Such a polygon encloses nothing and has no meaningful outline.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        let mut distinct: Vec<Point> = Vec::with_capacity(3);
        for &p in &self.0 {
            if !distinct.contains(&p) {
                distinct.push(p);
                if distinct.len() == 3 {
                    return false;
                }
            }
        }
        true
    }

    /// Unsigned shoelace area in square pixels.
    #[must_use]
    pub fn area_px(&self) -> f64 {
        crate::geometry::shoelace_area(&self.0)
    }

    /// Closed perimeter in pixels, including the closing edge.
    #[must_use]
    pub fn perimeter_px(&self) -> f64 {
        crate::geometry::closed_perimeter(&self.0)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of a grayscale raster.
    #[must_use]
    pub fn of(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

/// What to do when a traced contour cannot be turned into a polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MalformedContourPolicy {
    /// Fail the whole run with [`PipelineError::MalformedContour`].
    #[default]
    Abort,
    /// Drop the offending contour, log a warning, and continue.
    Skip,
}

/// Named line-weight presets for the thickness gate.
///
/// Map to `line_weight_threshold_px` values of 3, 5, and 7 pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineWeightPreset {
    /// Keep fine outlines (3 px).
    Light,
    /// Typical slab edge weight at 600 dpi (5 px).
    #[default]
    Medium,
    /// Only very heavy outlines survive (7 px).
    Heavy,
}

impl LineWeightPreset {
    /// Structuring element side in pixels.
    #[must_use]
    pub const fn kernel_px(self) -> u32 {
        match self {
            Self::Light => 3,
            Self::Medium => 5,
            Self::Heavy => 7,
        }
    }
}

/// Largest structuring element side accepted for morphology.
pub const MAX_KERNEL_PX: u32 = 511;

/// Configuration for the takeoff pipeline.
///
/// Values are plain data; a configuration is replaced rather than
/// mutated between runs. [`validate`](Self::validate) runs before any
/// raster work so bad settings never reach binarization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Resolution the page was rasterized at. Informational for the
    /// pipeline itself; recorded in diagnostics and used by
    /// [`Calibration::from_scale`](crate::Calibration::from_scale).
    pub dpi: u32,

    /// Side of the square neighborhood used for the local threshold.
    /// Must be odd and at least 3.
    pub adaptive_block_size: u32,

    /// Offset subtracted from the local mean. Larger values mark fewer
    /// pixels as ink.
    pub adaptive_c: f64,

    /// How the local mean is weighted.
    pub adaptive_method: AdaptiveMethod,

    /// Side of the square opening element. Line-work thinner than this
    /// is erased.
    pub line_weight_threshold_px: u32,

    /// Side of the square closing element that bridges small gaps.
    /// `None` or `Some(0)` skips the closing step.
    pub close_kernel_px: Option<u32>,

    /// Which contour tracing strategy to use.
    pub contour_tracer: ContourTracerKind,

    /// Optional polygon decimation tolerance as a fraction of each
    /// polygon's pixel perimeter. `None` keeps every traced vertex.
    pub simplify_epsilon_ratio: Option<f64>,

    /// Candidates smaller than this (square feet) are dropped.
    pub min_area_sqft: f64,

    /// Candidates with more vertices than this are dropped.
    pub max_vertex_count: usize,

    /// Pixel perimeter/area ratio above which a candidate is flagged
    /// for review. Flagging never drops a candidate.
    pub sanity_ratio_threshold: f64,

    /// Handling of contours that cannot become polygons.
    pub malformed_contour_policy: MalformedContourPolicy,
}

impl PipelineConfig {
    /// Default rasterization resolution.
    pub const DEFAULT_DPI: u32 = 600;
    /// Default adaptive threshold block size.
    pub const DEFAULT_ADAPTIVE_BLOCK_SIZE: u32 = 35;
    /// Default adaptive threshold offset.
    pub const DEFAULT_ADAPTIVE_C: f64 = 10.0;
    /// Default line weight threshold.
    pub const DEFAULT_LINE_WEIGHT_THRESHOLD_PX: u32 = 5;
    /// Default gap-closing kernel.
    pub const DEFAULT_CLOSE_KERNEL_PX: Option<u32> = Some(3);
    /// Default minimum candidate area.
    pub const DEFAULT_MIN_AREA_SQFT: f64 = 1.0;
    /// Default maximum vertex count.
    pub const DEFAULT_MAX_VERTEX_COUNT: usize = 1000;
    /// Default sanity ratio threshold.
    pub const DEFAULT_SANITY_RATIO_THRESHOLD: f64 = 0.8;

    /// Check every configuration invariant.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated invariant.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.dpi == 0 {
            return Err(PipelineError::InvalidConfig("dpi must be > 0".into()));
        }
        crate::binarize::validate_block_size(self.adaptive_block_size)?;
        if !self.adaptive_c.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "adaptive_c must be finite".into(),
            ));
        }
        crate::thickness::validate_kernel(
            "line_weight_threshold_px",
            self.line_weight_threshold_px,
        )?;
        if let Some(k) = self.close_kernel_px
            && k > 0
        {
            crate::thickness::validate_kernel("close_kernel_px", k)?;
        }
        if let Some(ratio) = self.simplify_epsilon_ratio
            && !(ratio.is_finite() && ratio >= 0.0)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "simplify_epsilon_ratio must be finite and >= 0, got {ratio}"
            )));
        }
        if !(self.min_area_sqft.is_finite() && self.min_area_sqft >= 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "min_area_sqft must be finite and >= 0, got {}",
                self.min_area_sqft
            )));
        }
        if self.max_vertex_count < 3 {
            return Err(PipelineError::InvalidConfig(format!(
                "max_vertex_count must be >= 3, got {}",
                self.max_vertex_count
            )));
        }
        if self.sanity_ratio_threshold.is_nan() || self.sanity_ratio_threshold < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "sanity_ratio_threshold must be >= 0, got {}",
                self.sanity_ratio_threshold
            )));
        }
        Ok(())
    }

    /// Replace the line weight with a named preset.
    #[must_use]
    pub const fn with_line_weight(mut self, preset: LineWeightPreset) -> Self {
        self.line_weight_threshold_px = preset.kernel_px();
        self
    }

    /// The closing kernel, if closing is enabled.
    #[must_use]
    pub fn effective_close_kernel(&self) -> Option<u32> {
        self.close_kernel_px.filter(|&k| k > 0)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: Self::DEFAULT_DPI,
            adaptive_block_size: Self::DEFAULT_ADAPTIVE_BLOCK_SIZE,
            adaptive_c: Self::DEFAULT_ADAPTIVE_C,
            adaptive_method: AdaptiveMethod::default(),
            line_weight_threshold_px: Self::DEFAULT_LINE_WEIGHT_THRESHOLD_PX,
            close_kernel_px: Self::DEFAULT_CLOSE_KERNEL_PX,
            contour_tracer: ContourTracerKind::default(),
            simplify_epsilon_ratio: None,
            min_area_sqft: Self::DEFAULT_MIN_AREA_SQFT,
            max_vertex_count: Self::DEFAULT_MAX_VERTEX_COUNT,
            sanity_ratio_threshold: Self::DEFAULT_SANITY_RATIO_THRESHOLD,
            malformed_contour_policy: MalformedContourPolicy::default(),
        }
    }
}

/// Measurements for one accepted candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetrics {
    /// Position of the source polygon in the filter's input sequence.
    pub contour_index: usize,
    /// Calibrated area in square feet.
    pub area_sqft: f64,
    /// Calibrated perimeter in linear feet.
    pub perimeter_lf: f64,
    /// Number of polygon vertices.
    pub vertex_count: usize,
    /// Raw pixel perimeter/area ratio; `+inf` for zero-area polygons.
    pub sanity_score: f64,
    /// `sanity_score` exceeded the configured threshold. Advisory only.
    pub flagged: bool,
}

/// Accepted polygons and their metrics.
///
/// `polygons[i]` and `metrics[i]` describe the same candidate. Order
/// follows contour extraction, not any geometric sort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Accepted polygons in extraction order.
    pub polygons: Vec<Polygon>,
    /// Metrics, index-aligned with `polygons`.
    pub metrics: Vec<CandidateMetrics>,
}

impl PipelineResult {
    /// Number of accepted candidates.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.polygons.len()
    }

    /// Returns `true` when nothing was accepted.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Iterate accepted candidates as `(polygon, metrics)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Polygon, &CandidateMetrics)> {
        self.polygons.iter().zip(&self.metrics)
    }
}

/// Result of running the pipeline with all intermediate stage outputs
/// preserved.
///
/// Does not derive `Serialize` because `GrayImage` has no serde support;
/// callers that need to persist rasters encode them as PNG themselves.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 0: input grayscale page.
    pub grayscale: GrayImage,
    /// Stage 1: adaptive-threshold ink mask.
    pub binary: GrayImage,
    /// Stage 2: mask after the thickness opening.
    pub opened: GrayImage,
    /// Stage 3: mask after gap closing (`Some` only when closing ran).
    pub closed: Option<GrayImage>,
    /// Stage 4: traced external contours.
    pub contours: Vec<Contour>,
    /// Stage 5: polygons built from the contours, before filtering.
    pub polygons: Vec<Polygon>,
    /// Stage 6: accepted polygons and metrics.
    pub result: PipelineResult,
    /// Source raster dimensions.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// The mask contours were traced from: closed if closing ran,
    /// otherwise opened.
    #[must_use]
    pub fn final_mask(&self) -> &GrayImage {
        self.closed.as_ref().unwrap_or(&self.opened)
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Calibration distances were not strictly positive and finite.
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// A traced contour could not be turned into a polygon.
    #[error("malformed contour {index}: {defect}")]
    MalformedContour {
        /// Position of the contour in extraction order.
        index: usize,
        /// What was wrong with it.
        #[source]
        defect: ContourDefect,
    },

    /// Failed to decode an input page image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,
}
