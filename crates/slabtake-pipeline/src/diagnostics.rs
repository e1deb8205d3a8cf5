//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning on real plan sets. [`process_with_diagnostics`]
//! drives the staged [`Pipeline`](crate::Pipeline) and collects one
//! [`StageDiagnostics`] per stage alongside the results.
//!
//! Time is read through the [`Clock`] trait. The CLI supplies a
//! `std::time::Instant` backed clock; tests supply a fake one.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::binarize::{AdaptiveMethod, INK};
use crate::calibration::Calibration;
use crate::pipeline::Pipeline;
use crate::types::{Contour, GrayImage, PipelineConfig, PipelineError, Polygon, StagedResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of monotonic time for stage measurements.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// Current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
///
/// Each field captures metrics for one logical stage of the pipeline.
/// Stages that are conditionally skipped (closing, simplification) have
/// `Option` fields that are `None` when the stage was not executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: adaptive binarization.
    pub binarize: StageDiagnostics,
    /// Stage 2: thickness gate (opening, plus closing when enabled).
    pub thickness_gate: StageDiagnostics,
    /// Stage 3: external contour tracing.
    pub contour_tracing: StageDiagnostics,
    /// Stage 4: polygon construction.
    pub polygon_build: StageDiagnostics,
    /// Stage 5: decimation (only when `simplify_epsilon_ratio` is set).
    pub simplification: Option<StageDiagnostics>,
    /// Stage 6: candidate filtering.
    pub filter: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Adaptive binarization metrics.
    Binarize {
        /// Neighborhood side length in pixels.
        block_size: u32,
        /// Offset subtracted from the local mean.
        c: f64,
        /// Local mean weighting.
        method: AdaptiveMethod,
        /// Ink pixels in the output mask.
        ink_pixel_count: u64,
        /// Total pixel count for computing ink density.
        total_pixel_count: u64,
    },
    /// Thickness gate metrics.
    ThicknessGate {
        /// Opening kernel side in pixels.
        line_weight_px: u32,
        /// Closing kernel side, when closing ran.
        close_kernel_px: Option<u32>,
        /// Ink pixels entering the gate.
        ink_before: u64,
        /// Ink pixels after opening.
        ink_after_open: u64,
        /// Ink pixels after closing (equal to `ink_after_open` when
        /// closing is disabled).
        ink_after_close: u64,
    },
    /// Contour tracing metrics.
    ContourTracing {
        /// Number of contours found.
        contour_count: usize,
        /// Total number of points across all contours.
        total_point_count: usize,
        /// Minimum points in any single contour.
        min_contour_points: usize,
        /// Maximum points in any single contour.
        max_contour_points: usize,
        /// Mean points per contour.
        mean_contour_points: f64,
    },
    /// Polygon construction metrics.
    PolygonBuild {
        /// Polygons produced.
        polygon_count: usize,
        /// Malformed contours dropped under the skip policy.
        skipped: usize,
    },
    /// Decimation metrics.
    Simplification {
        /// Tolerance as a fraction of each polygon's perimeter.
        epsilon_ratio: f64,
        /// Total vertices before decimation.
        points_before: usize,
        /// Total vertices after decimation.
        points_after: usize,
        /// Reduction ratio: `1.0 - (after / before)`.
        reduction_ratio: f64,
    },
    /// Candidate filter metrics.
    Filter {
        /// Polygons examined.
        examined: usize,
        /// Polygons accepted.
        accepted: usize,
        /// Accepted polygons carrying the advisory flag.
        flagged: usize,
        /// Dropped by the minimum area rule.
        too_small: usize,
        /// Dropped by the vertex count rule.
        too_complex: usize,
        /// Dropped as degenerate.
        degenerate: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of contours found.
    pub contour_count: usize,
    /// Number of accepted candidates.
    pub accepted_count: usize,
    /// Sum of accepted areas in square feet.
    pub total_area_sqft: f64,
    /// Sum of accepted perimeters in linear feet.
    pub total_perimeter_lf: f64,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        let mut stages: Vec<(&str, &StageDiagnostics)> = vec![
            ("Binarize", &self.binarize),
            ("Thickness Gate", &self.thickness_gate),
            ("Contour Tracing", &self.contour_tracing),
            ("Polygon Build", &self.polygon_build),
        ];
        if let Some(ref s) = self.simplification {
            stages.push(("Simplification", s));
        }
        stages.push(("Filter", &self.filter));

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Contours: {}  |  Accepted: {}  |  Area: {:.2} sqft  |  Perimeter: {:.2} LF",
            self.summary.contour_count,
            self.summary.accepted_count,
            self.summary.total_area_sqft,
            self.summary.total_perimeter_lf,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[allow(clippy::cast_precision_loss)]
fn percent(part: u64, whole: u64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Binarize {
            block_size,
            c,
            method,
            ink_pixel_count,
            total_pixel_count,
        } => {
            let density = percent(*ink_pixel_count, *total_pixel_count);
            format!("{method:?} block={block_size} c={c:.1} ink={ink_pixel_count} ({density:.1}%)")
        }
        StageMetrics::ThicknessGate {
            line_weight_px,
            close_kernel_px,
            ink_before,
            ink_after_open,
            ink_after_close,
        } => {
            let close = close_kernel_px.map_or_else(|| "off".to_string(), |k| k.to_string());
            format!(
                "open={line_weight_px} close={close} ink {ink_before}->{ink_after_open}->{ink_after_close}"
            )
        }
        StageMetrics::ContourTracing {
            contour_count,
            total_point_count,
            min_contour_points,
            max_contour_points,
            mean_contour_points,
        } => {
            format!(
                "{contour_count} contours, {total_point_count} pts (min={min_contour_points} max={max_contour_points} mean={mean_contour_points:.1})",
            )
        }
        StageMetrics::PolygonBuild {
            polygon_count,
            skipped,
        } => format!("{polygon_count} polygons, {skipped} skipped"),
        StageMetrics::Simplification {
            epsilon_ratio,
            points_before,
            points_after,
            reduction_ratio,
        } => {
            format!(
                "eps={epsilon_ratio:.4} {points_before}->{points_after} pts ({:.1}% reduction)",
                reduction_ratio * 100.0,
            )
        }
        StageMetrics::Filter {
            examined,
            accepted,
            flagged,
            too_small,
            too_complex,
            degenerate,
        } => {
            format!(
                "{accepted}/{examined} accepted ({flagged} flagged), dropped: small={too_small} complex={too_complex} degenerate={degenerate}",
            )
        }
    }
}

/// Count ink pixels (value == 255) in a mask.
pub(crate) fn count_ink_pixels(image: &GrayImage) -> u64 {
    image
        .pixels()
        .map(|p| u64::from(u8::from(p.0[0] == INK)))
        .sum()
}

/// Statistics for a set of traced contours.
pub(crate) struct ContourStats {
    /// Total number of points across all contours.
    pub total: usize,
    /// Minimum number of points in any single contour.
    pub min: usize,
    /// Maximum number of points in any single contour.
    pub max: usize,
    /// Mean number of points per contour.
    pub mean: f64,
}

/// Compute contour statistics.
pub(crate) fn contour_stats(contours: &[Contour]) -> ContourStats {
    let total: usize = contours.iter().map(Contour::len).sum();
    let min = contours.iter().map(Contour::len).min().unwrap_or(0);
    let max = contours.iter().map(Contour::len).max().unwrap_or(0);
    #[allow(clippy::cast_precision_loss)]
    let mean = if contours.is_empty() {
        0.0
    } else {
        total as f64 / contours.len() as f64
    };
    ContourStats {
        total,
        min,
        max,
        mean,
    }
}

/// Total vertices across a slice of polygons.
pub(crate) fn total_vertices(polygons: &[Polygon]) -> usize {
    polygons.iter().map(Polygon::vertex_count).sum()
}

/// Run the staged pipeline, timing each stage with `clock`.
///
/// Produces the same [`StagedResult`] as driving [`Pipeline`] by hand,
/// plus per-stage diagnostics.
///
/// # Errors
///
/// Propagates any [`PipelineError`] raised by a stage.
pub fn process_with_diagnostics<C: Clock>(
    grayscale: GrayImage,
    calibration: Calibration,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(StagedResult, PipelineDiagnostics), PipelineError> {
    let run_start = clock.now();
    let (width, height) = grayscale.dimensions();
    let pixel_count = u64::from(width) * u64::from(height);

    // Stage 1: binarize.
    let start = clock.now();
    let binarized = Pipeline::new(grayscale, config.clone(), calibration)?.binarize()?;
    let ink_before = count_ink_pixels(binarized.binary());
    let binarize = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Binarize {
            block_size: config.adaptive_block_size,
            c: config.adaptive_c,
            method: config.adaptive_method,
            ink_pixel_count: ink_before,
            total_pixel_count: pixel_count,
        },
    };

    // Stage 2: thickness gate.
    let start = clock.now();
    let gated = binarized.gate()?;
    let duration = clock.elapsed(&start);
    let ink_after_open = count_ink_pixels(gated.opened());
    let thickness_gate = StageDiagnostics {
        duration,
        metrics: StageMetrics::ThicknessGate {
            line_weight_px: config.line_weight_threshold_px,
            close_kernel_px: config.effective_close_kernel(),
            ink_before,
            ink_after_open,
            ink_after_close: gated.closed().map_or(ink_after_open, count_ink_pixels),
        },
    };

    // Stage 3: contour tracing.
    let start = clock.now();
    let traced = gated.trace();
    let duration = clock.elapsed(&start);
    let stats = contour_stats(traced.contours());
    let contour_count = traced.contours().len();
    let contour_tracing = StageDiagnostics {
        duration,
        metrics: StageMetrics::ContourTracing {
            contour_count,
            total_point_count: stats.total,
            min_contour_points: stats.min,
            max_contour_points: stats.max,
            mean_contour_points: stats.mean,
        },
    };

    // Stage 4: polygon construction.
    let start = clock.now();
    let built = traced.build_polygons()?;
    let polygon_build = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::PolygonBuild {
            polygon_count: built.polygons().len(),
            skipped: contour_count - built.polygons().len(),
        },
    };

    // Stage 5: simplification (optional).
    let (built, simplification) = match config.simplify_epsilon_ratio {
        Some(epsilon_ratio) => {
            let points_before = total_vertices(built.polygons());
            let start = clock.now();
            let built = built.simplify();
            let duration = clock.elapsed(&start);
            let points_after = total_vertices(built.polygons());
            #[allow(clippy::cast_precision_loss)]
            let reduction_ratio = if points_before > 0 {
                1.0 - (points_after as f64 / points_before as f64)
            } else {
                0.0
            };
            let diag = StageDiagnostics {
                duration,
                metrics: StageMetrics::Simplification {
                    epsilon_ratio,
                    points_before,
                    points_after,
                    reduction_ratio,
                },
            };
            (built, Some(diag))
        }
        None => (built, None),
    };

    // Stage 6: filter.
    let start = clock.now();
    let filtered = built.filter();
    let duration = clock.elapsed(&start);
    let tally = filtered.tally();
    let filter = StageDiagnostics {
        duration,
        metrics: StageMetrics::Filter {
            examined: tally.examined,
            accepted: tally.accepted,
            flagged: tally.flagged,
            too_small: tally.too_small,
            too_complex: tally.too_complex,
            degenerate: tally.degenerate,
        },
    };

    let staged = filtered.into_result();
    let summary = PipelineSummary {
        image_width: width,
        image_height: height,
        pixel_count,
        contour_count,
        accepted_count: staged.result.len(),
        total_area_sqft: staged.result.metrics.iter().map(|m| m.area_sqft).sum(),
        total_perimeter_lf: staged.result.metrics.iter().map(|m| m.perimeter_lf).sum(),
    };

    let diagnostics = PipelineDiagnostics {
        binarize,
        thickness_gate,
        contour_tracing,
        polygon_build,
        simplification,
        filter,
        total_duration: clock.elapsed(&run_start),
        summary,
    };

    Ok((staged, diagnostics))
}
