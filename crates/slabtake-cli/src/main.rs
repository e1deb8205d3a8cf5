//! slabtake: command-line takeoff runner.
//!
//! Runs the detection pipeline on a pre-rendered plan page with
//! configurable parameters, prints per-stage diagnostics and writes the
//! requested artifacts. Useful for:
//!
//! - Measuring slab outlines on a page without the review UI
//! - Tuning block size, offset and line weight for a plan set
//! - Dumping intermediate masks to see why an outline was missed
//! - Measuring per-stage durations on full-size sheets
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin slabtake -- --pixel-distance 600 --real-distance-feet 4 \
//!     --csv out/metrics.csv [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Set `RUST_LOG=debug` for per-stage events.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use slabtake_pipeline::diagnostics::Clock;
use slabtake_pipeline::{
    AdaptiveMethod, Calibration, ContourTracerKind, LineWeightPreset, MalformedContourPolicy,
    PipelineConfig, StagedResult, TakeoffLedger,
};

/// Detect and measure slab outlines on a rendered construction plan page.
///
/// Calibrate with either two reference measurements
/// (`--pixel-distance` + `--real-distance-feet`) or a drawing scale
/// (`--feet-per-inch`, using `--dpi`).
#[derive(Parser)]
#[command(name = "slabtake", version)]
struct Cli {
    /// Path to the rendered page image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Pixel distance between two calibration points.
    #[arg(long, requires = "real_distance_feet", conflicts_with = "feet_per_inch")]
    pixel_distance: Option<f64>,

    /// Real-world distance in feet between the calibration points.
    #[arg(long, requires = "pixel_distance")]
    real_distance_feet: Option<f64>,

    /// Drawing scale in feet per inch (e.g. 4 for 1/4" = 1'-0").
    #[arg(long)]
    feet_per_inch: Option<f64>,

    /// Resolution the page was rendered at.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DPI)]
    dpi: u32,

    /// Adaptive threshold neighborhood side (odd, >= 3).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_ADAPTIVE_BLOCK_SIZE)]
    adaptive_block_size: u32,

    /// Offset subtracted from the local mean.
    #[arg(
        long,
        default_value_t = PipelineConfig::DEFAULT_ADAPTIVE_C,
        allow_negative_numbers = true
    )]
    adaptive_c: f64,

    /// Local mean weighting.
    #[arg(long, value_enum, default_value_t = Method::Gaussian)]
    adaptive_method: Method,

    /// Minimum line weight in pixels; thinner line-work is removed.
    #[arg(
        long,
        default_value_t = PipelineConfig::DEFAULT_LINE_WEIGHT_THRESHOLD_PX,
        conflicts_with = "line_weight"
    )]
    line_weight_threshold_px: u32,

    /// Named line weight preset (overrides the pixel threshold).
    #[arg(long, value_enum)]
    line_weight: Option<Weight>,

    /// Closing kernel side in pixels (0 disables closing).
    #[arg(long, default_value_t = CLI_DEFAULT_CLOSE_KERNEL, conflicts_with = "no_close")]
    close_kernel_px: u32,

    /// Disable gap closing.
    #[arg(long)]
    no_close: bool,

    /// Contour point density.
    #[arg(long, value_enum, default_value_t = Tracer::Simple)]
    tracer: Tracer,

    /// Decimate polygons with tolerance = ratio * perimeter.
    #[arg(long)]
    simplify_epsilon_ratio: Option<f64>,

    /// Minimum candidate area in square feet.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_AREA_SQFT)]
    min_area_sqft: f64,

    /// Maximum candidate vertex count.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_VERTEX_COUNT)]
    max_vertex_count: usize,

    /// Perimeter/area ratio above which candidates are flagged.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SANITY_RATIO_THRESHOLD)]
    sanity_ratio_threshold: f64,

    /// Drop malformed contours instead of aborting the run.
    #[arg(long)]
    skip_malformed: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Write candidate metrics CSV to file (parent directories are created).
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write an SVG overlay of accepted candidates to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write intermediate rasters as PNGs into this directory.
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Accept every candidate into a JSON takeoff ledger (created if missing).
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Page index recorded in the ledger.
    #[arg(long, default_value_t = 0)]
    page: u32,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,
}

/// Adaptive threshold weighting selection.
#[derive(Clone, Copy, ValueEnum)]
enum Method {
    /// Gaussian-weighted neighborhood mean.
    Gaussian,
    /// Unweighted box mean.
    Mean,
}

/// Line weight preset selection.
#[derive(Clone, Copy, ValueEnum)]
enum Weight {
    /// 3 px.
    Light,
    /// 5 px.
    Medium,
    /// 7 px.
    Heavy,
}

/// Contour tracer selection.
#[derive(Clone, Copy, ValueEnum)]
enum Tracer {
    /// Corner points only.
    Simple,
    /// Every boundary pixel.
    Full,
}

/// The CLI default closing kernel, derived from
/// [`PipelineConfig::DEFAULT_CLOSE_KERNEL_PX`] so the two cannot silently
/// diverge. `0` stands for "no closing".
const CLI_DEFAULT_CLOSE_KERNEL: u32 = match PipelineConfig::DEFAULT_CLOSE_KERNEL_PX {
    Some(k) => k,
    None => 0,
};

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let config = PipelineConfig {
        dpi: cli.dpi,
        adaptive_block_size: cli.adaptive_block_size,
        adaptive_c: cli.adaptive_c,
        adaptive_method: match cli.adaptive_method {
            Method::Gaussian => AdaptiveMethod::Gaussian,
            Method::Mean => AdaptiveMethod::Mean,
        },
        line_weight_threshold_px: cli.line_weight_threshold_px,
        close_kernel_px: if cli.no_close {
            None
        } else {
            Some(cli.close_kernel_px)
        },
        contour_tracer: match cli.tracer {
            Tracer::Simple => ContourTracerKind::ExternalSimple,
            Tracer::Full => ContourTracerKind::ExternalFull,
        },
        simplify_epsilon_ratio: cli.simplify_epsilon_ratio,
        min_area_sqft: cli.min_area_sqft,
        max_vertex_count: cli.max_vertex_count,
        sanity_ratio_threshold: cli.sanity_ratio_threshold,
        malformed_contour_policy: if cli.skip_malformed {
            MalformedContourPolicy::Skip
        } else {
            MalformedContourPolicy::Abort
        },
    };

    Ok(match cli.line_weight {
        Some(Weight::Light) => config.with_line_weight(LineWeightPreset::Light),
        Some(Weight::Medium) => config.with_line_weight(LineWeightPreset::Medium),
        Some(Weight::Heavy) => config.with_line_weight(LineWeightPreset::Heavy),
        None => config,
    })
}

/// Build a [`Calibration`] from CLI arguments.
fn calibration_from_cli(cli: &Cli, config: &PipelineConfig) -> Result<Calibration, String> {
    let calibration = match (cli.pixel_distance, cli.real_distance_feet, cli.feet_per_inch) {
        (Some(px), Some(ft), None) => Calibration::new(px, ft),
        (None, None, Some(scale)) => Calibration::from_scale(config.dpi, scale),
        _ => {
            return Err(
                "Calibration required: pass --pixel-distance and --real-distance-feet, or --feet-per-inch"
                    .to_string(),
            );
        }
    };
    calibration.map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let calibration = match calibration_from_cli(&cli, &config) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let gray = match slabtake_pipeline::grayscale::load_grayscale(&image_bytes) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Error loading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        image = %cli.image_path.display(),
        width = gray.width(),
        height = gray.height(),
        feet_per_pixel = calibration.feet_per_pixel(),
        "loaded page"
    );
    tracing::debug!(?config, "pipeline config");

    let (staged, diagnostics) = match slabtake_pipeline::diagnostics::process_with_diagnostics(
        gray,
        calibration,
        &config,
        &StdClock,
    ) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Pipeline error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing diagnostics: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", diagnostics.report());
    }

    if let Err(msg) = write_artifacts(&cli, &config, &staged) {
        eprintln!("{msg}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Write every artifact requested on the command line.
fn write_artifacts(
    cli: &Cli,
    config: &PipelineConfig,
    staged: &StagedResult,
) -> Result<(), String> {
    let result = &staged.result;

    if let Some(ref csv_path) = cli.csv {
        slabtake_export::write_metrics_csv(&result.metrics, csv_path).map_err(|e| e.to_string())?;
        tracing::info!(path = %csv_path.display(), rows = result.len(), "metrics written");
    }

    if let Some(ref svg_path) = cli.svg {
        let title = cli
            .image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("page");
        let config_json = serde_json::to_string(config).ok();
        let metadata = slabtake_export::SvgMetadata {
            title: Some(title),
            description: Some("slab candidates (red = flagged for review)"),
            config_json: config_json.as_deref(),
        };
        slabtake_export::write_svg(
            &result.polygons,
            &result.metrics,
            staged.dimensions,
            &metadata,
            svg_path,
        )
        .map_err(|e| e.to_string())?;
        tracing::info!(path = %svg_path.display(), "overlay written");
    }

    if let Some(ref dir) = cli.debug_dir {
        write_debug_rasters(dir, staged)?;
    }

    if let Some(ref ledger_path) = cli.ledger {
        update_ledger(ledger_path, cli.page, staged)?;
    }

    Ok(())
}

/// Save each intermediate raster as a numbered PNG.
fn write_debug_rasters(dir: &Path, staged: &StagedResult) -> Result<(), String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("Error creating {}: {e}", dir.display()))?;

    let mut rasters = vec![
        ("01_gray.png", &staged.grayscale),
        ("02_binary.png", &staged.binary),
        ("03_opened.png", &staged.opened),
    ];
    if let Some(ref closed) = staged.closed {
        rasters.push(("04_closed.png", closed));
    }

    for (name, raster) in rasters {
        let path = dir.join(name);
        raster
            .save(&path)
            .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    }
    tracing::info!(dir = %dir.display(), "debug rasters written");
    Ok(())
}

/// Load (or start) a ledger, accept every candidate for `page`, and save.
fn update_ledger(path: &Path, page: u32, staged: &StagedResult) -> Result<(), String> {
    let mut ledger: TakeoffLedger = if path.exists() {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading ledger {}: {e}", path.display()))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("Error parsing ledger {}: {e}", path.display()))?
    } else {
        TakeoffLedger::new()
    };

    for (polygon, metrics) in staged.result.iter() {
        ledger.accept_candidate(page, polygon, metrics);
    }

    let totals = ledger.totals();
    let page_totals = ledger.page_totals(page);
    eprintln!(
        "Ledger: page {page} {:.2} sqft / {:.2} LF; all pages {:.2} sqft / {:.2} LF ({} regions)",
        page_totals.area_sqft,
        page_totals.perimeter_lf,
        totals.area_sqft,
        totals.perimeter_lf,
        ledger.len(),
    );

    let json = serde_json::to_string_pretty(&ledger)
        .map_err(|e| format!("Error serializing ledger: {e}"))?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Error creating {}: {e}", parent.display()))?;
    }
    std::fs::write(path, json).map_err(|e| format!("Error writing ledger {}: {e}", path.display()))
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["slabtake"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_match_pipeline_defaults() {
        let cli = parse(&["page.png", "--feet-per-inch", "4"]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn single_run_per_invocation() {
        let result =
            Cli::try_parse_from(["slabtake", "page.png", "--feet-per-inch", "4", "--runs", "3"]);
        assert!(result.is_err());
    }

    #[test]
    fn no_close_disables_closing() {
        let cli = parse(&["page.png", "--feet-per-inch", "4", "--no-close"]);
        assert_eq!(config_from_cli(&cli).unwrap().close_kernel_px, None);
    }

    #[test]
    fn preset_sets_line_weight() {
        let cli = parse(&["page.png", "--feet-per-inch", "4", "--line-weight", "heavy"]);
        assert_eq!(config_from_cli(&cli).unwrap().line_weight_threshold_px, 7);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "page.png",
            "--feet-per-inch",
            "4",
            "--min-area-sqft",
            "99",
            "--config-json",
            r#"{"min_area_sqft": 2.5}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert!((config.min_area_sqft - 2.5).abs() < f64::EPSILON);
        assert_eq!(config.adaptive_block_size, PipelineConfig::DEFAULT_ADAPTIVE_BLOCK_SIZE);
    }

    #[test]
    fn calibration_from_points() {
        let cli = parse(&["page.png", "--pixel-distance", "100", "--real-distance-feet", "10"]);
        let config = config_from_cli(&cli).unwrap();
        let cal = calibration_from_cli(&cli, &config).unwrap();
        assert!((cal.feet_per_pixel() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn calibration_from_drawing_scale() {
        let cli = parse(&["page.png", "--feet-per-inch", "4", "--dpi", "200"]);
        let config = config_from_cli(&cli).unwrap();
        let cal = calibration_from_cli(&cli, &config).unwrap();
        assert!((cal.feet_per_pixel() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn missing_calibration_is_an_error() {
        let cli = parse(&["page.png"]);
        let config = config_from_cli(&cli).unwrap();
        assert!(calibration_from_cli(&cli, &config).is_err());
    }

    #[test]
    fn zero_real_distance_is_rejected() {
        let cli = parse(&["page.png", "--pixel-distance", "100", "--real-distance-feet", "0"]);
        let config = config_from_cli(&cli).unwrap();
        let err = calibration_from_cli(&cli, &config).unwrap_err();
        assert!(err.contains("calibration"));
    }

    #[test]
    fn conflicting_calibration_flags_are_rejected() {
        let result = Cli::try_parse_from([
            "slabtake",
            "page.png",
            "--pixel-distance",
            "100",
            "--real-distance-feet",
            "10",
            "--feet-per-inch",
            "4",
        ]);
        assert!(result.is_err());
    }
}
