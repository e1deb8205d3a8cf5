//! Integration test: run a synthetic plan page through the full pipeline
//! and export metrics and overlay artifacts.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{GrayImage, Luma};
use slabtake_pipeline::{Calibration, Dimensions, PipelineConfig, run_pipeline};

/// White page with a heavy slab outline, a heavy column box and hairline
/// dimension work.
fn plan_page() -> GrayImage {
    let mut page = GrayImage::from_pixel(300, 200, Luma([255]));
    draw_box(&mut page, 20, 60, 200, 120, 8);
    draw_box(&mut page, 240, 20, 40, 40, 6);
    // Hairline dimension string across the top.
    for x in 20..220 {
        page.put_pixel(x, 30, Luma([0]));
    }
    page
}

fn draw_box(img: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32, stroke: u32) {
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            let inside =
                x >= x0 + stroke && x < x0 + w - stroke && y >= y0 + stroke && y < y0 + h - stroke;
            if !inside {
                img.put_pixel(x, y, Luma([0]));
            }
        }
    }
}

#[test]
fn synthetic_page_to_csv_and_svg() {
    // 20 px per foot.
    let calibration = Calibration::new(200.0, 10.0).unwrap();
    let config = PipelineConfig::default();
    let page = plan_page();
    let result = run_pipeline(&page, &calibration, &config).expect("pipeline should succeed");

    // Column box first in raster order, then the slab outline.
    assert_eq!(result.len(), 2);
    let column = result.metrics[0];
    let slab = result.metrics[1];
    assert!((column.area_sqft - 39.0 * 39.0 / 400.0).abs() < 1e-9);
    assert!((slab.area_sqft - 199.0 * 119.0 / 400.0).abs() < 1e-9);
    assert!((slab.perimeter_lf - 2.0 * (199.0 + 119.0) / 20.0).abs() < 1e-9);

    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("out").join("sheet-a101").join("metrics.csv");
    slabtake_export::write_metrics_csv(&result.metrics, &csv_path).unwrap();

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "contour_index,area_sqft,perimeter_lf,vertex_count,sanity_score,flagged"
    );
    assert_eq!(lines[2], "1,59.20,31.80,4,0.03,False");

    let config_json = serde_json::to_string(&config).unwrap();
    let svg = slabtake_export::to_svg(
        &result.polygons,
        &result.metrics,
        Dimensions::of(&page),
        &slabtake_export::SvgMetadata {
            title: Some("A-101"),
            config_json: Some(&config_json),
            ..slabtake_export::SvgMetadata::default()
        },
    );
    assert_eq!(svg.matches("<path").count(), 2);
    assert!(svg.contains(r#"viewBox="0 0 300 200""#));
}

#[test]
fn exporting_twice_overwrites() {
    let calibration = Calibration::new(200.0, 10.0).unwrap();
    let page = plan_page();
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("metrics.csv");

    let loose = run_pipeline(&page, &calibration, &PipelineConfig::default()).unwrap();
    slabtake_export::write_metrics_csv(&loose.metrics, &csv_path).unwrap();

    let strict = PipelineConfig {
        min_area_sqft: 10.0,
        ..PipelineConfig::default()
    };
    let strict = run_pipeline(&page, &calibration, &strict).unwrap();
    slabtake_export::write_metrics_csv(&strict.metrics, &csv_path).unwrap();

    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 2);
    assert!(csv.lines().nth(1).unwrap().starts_with("1,59.20,"));
}
