//! Contour extraction: trace external boundaries in a binary mask.
//!
//! This module defines the [`ContourTracer`] trait for pluggable tracing
//! strategies and the [`ContourTracerKind`] enum for selecting one at
//! runtime. Both strategies run Suzuki-Abe border following via
//! `imageproc::contours::find_contours` and keep only outermost outer
//! borders: holes and anything nested inside another region are not
//! reported. They differ in how the boundary chain is stored.
//!
//! Contours come out in the tracer's raster-scan order (the order in
//! which each border's first pixel is met scanning rows top to bottom).
//! That order is deterministic for a given mask but is not a geometric
//! sort.

use image::GrayImage;
use imageproc::contours::BorderType;
use serde::{Deserialize, Serialize};

use crate::types::{Contour, Point};

/// Selects how traced boundary chains are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContourTracerKind {
    /// Keep only the endpoints of horizontal, vertical, and diagonal
    /// runs. An axis-aligned rectangle traces to its four corners.
    #[default]
    ExternalSimple,
    /// Keep every boundary pixel.
    ExternalFull,
}

/// Trait for contour tracing strategies.
///
/// Input: a binary mask (non-zero pixels = ink).
/// Output: one closed contour per external boundary.
pub trait ContourTracer {
    /// Trace external contours in the given mask.
    fn trace(&self, mask: &GrayImage) -> Vec<Contour>;
}

impl ContourTracer for ContourTracerKind {
    fn trace(&self, mask: &GrayImage) -> Vec<Contour> {
        let chains = trace_external(mask);
        match *self {
            Self::ExternalFull => chains.into_iter().map(Contour::new).collect(),
            Self::ExternalSimple => chains
                .into_iter()
                .map(|chain| Contour::new(compress_runs(&chain)))
                .collect(),
        }
    }
}

/// Outermost outer borders as full pixel chains.
fn trace_external(mask: &GrayImage) -> Vec<Vec<Point>> {
    let contours: Vec<imageproc::contours::Contour<u32>> =
        imageproc::contours::find_contours(mask);

    contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| {
            c.points
                .into_iter()
                .map(|p| Point::new(f64::from(p.x), f64::from(p.y)))
                .collect()
        })
        .collect()
}

/// Unit step direction between two chain points.
fn step(from: Point, to: Point) -> (i8, i8) {
    fn sign(v: f64) -> i8 {
        if v > 0.0 {
            1
        } else if v < 0.0 {
            -1
        } else {
            0
        }
    }
    (sign(to.x - from.x), sign(to.y - from.y))
}

/// Drop chain points that sit in the middle of a straight run.
///
/// A point is kept when the direction arriving at it differs from the
/// direction leaving it, treating the chain as a closed ring. Chains of
/// fewer than three points are returned unchanged.
#[must_use]
pub fn compress_runs(chain: &[Point]) -> Vec<Point> {
    let n = chain.len();
    if n < 3 {
        return chain.to_vec();
    }

    let kept: Vec<Point> = (0..n)
        .filter(|&i| {
            let prev = chain[(i + n - 1) % n];
            let next = chain[(i + 1) % n];
            step(prev, chain[i]) != step(chain[i], next)
        })
        .map(|i| chain[i])
        .collect();

    if kept.is_empty() {
        // Every step identical cannot close a ring; keep the input.
        chain.to_vec()
    } else {
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_rect(img: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                img.put_pixel(x, y, image::Luma([255]));
            }
        }
    }

    fn bounds(contour: &Contour) -> (f64, f64, f64, f64) {
        let pts = contour.points();
        let min_x = pts.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = pts.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_x = pts.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = pts.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        (min_x, min_y, max_x, max_y)
    }

    #[test]
    fn default_is_external_simple() {
        assert_eq!(
            ContourTracerKind::default(),
            ContourTracerKind::ExternalSimple
        );
    }

    #[test]
    fn empty_mask_produces_no_contours() {
        let img = GrayImage::new(10, 10);
        assert!(ContourTracerKind::ExternalSimple.trace(&img).is_empty());
        assert!(ContourTracerKind::ExternalFull.trace(&img).is_empty());
    }

    #[test]
    fn filled_rectangle_traces_to_four_corners() {
        let mut img = GrayImage::new(30, 20);
        fill_rect(&mut img, 5, 4, 12, 8);
        let contours = ContourTracerKind::ExternalSimple.trace(&img);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].len(), 4);
        assert_eq!(bounds(&contours[0]), (5.0, 4.0, 16.0, 11.0));
    }

    #[test]
    fn full_chain_keeps_every_boundary_pixel() {
        let mut img = GrayImage::new(30, 20);
        fill_rect(&mut img, 5, 4, 12, 8);
        let contours = ContourTracerKind::ExternalFull.trace(&img);
        assert_eq!(contours.len(), 1);
        // Perimeter pixels of a 12x8 block: 2 * (12 + 8) - 4.
        assert_eq!(contours[0].len(), 36);
    }

    #[test]
    fn holes_are_not_reported() {
        // A ring: 20x20 block with a 10x10 hole.
        let mut img = GrayImage::new(30, 30);
        fill_rect(&mut img, 5, 5, 20, 20);
        for y in 10..20 {
            for x in 10..20 {
                img.put_pixel(x, y, image::Luma([0]));
            }
        }
        let contours = ContourTracerKind::ExternalSimple.trace(&img);
        assert_eq!(contours.len(), 1);
        assert_eq!(bounds(&contours[0]), (5.0, 5.0, 24.0, 24.0));
    }

    #[test]
    fn islands_inside_holes_are_not_reported() {
        let mut img = GrayImage::new(40, 40);
        fill_rect(&mut img, 5, 5, 30, 30);
        for y in 10..30 {
            for x in 10..30 {
                img.put_pixel(x, y, image::Luma([0]));
            }
        }
        // Island inside the hole.
        fill_rect(&mut img, 17, 17, 5, 5);
        let contours = ContourTracerKind::ExternalSimple.trace(&img);
        assert_eq!(contours.len(), 1);
    }

    #[test]
    fn separate_regions_follow_raster_order() {
        let mut img = GrayImage::new(60, 60);
        // Lower-left region is larger but starts on a later row.
        fill_rect(&mut img, 2, 30, 25, 25);
        fill_rect(&mut img, 40, 5, 8, 8);
        let contours = ContourTracerKind::ExternalSimple.trace(&img);
        assert_eq!(contours.len(), 2);
        assert_eq!(bounds(&contours[0]), (40.0, 5.0, 47.0, 12.0));
        assert_eq!(bounds(&contours[1]), (2.0, 30.0, 26.0, 54.0));
    }

    #[test]
    fn tracing_is_deterministic() {
        let mut img = GrayImage::new(50, 50);
        fill_rect(&mut img, 3, 3, 10, 10);
        fill_rect(&mut img, 20, 8, 15, 6);
        fill_rect(&mut img, 8, 30, 30, 12);
        let first = ContourTracerKind::ExternalSimple.trace(&img);
        let second = ContourTracerKind::ExternalSimple.trace(&img);
        assert_eq!(first, second);
    }

    #[test]
    fn compress_runs_keeps_corners_only() {
        let chain = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(1.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(0.0, 1.0),
        ];
        let compressed = compress_runs(&chain);
        assert_eq!(
            compressed,
            vec![
                Point::new(0.0, 0.0),
                Point::new(2.0, 0.0),
                Point::new(2.0, 2.0),
                Point::new(0.0, 2.0),
            ]
        );
    }

    #[test]
    fn compress_runs_keeps_diagonal_endpoints() {
        // Right triangle with a diagonal hypotenuse.
        let chain = vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
            Point::new(1.0, 2.0),
            Point::new(0.0, 2.0),
            Point::new(0.0, 1.0),
        ];
        let compressed = compress_runs(&chain);
        assert_eq!(
            compressed,
            vec![
                Point::new(0.0, 0.0),
                Point::new(2.0, 2.0),
                Point::new(0.0, 2.0),
            ]
        );
    }

    #[test]
    fn compress_runs_leaves_short_chains() {
        let chain = vec![Point::new(3.0, 3.0)];
        assert_eq!(compress_runs(&chain), chain);
    }
}
