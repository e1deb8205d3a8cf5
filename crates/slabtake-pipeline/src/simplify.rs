//! Optional polygon decimation using the Ramer-Douglas-Peucker algorithm.
//!
//! Removes vertices that lie within a tolerance of the line between
//! their retained neighbors. Polygons are closed rings, so the ring is
//! split at vertex 0 and at the vertex farthest from it, each half is
//! simplified as an open chain, and the halves are rejoined. The result
//! is still a closed polygon with at least three vertices.

use crate::types::{Point, Polygon};

/// Simplify a closed polygon.
///
/// A tolerance of 0.0 keeps every vertex that is not exactly collinear
/// with its neighbors. If decimation would leave fewer than three
/// vertices, the polygon is returned unchanged.
#[must_use = "returns the simplified polygon"]
pub fn simplify_polygon(polygon: &Polygon, tolerance: f64) -> Polygon {
    let points = polygon.vertices();
    let n = points.len();
    if n <= 3 {
        return polygon.clone();
    }

    // Split the ring at vertex 0 and the vertex farthest from it.
    let split = (1..n)
        .max_by(|&a, &b| {
            points[0]
                .distance_squared(points[a])
                .total_cmp(&points[0].distance_squared(points[b]))
        })
        .unwrap_or(n / 2);

    let mut kept = vec![false; n];
    kept[0] = true;
    kept[split] = true;

    // First half: 0..=split.
    rdp_recurse(points, 0, split, tolerance, &mut kept);

    // Second half: split..=n (vertex n is vertex 0 again).
    let mut ring: Vec<Point> = points[split..].to_vec();
    ring.push(points[0]);
    let mut kept_tail = vec![false; ring.len()];
    let last = ring.len() - 1;
    rdp_recurse(&ring, 0, last, tolerance, &mut kept_tail);
    for (offset, keep) in kept_tail.iter().enumerate().take(last).skip(1) {
        if *keep {
            kept[split + offset] = true;
        }
    }

    let simplified: Vec<Point> = points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();

    Polygon::try_new(simplified).unwrap_or_else(|_| polygon.clone())
}

/// Simplify with a tolerance proportional to the polygon's perimeter.
#[must_use = "returns the simplified polygon"]
pub fn simplify_by_perimeter_ratio(polygon: &Polygon, ratio: f64) -> Polygon {
    simplify_polygon(polygon, ratio * polygon.perimeter_px())
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line through `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}
