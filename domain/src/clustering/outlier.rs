//! Distance-based outlier filter for 2-D layouts.
//!
//! Used before computing cluster boundaries so a handful of far-flung
//! points do not stretch a hull across the whole canvas. The points are
//! only dropped from the geometry, never from the analysis.

use serde::{Deserialize, Serialize};

/// Default IQR multiplier.
pub const DEFAULT_IQR_THRESHOLD: f64 = 2.5;

/// Below this many points the filter is a no-op.
const MIN_POINTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Drop points farther from the centroid than `Q3 + threshold * IQR`.
///
/// Never drops more than half of the points: if the IQR rule would, the
/// nearest half (rounded up) is kept instead. Input order is preserved.
pub fn filter_outliers(points: &[Point2D], threshold: f64) -> Vec<Point2D> {
    let n = points.len();
    if n < MIN_POINTS {
        return points.to_vec();
    }

    let centroid = Point2D::new(
        points.iter().map(|p| p.x).sum::<f64>() / n as f64,
        points.iter().map(|p| p.y).sum::<f64>() / n as f64,
    );
    let distances: Vec<f64> = points.iter().map(|p| p.distance(&centroid)).collect();

    let mut sorted = distances.clone();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let cutoff = q3 + threshold * (q3 - q1);

    let keep_floor = n.div_ceil(2);
    let kept = distances.iter().filter(|&&d| d <= cutoff).count();

    if kept >= keep_floor {
        return points
            .iter()
            .zip(&distances)
            .filter(|(_, d)| **d <= cutoff)
            .map(|(p, _)| *p)
            .collect();
    }

    // Fall back to the nearest half by distance
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));
    let mut keep = vec![false; n];
    for &i in order.iter().take(keep_floor) {
        keep[i] = true;
    }
    points
        .iter()
        .zip(keep)
        .filter(|(_, k)| *k)
        .map(|(p, _)| *p)
        .collect()
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}
