//! Knee detection on a distortion curve.
//!
//! The curve is normalised to the unit square before measuring, so the
//! linearity threshold is a fraction of the y-range regardless of how
//! large the raw distortion values are.

/// Below this normalised distance the curve is treated as a straight line.
pub const LINEARITY_THRESHOLD: f64 = 0.05;

/// A k=1 to k=2 drop of at least this fraction of `distortion[1]` is "strong".
pub const STRONG_DROP_RATIO: f64 = 0.5;

/// Why a particular cluster count was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KneeDecision {
    /// Point of maximum perpendicular distance to the chord
    Knee { k: usize },
    /// Curve is flat but the first split removes most of the distortion
    StrongDrop { k: usize },
    /// Curve is effectively linear: no natural grouping
    Linear,
}

impl KneeDecision {
    pub fn k(&self) -> usize {
        match self {
            KneeDecision::Knee { k } | KneeDecision::StrongDrop { k } => *k,
            KneeDecision::Linear => 1,
        }
    }
}

/// Pick a cluster count from `distortions`, where `distortions[i]` is the
/// distortion for `k = i + 1`.
pub fn find_knee(distortions: &[f64]) -> KneeDecision {
    if distortions.len() < 2 {
        return KneeDecision::Linear;
    }

    let first = distortions[0];
    let strong_drop = first > 0.0 && (first - distortions[1]) >= STRONG_DROP_RATIO * first;

    let max_y = distortions.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_y = distortions.iter().copied().fold(f64::INFINITY, f64::min);
    let y_range = max_y - min_y;

    let (best_k, best_distance) = if y_range > 0.0 {
        max_chord_distance(distortions, min_y, y_range)
    } else {
        (1, 0.0)
    };

    let is_linear = best_distance < LINEARITY_THRESHOLD;

    match (is_linear, strong_drop) {
        (false, _) => KneeDecision::Knee { k: best_k },
        (true, true) => KneeDecision::StrongDrop { k: 2 },
        (true, false) => KneeDecision::Linear,
    }
}

/// Returns `(k, distance)` of the point farthest from the chord joining the
/// first and last points of the normalised curve.
fn max_chord_distance(distortions: &[f64], min_y: f64, y_range: f64) -> (usize, f64) {
    let last = distortions.len() - 1;
    let normalise = |i: usize| {
        let x = i as f64 / last as f64;
        let y = (distortions[i] - min_y) / y_range;
        (x, y)
    };

    let (x1, y1) = normalise(0);
    let (x2, y2) = normalise(last);
    let dx = x2 - x1;
    let dy = y2 - y1;
    let length = (dx * dx + dy * dy).sqrt();

    let mut best = (1, 0.0);
    for i in 0..=last {
        let (x, y) = normalise(i);
        let distance = (dy * x - dx * y + x2 * y1 - y2 * x1).abs() / length;
        if distance > best.1 {
            best = (i + 1, distance);
        }
    }
    best
}
