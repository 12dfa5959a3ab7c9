//! Lloyd's k-means with seeded k-means++ initialisation.
//!
//! Points are converted to `f64` once up front; every distance in this
//! module is a squared Euclidean distance.

use crate::core::error::DomainError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Seed used when none is supplied. Fixed so identical input always
/// produces identical clusters.
pub const DEFAULT_SEED: u64 = 42;

const DEFAULT_MAX_ITERATIONS: usize = 300;

/// Result of a single k-means fit
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    /// Cluster index per point, in `[0, k)`
    pub assignments: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    /// Sum of squared distances from each point to its centroid
    pub distortion: f64,
    pub iterations: usize,
}

impl KMeansFit {
    pub fn k(&self) -> usize {
        self.centroids.len()
    }
}

/// K-means configuration
#[derive(Debug, Clone, Copy)]
pub struct KMeans {
    k: usize,
    seed: u64,
    max_iterations: usize,
}

impl KMeans {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            seed: DEFAULT_SEED,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Fit from a k-means++ initialisation.
    pub fn fit(&self, points: &[Vec<f64>]) -> Result<KMeansFit, DomainError> {
        check_points(points)?;
        if self.k == 0 {
            return Err(DomainError::ClusteringFailed(
                "cluster count must be at least 1".to_string(),
            ));
        }
        let k = self.k.min(points.len());
        let mut rng = StdRng::seed_from_u64(self.seed);
        let centroids = kmeans_plus_plus(points, k, &mut rng);
        lloyd(points, centroids, self.max_iterations)
    }

    /// Fit starting from an existing solution with one extra centroid.
    ///
    /// The new centroid is placed on the point farthest from its current
    /// centroid. Lloyd iterations never increase distortion, so the result
    /// is never worse than `previous`.
    pub fn fit_from(
        &self,
        points: &[Vec<f64>],
        previous: &KMeansFit,
    ) -> Result<KMeansFit, DomainError> {
        check_points(points)?;
        let mut centroids = previous.centroids.clone();
        if let Some(idx) = farthest_point(points, &previous.assignments, &centroids) {
            centroids.push(points[idx].clone());
        }
        lloyd(points, centroids, self.max_iterations)
    }
}

/// Convert raw embeddings to `f64` points, rejecting ragged or non-finite input.
pub fn to_points(embeddings: &[Vec<f32>]) -> Result<Vec<Vec<f64>>, DomainError> {
    let Some(first) = embeddings.first() else {
        return Ok(Vec::new());
    };
    let dim = first.len();
    if dim == 0 {
        return Err(DomainError::InvalidEmbeddings(
            "embeddings have zero dimensions".to_string(),
        ));
    }

    embeddings
        .iter()
        .enumerate()
        .map(|(i, e)| {
            if e.len() != dim {
                return Err(DomainError::InvalidEmbeddings(format!(
                    "embedding {} has {} dimensions, expected {}",
                    i,
                    e.len(),
                    dim
                )));
            }
            if e.iter().any(|v| !v.is_finite()) {
                return Err(DomainError::InvalidEmbeddings(format!(
                    "embedding {} contains non-finite values",
                    i
                )));
            }
            Ok(e.iter().map(|&v| v as f64).collect())
        })
        .collect()
}

/// Sum of squared distances from each point to its assigned centroid.
pub fn distortion(points: &[Vec<f64>], assignments: &[usize], centroids: &[Vec<f64>]) -> f64 {
    points
        .iter()
        .zip(assignments)
        .map(|(p, &c)| squared_distance(p, &centroids[c]))
        .sum()
}

pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn check_points(points: &[Vec<f64>]) -> Result<(), DomainError> {
    if points.is_empty() {
        return Err(DomainError::ClusteringFailed(
            "no points to cluster".to_string(),
        ));
    }
    Ok(())
}

fn kmeans_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut chosen = vec![false; n];
    let mut centroids = Vec::with_capacity(k);

    let first = rng.gen_range(0..n);
    chosen[first] = true;
    centroids.push(points[first].clone());

    let mut min_dist: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &points[first]))
        .collect();

    while centroids.len() < k {
        let total: f64 = min_dist.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen_range(0.0..total);
            let mut pick = None;
            for (i, &d) in min_dist.iter().enumerate() {
                if d <= 0.0 {
                    continue;
                }
                if target < d {
                    pick = Some(i);
                    break;
                }
                target -= d;
            }
            // Rounding can leave `target` just past the last weight.
            pick.or_else(|| min_dist.iter().rposition(|&d| d > 0.0))
        } else {
            None
        };

        // All remaining points coincide with a centroid: take any unused one.
        let Some(idx) = next.or_else(|| chosen.iter().position(|c| !c)) else {
            break;
        };

        chosen[idx] = true;
        centroids.push(points[idx].clone());
        for (d, p) in min_dist.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &points[idx]));
        }
    }

    centroids
}

fn lloyd(
    points: &[Vec<f64>],
    mut centroids: Vec<Vec<f64>>,
    max_iterations: usize,
) -> Result<KMeansFit, DomainError> {
    let n = points.len();
    let k = centroids.len();
    let dim = points[0].len();
    let mut assignments = vec![usize::MAX; n];
    let mut iterations = 0;

    loop {
        iterations += 1;

        // Assignment step
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let nearest = nearest_centroid(p, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        if !changed || iterations >= max_iterations {
            break;
        }

        // Update step
        let mut sums = vec![vec![0.0f64; dim]; k];
        let mut counts = vec![0usize; k];
        for (p, &c) in points.iter().zip(&assignments) {
            counts[c] += 1;
            for (s, v) in sums[c].iter_mut().zip(p) {
                *s += v;
            }
        }
        for c in 0..k {
            if counts[c] > 0 {
                centroids[c] = sums[c].iter().map(|s| s / counts[c] as f64).collect();
            }
        }

        // Re-seed empty clusters on the worst-fitting point of a shared cluster.
        for c in 0..k {
            if counts[c] > 0 {
                continue;
            }
            let donor = points
                .iter()
                .enumerate()
                .filter(|(i, _)| counts[assignments[*i]] > 1)
                .map(|(i, p)| (i, squared_distance(p, &centroids[assignments[i]])))
                .filter(|(_, d)| *d > 0.0)
                .max_by(|a, b| a.1.total_cmp(&b.1));
            if let Some((i, _)) = donor {
                counts[assignments[i]] -= 1;
                counts[c] += 1;
                centroids[c] = points[i].clone();
                assignments[i] = c;
            }
        }
    }

    let distortion = distortion(points, &assignments, &centroids);
    if !distortion.is_finite() {
        return Err(DomainError::ClusteringFailed(format!(
            "distortion is not finite for k={}",
            k
        )));
    }

    Ok(KMeansFit {
        assignments,
        centroids,
        distortion,
        iterations,
    })
}

fn nearest_centroid(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn farthest_point(points: &[Vec<f64>], assignments: &[usize], centroids: &[Vec<f64>]) -> Option<usize> {
    points
        .iter()
        .zip(assignments)
        .enumerate()
        .map(|(i, (p, &c))| (i, squared_distance(p, &centroids[c])))
        .filter(|(_, d)| *d > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_blobs() -> Vec<Vec<f64>> {
        let mut points = Vec::new();
        for i in 0..10 {
            let j = i as f64 * 0.01;
            points.push(vec![0.0 + j, 0.0 - j]);
            points.push(vec![10.0 + j, 10.0 - j]);
        }
        points
    }

    #[test]
    fn test_fit_separates_blobs() {
        let points = two_blobs();
        let fit = KMeans::new(2).fit(&points).unwrap();

        assert_eq!(fit.k(), 2);
        // Interleaved input: even indices are blob A, odd are blob B
        let a = fit.assignments[0];
        let b = fit.assignments[1];
        assert_ne!(a, b);
        for (i, &c) in fit.assignments.iter().enumerate() {
            assert_eq!(c, if i % 2 == 0 { a } else { b });
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let points = two_blobs();
        let first = KMeans::new(3).with_seed(7).fit(&points).unwrap();
        let second = KMeans::new(3).with_seed(7).fit(&points).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_k_one_distortion_is_total_variance() {
        let points = vec![vec![0.0, 0.0], vec![2.0, 0.0]];
        let fit = KMeans::new(1).fit(&points).unwrap();
        assert_eq!(fit.assignments, vec![0, 0]);
        assert!((fit.distortion - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_k_equals_n_gives_singletons() {
        let points = vec![vec![0.0], vec![1.0], vec![5.0], vec![9.0]];
        let fit = KMeans::new(4).fit(&points).unwrap();
        let mut seen = fit.assignments.clone();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
        assert!(fit.distortion.abs() < 1e-12);
    }

    #[test]
    fn test_fit_from_never_increases_distortion() {
        let points = two_blobs();
        let mut previous = KMeans::new(1).fit(&points).unwrap();
        for k in 2..=6 {
            let next = KMeans::new(k).fit_from(&points, &previous).unwrap();
            assert!(next.distortion <= previous.distortion + 1e-9);
            previous = next;
        }
    }

    #[test]
    fn test_duplicate_points_do_not_panic() {
        let points = vec![vec![1.0, 1.0]; 5];
        let fit = KMeans::new(3).fit(&points).unwrap();
        assert_eq!(fit.assignments.len(), 5);
        assert!(fit.distortion.abs() < 1e-12);
    }

    #[test]
    fn test_to_points_rejects_ragged_input() {
        let err = to_points(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidEmbeddings(_)));
    }

    #[test]
    fn test_to_points_rejects_nan() {
        let err = to_points(&[vec![f32::NAN]]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidEmbeddings(_)));
    }

    #[test]
    fn test_zero_k_is_an_error() {
        let err = KMeans::new(0).fit(&[vec![1.0]]).unwrap_err();
        assert!(err.is_clustering_failure());
    }
}
