//! Adaptive clusterer: chooses the number of groups from the data.
//!
//! ```text
//! n == 0            -> []
//! n == 1            -> [0]
//! explicit k        -> k-means(k), no search
//! max_k < 1         -> all zeros
//! distortion[1] ~ 0 -> all zeros (homogeneous)
//! otherwise         -> knee of distortion[1..=max_k]
//! ```

use super::kmeans::{self, KMeans, KMeansFit, DEFAULT_SEED};
use super::knee::{KneeDecision, find_knee};
use crate::config::AnalysisConfig;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Absolute distortion under which data counts as a single point.
const ABSOLUTE_TOLERANCE: f64 = 1e-9;

/// Mean squared distance to the centroid under which data counts as
/// homogeneous (an RMS spread of 0.001). Measured from the centroid, so
/// shifting every embedding by the same vector never changes the answer.
const MEAN_SQUARED_TOLERANCE: f64 = 1e-6;

/// How the cluster count was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KSelection {
    /// Zero or one item
    Trivial,
    /// Caller supplied k
    Explicit,
    /// Too few items for even two clusters of the minimum size
    TooSmall,
    /// All points effectively identical
    Homogeneous,
    /// Maximum perpendicular distance on the distortion curve
    Knee,
    /// Flat curve rescued by a strong k=1 to k=2 drop
    StrongDrop,
    /// Flat curve, no natural grouping
    Linear,
}

/// Full result of a clustering run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringOutcome {
    /// Cluster index per input item, in `[0, k)`
    pub assignments: Vec<usize>,
    pub k: usize,
    /// `distortions[i]` is the distortion at `k = i + 1`; empty when no search ran
    pub distortions: Vec<f64>,
    pub selection: KSelection,
}

impl ClusteringOutcome {
    fn uniform(n: usize, selection: KSelection, distortions: Vec<f64>) -> Self {
        Self {
            assignments: vec![0; n],
            k: if n == 0 { 0 } else { 1 },
            distortions,
            selection,
        }
    }

    /// Indices of the items in each cluster, ordered by cluster index.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut groups = vec![Vec::new(); self.k];
        for (i, &c) in self.assignments.iter().enumerate() {
            groups[c].push(i);
        }
        groups
    }
}

/// Groups embeddings without a human-chosen cluster count.
#[derive(Debug, Clone)]
pub struct AdaptiveClusterer {
    config: AnalysisConfig,
    seed: u64,
}

impl AdaptiveClusterer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Cluster index per embedding.
    pub fn cluster(
        &self,
        embeddings: &[Vec<f32>],
        explicit_k: Option<usize>,
    ) -> Result<Vec<usize>, DomainError> {
        self.analyze(embeddings, explicit_k).map(|o| o.assignments)
    }

    /// Cluster and report how `k` was chosen.
    pub fn analyze(
        &self,
        embeddings: &[Vec<f32>],
        explicit_k: Option<usize>,
    ) -> Result<ClusteringOutcome, DomainError> {
        let n = embeddings.len();
        if n <= 1 {
            return Ok(ClusteringOutcome::uniform(n, KSelection::Trivial, Vec::new()));
        }

        let points = kmeans::to_points(embeddings)?;

        if let Some(k) = explicit_k {
            let k = k.clamp(1, n);
            if k == 1 {
                return Ok(ClusteringOutcome::uniform(n, KSelection::Explicit, Vec::new()));
            }
            let fit = self.kmeans(k).fit(&points)?;
            return Ok(Self::outcome(fit, KSelection::Explicit, Vec::new()));
        }

        let max_k = self.config.resolve_max_k(n);
        if max_k < 1 {
            return Ok(ClusteringOutcome::uniform(n, KSelection::TooSmall, Vec::new()));
        }

        let base = self.kmeans(1).fit(&points)?;
        if self.is_homogeneous(base.distortion, &points) {
            return Ok(ClusteringOutcome::uniform(
                n,
                KSelection::Homogeneous,
                vec![base.distortion],
            ));
        }

        let fits = self.distortion_curve(&points, base, max_k)?;
        let distortions: Vec<f64> = fits.iter().map(|f| f.distortion).collect();

        let (k, selection) = match find_knee(&distortions) {
            KneeDecision::Knee { k } => (k, KSelection::Knee),
            KneeDecision::StrongDrop { k } => (k, KSelection::StrongDrop),
            KneeDecision::Linear => (1, KSelection::Linear),
        };

        if k == 1 {
            return Ok(ClusteringOutcome::uniform(n, selection, distortions));
        }

        let fit = fits
            .into_iter()
            .nth(k - 1)
            .ok_or_else(|| DomainError::ClusteringFailed(format!("no fit for k={}", k)))?;
        Ok(Self::outcome(fit, selection, distortions))
    }

    fn kmeans(&self, k: usize) -> KMeans {
        KMeans::new(k).with_seed(self.seed)
    }

    fn is_homogeneous(&self, distortion: f64, points: &[Vec<f64>]) -> bool {
        if distortion <= ABSOLUTE_TOLERANCE {
            return true;
        }
        distortion / points.len() as f64 <= MEAN_SQUARED_TOLERANCE
    }

    /// Fits for `k = 1..=max_k`.
    ///
    /// Each k keeps the better of a seeded k-means++ fit and a warm start
    /// from `k - 1`, which keeps the curve monotonically non-increasing.
    fn distortion_curve(
        &self,
        points: &[Vec<f64>],
        base: KMeansFit,
        max_k: usize,
    ) -> Result<Vec<KMeansFit>, DomainError> {
        let mut fits = Vec::with_capacity(max_k);
        fits.push(base);

        for k in 2..=max_k {
            let previous = &fits[k - 2];
            let fresh = self.kmeans(k).fit(points)?;
            let warm = self.kmeans(k).fit_from(points, previous)?;
            let best = if fresh.distortion <= warm.distortion {
                fresh
            } else {
                warm
            };
            fits.push(best);
        }

        Ok(fits)
    }

    fn outcome(fit: KMeansFit, selection: KSelection, distortions: Vec<f64>) -> ClusteringOutcome {
        let (assignments, k) = relabel(&fit.assignments);
        ClusteringOutcome {
            assignments,
            k,
            distortions,
            selection,
        }
    }
}

/// Renumber clusters by first appearance and drop empty ones.
fn relabel(assignments: &[usize]) -> (Vec<usize>, usize) {
    let mut mapping: Vec<Option<usize>> = Vec::new();
    let mut next = 0;
    let relabelled: Vec<usize> = assignments
        .iter()
        .map(|&c| {
            if c >= mapping.len() {
                mapping.resize(c + 1, None);
            }
            *mapping[c].get_or_insert_with(|| {
                next += 1;
                next - 1
            })
        })
        .collect();
    (relabelled, next)
}
