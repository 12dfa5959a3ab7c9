//! Per-cluster summaries for display

use super::adaptive::ClusteringOutcome;
use super::outlier::{Point2D, filter_outliers};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_index: usize,
    pub size: usize,
    /// Layout points kept after outlier filtering.
    ///
    /// The pipeline has no 2-D layout of its own, so this is `None` unless a
    /// caller passes one (for example a projection used for plotting) to
    /// [`summarize`].
    pub boundary_points: Option<Vec<Point2D>>,
}

/// Summarise each cluster of `outcome`.
///
/// `layout`, when given, must hold one 2-D point per clustered item. Each
/// cluster's points are passed through [`filter_outliers`] so a few strays
/// do not stretch its drawn boundary; membership itself is unchanged.
pub fn summarize(
    outcome: &ClusteringOutcome,
    layout: Option<&[Point2D]>,
    iqr_threshold: f64,
) -> Vec<ClusterSummary> {
    let layout = layout.filter(|points| points.len() == outcome.assignments.len());

    outcome
        .members()
        .into_iter()
        .enumerate()
        .map(|(cluster_index, members)| {
            let boundary_points = layout.map(|points| {
                let own: Vec<Point2D> = members.iter().map(|&i| points[i]).collect();
                filter_outliers(&own, iqr_threshold)
            });
            ClusterSummary {
                cluster_index,
                size: members.len(),
                boundary_points,
            }
        })
        .collect()
}
