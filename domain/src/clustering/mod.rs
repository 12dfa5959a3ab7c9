//! Clustering of embedded responses
//!
//! # Components
//!
//! - [`adaptive::AdaptiveClusterer`]: picks `k` from the distortion curve
//! - [`kmeans::KMeans`]: seeded Lloyd's k-means used for every fit
//! - [`knee`]: knee detection with linearity and strong-drop guards
//! - [`outlier::filter_outliers`]: IQR filter for 2-D layout points
//! - [`summary::summarize`]: per-cluster sizes and filtered layout points

pub mod adaptive;
pub mod kmeans;
pub mod knee;
pub mod outlier;
pub mod summary;

pub use adaptive::{AdaptiveClusterer, ClusteringOutcome, KSelection};
pub use kmeans::{KMeans, KMeansFit};
pub use knee::{KneeDecision, find_knee};
pub use outlier::{DEFAULT_IQR_THRESHOLD, Point2D, filter_outliers};
pub use summary::{ClusterSummary, summarize};
