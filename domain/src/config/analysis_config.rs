//! Analysis tuning value object.
//!
//! Every knob the clusterer, the consolidation engine and the job runner
//! read is carried here and passed in explicitly. Nothing in the domain
//! consults the process environment; overrides are resolved by the
//! configuration loader before this value is built.
//!
//! # Example
//!
//! ```
//! use sensemaker_domain::AnalysisConfig;
//!
//! let config = AnalysisConfig::default().with_min_cluster_size(5);
//! assert_eq!(config.resolve_min_cluster_size(1000), 5);
//! assert_eq!(AnalysisConfig::default().resolve_min_cluster_size(150), 12);
//! ```

use serde::{Deserialize, Serialize};

/// Default number of responses sent to the language model in one call.
pub const DEFAULT_MAX_RESPONSES_PER_CALL: usize = 50;

/// Default lock TTL for a running analysis job (15 minutes).
pub const DEFAULT_LOCK_TTL_MS: u64 = 15 * 60 * 1000;

/// Size-banded default minimum cluster size.
///
/// Larger conversations need larger groups before a split is worth making.
pub fn default_min_cluster_size(n: usize) -> usize {
    match n {
        0..100 => 8,
        100..200 => 12,
        200..400 => 16,
        _ => 20,
    }
}

/// Tuning inputs for a single analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Explicit minimum cluster size; `None` uses [`default_min_cluster_size`].
    pub min_cluster_size: Option<usize>,
    /// Upper bound on the number of clusters evaluated by the knee search.
    pub max_clusters: Option<usize>,
    /// Responses per language-model call; larger clusters are batched.
    pub max_responses_per_call: usize,
    /// Age after which a `running` job is considered abandoned.
    pub lock_ttl_ms: u64,
    /// Log prompts, model output and distortion curves.
    pub debug: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: None,
            max_clusters: None,
            max_responses_per_call: DEFAULT_MAX_RESPONSES_PER_CALL,
            lock_ttl_ms: DEFAULT_LOCK_TTL_MS,
            debug: false,
        }
    }
}

impl AnalysisConfig {
    /// Validate a config, collecting every violated constraint.
    pub fn try_new(
        min_cluster_size: Option<usize>,
        max_clusters: Option<usize>,
        max_responses_per_call: usize,
        lock_ttl_ms: u64,
        debug: bool,
    ) -> Result<Self, Vec<String>> {
        let mut errors = Vec::new();

        if min_cluster_size == Some(0) {
            errors.push("min_cluster_size must be at least 1".to_string());
        }
        if max_clusters == Some(0) {
            errors.push("max_clusters must be at least 1".to_string());
        }
        if max_responses_per_call < 2 {
            errors.push(format!(
                "max_responses_per_call ({}) must be at least 2",
                max_responses_per_call
            ));
        }
        if lock_ttl_ms == 0 {
            errors.push("lock_ttl_ms must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(Self {
                min_cluster_size,
                max_clusters,
                max_responses_per_call,
                lock_ttl_ms,
                debug,
            })
        } else {
            Err(errors)
        }
    }

    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = Some(size.max(1));
        self
    }

    pub fn with_max_clusters(mut self, max: usize) -> Self {
        self.max_clusters = Some(max.max(1));
        self
    }

    pub fn with_max_responses_per_call(mut self, cap: usize) -> Self {
        self.max_responses_per_call = cap.max(2);
        self
    }

    pub fn with_lock_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.lock_ttl_ms = ttl_ms;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Minimum cluster size for a data set of `n` items.
    pub fn resolve_min_cluster_size(&self, n: usize) -> usize {
        self.min_cluster_size
            .unwrap_or_else(|| default_min_cluster_size(n))
            .max(1)
    }

    /// Largest `k` the knee search may evaluate for `n` items.
    ///
    /// `min(n / min_cluster_size, n / 3)`, further capped by `max_clusters`.
    /// A result of 0 means the data is too small to split.
    pub fn resolve_max_k(&self, n: usize) -> usize {
        let by_size = n / self.resolve_min_cluster_size(n);
        let bound = by_size.min(n / 3);
        match self.max_clusters {
            Some(cap) => bound.min(cap),
            None => bound,
        }
    }
}
