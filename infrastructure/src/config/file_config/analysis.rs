//! Analysis tuning from TOML (`[analysis]` section)

use sensemaker_domain::{AnalysisConfig, ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};

/// Analysis tuning from TOML.
///
/// `min_cluster_size` is usually set through the environment
/// (`SENSEMAKER_ANALYSIS__MIN_CLUSTER_SIZE`); leaving it unset selects the
/// size-banded default.
///
/// # Example
///
/// ```toml
/// [analysis]
/// min_cluster_size = 6
/// max_responses_per_call = 40
/// lock_ttl_ms = 600000
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAnalysisConfig {
    pub min_cluster_size: Option<usize>,
    pub max_clusters: Option<usize>,
    pub max_responses_per_call: usize,
    pub lock_ttl_ms: u64,
    pub debug: bool,
}

impl Default for FileAnalysisConfig {
    fn default() -> Self {
        let config = AnalysisConfig::default();
        Self {
            min_cluster_size: config.min_cluster_size,
            max_clusters: config.max_clusters,
            max_responses_per_call: config.max_responses_per_call,
            lock_ttl_ms: config.lock_ttl_ms,
            debug: config.debug,
        }
    }
}

impl FileAnalysisConfig {
    /// Convert to the domain `AnalysisConfig`, returning validation issues.
    ///
    /// If any value violates a constraint the whole section falls back to
    /// `AnalysisConfig::default()` (keeping `debug`) and one warning per
    /// violation is returned.
    pub fn to_analysis_config(&self) -> (AnalysisConfig, Vec<ConfigIssue>) {
        match AnalysisConfig::try_new(
            self.min_cluster_size,
            self.max_clusters,
            self.max_responses_per_call,
            self.lock_ttl_ms,
            self.debug,
        ) {
            Ok(config) => (config, vec![]),
            Err(errors) => {
                let issues = errors
                    .into_iter()
                    .map(|msg| {
                        ConfigIssue::warning(
                            ConfigIssueCode::InvalidConstraint {
                                field: "analysis".to_string(),
                            },
                            msg,
                        )
                    })
                    .collect();
                (AnalysisConfig::default().with_debug(self.debug), issues)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_config_default() {
        let config = FileAnalysisConfig::default();
        assert_eq!(config.max_responses_per_call, 50);
        assert_eq!(config.lock_ttl_ms, 900_000);
        assert!(config.min_cluster_size.is_none());
    }

    #[test]
    fn test_analysis_config_deserialize() {
        let toml_str = r#"
[analysis]
min_cluster_size = 6
max_clusters = 10
debug = true
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        let (analysis, issues) = config.analysis.to_analysis_config();
        assert!(issues.is_empty());
        assert_eq!(analysis.min_cluster_size, Some(6));
        assert_eq!(analysis.max_clusters, Some(10));
        assert_eq!(analysis.max_responses_per_call, 50);
        assert!(analysis.debug);
    }

    #[test]
    fn test_invalid_analysis_falls_back_to_default() {
        let config = FileAnalysisConfig {
            min_cluster_size: Some(0),
            max_responses_per_call: 1,
            debug: true,
            ..Default::default()
        };
        let (analysis, issues) = config.to_analysis_config();
        assert_eq!(issues.len(), 2);
        assert!(
            issues
                .iter()
                .all(|i| matches!(&i.code, ConfigIssueCode::InvalidConstraint { .. }))
        );
        assert_eq!(analysis, AnalysisConfig::default().with_debug(true));
    }
}
