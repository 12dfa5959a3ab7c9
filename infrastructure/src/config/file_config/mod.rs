//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and use domain types where appropriate.

mod analysis;
mod output;
mod providers;
mod storage;

pub use analysis::FileAnalysisConfig;
pub use output::FileOutputConfig;
pub use providers::{FileEmbeddingConfig, FileLlmConfig};
pub use storage::{FileDatabaseConfig, FileLoggingConfig};

use sensemaker_domain::ConfigIssue;
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Clustering, batching and job-lock tuning
    pub analysis: FileAnalysisConfig,
    /// Consolidation model provider
    pub llm: FileLlmConfig,
    /// Embedding provider
    pub embedding: FileEmbeddingConfig,
    pub database: FileDatabaseConfig,
    pub logging: FileLoggingConfig,
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    ///
    /// Warnings mean a default was substituted; errors mean the process
    /// cannot run with this configuration.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        issues.extend(self.analysis.to_analysis_config().1);
        issues.extend(self.llm.validate());
        issues.extend(self.embedding.validate());
        issues.extend(self.database.validate());
        issues.extend(self.logging.parse_level().1);
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensemaker_domain::{Model, OutputFormat};

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[analysis]
max_responses_per_call = 30
lock_ttl_ms = 60000

[llm]
model = "gpt-4.1"
temperature = 0.2

[embedding]
model = "text-embedding-3-large"
batch_size = 16

[database]
url = "sqlite://analysis.db"

[logging]
level = "warn"

[output]
format = "json"
color = false
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.analysis.max_responses_per_call, 30);
        assert_eq!(config.analysis.lock_ttl_ms, 60_000);
        assert_eq!(config.llm.parse_model().0, Model::Gpt41);
        assert_eq!(config.embedding.batch_size, 16);
        assert_eq!(config.database.url, "sqlite://analysis.db");
        assert_eq!(config.output.format, Some(OutputFormat::Json));
        assert!(!config.output.color);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let toml_str = r#"
[llm]
model = "gpt-4o"
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.parse_model().0, Model::Gpt4o);
        // Defaults should apply
        assert_eq!(config.analysis.max_responses_per_call, 50);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert!(config.logging.event_log.is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        let config = FileConfig::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_collects_every_section() {
        let toml_str = r#"
[analysis]
max_responses_per_call = 0

[database]
url = ""

[logging]
level = "chatty"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let issues = config.validate();
        assert_eq!(issues.len(), 3);
        assert_eq!(issues.iter().filter(|i| i.is_error()).count(), 1);
    }
}
