//! `[database]` and `[logging]` sections

use sensemaker_domain::{ConfigIssue, ConfigIssueCode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDatabaseConfig {
    /// sqlx connection URL
    pub url: String,
    pub max_connections: u32,
}

impl Default for FileDatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://sensemaker.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Default tracing level when neither `-v` nor `RUST_LOG` is given
    pub level: Option<String>,
    /// JSONL analysis event log; disabled when unset
    pub event_log: Option<PathBuf>,
}

impl FileLoggingConfig {
    /// The configured level if it is one tracing understands.
    pub fn parse_level(&self) -> (Option<String>, Vec<ConfigIssue>) {
        let Some(level) = &self.level else {
            return (None, vec![]);
        };
        let normalized = level.trim().to_lowercase();
        if LOG_LEVELS.contains(&normalized.as_str()) {
            return (Some(normalized), vec![]);
        }
        let issue = ConfigIssue::warning(
            ConfigIssueCode::InvalidEnumValue {
                field: "logging.level".to_string(),
                value: level.clone(),
            },
            format!(
                "logging.level: unknown value '{}', expected one of {}",
                level,
                LOG_LEVELS.join(", ")
            ),
        );
        (None, vec![issue])
    }
}

impl FileDatabaseConfig {
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.url.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyValue {
                    field: "database.url".to_string(),
                },
                "database.url cannot be empty",
            ));
        }
        if self.max_connections == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidConstraint {
                    field: "database.max_connections".to_string(),
                },
                "database.max_connections must be at least 1, using 1",
            ));
        }
        issues
    }
}
