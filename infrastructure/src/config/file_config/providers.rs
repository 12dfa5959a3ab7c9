//! Provider configuration from TOML (`[llm]` and `[embedding]` sections)
//!
//! Both providers speak the OpenAI HTTP API, so the same base URL can point
//! at OpenAI itself, Azure OpenAI, or a self-hosted compatible server.

use sensemaker_domain::{ConfigIssue, ConfigIssueCode, Model};
use serde::{Deserialize, Serialize};

fn resolve_key(api_key: &Option<String>, api_key_env: &str) -> Option<String> {
    api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(api_key_env).ok().filter(|k| !k.is_empty()))
}

/// Chat-completions provider used for consolidation.
///
/// # Example
///
/// ```toml
/// [llm]
/// base_url = "https://api.openai.com/v1"
/// model = "gpt-4o-mini"
/// timeout_seconds = 90
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLlmConfig {
    pub base_url: String,
    /// Environment variable holding the API key (default: "OPENAI_API_KEY").
    pub api_key_env: String,
    /// Direct API key (not recommended, use the env var instead).
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-call timeout; 0 disables it.
    pub timeout_seconds: u64,
}

impl Default for FileLlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            model: Model::default().to_string(),
            max_tokens: 4096,
            temperature: 0.0,
            timeout_seconds: 120,
        }
    }
}

impl FileLlmConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(&self.api_key, &self.api_key_env)
    }

    /// Parse the model name, falling back to the default for an empty one.
    pub fn parse_model(&self) -> (Model, Vec<ConfigIssue>) {
        let name = self.model.trim();
        if name.is_empty() {
            let issue = ConfigIssue::warning(
                ConfigIssueCode::EmptyValue {
                    field: "llm.model".to_string(),
                },
                format!("llm.model is empty, using '{}'", Model::default()),
            );
            return (Model::default(), vec![issue]);
        }
        (Model::from(name), vec![])
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.parse_model().1;
        if self.base_url.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyValue {
                    field: "llm.base_url".to_string(),
                },
                "llm.base_url cannot be empty",
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidConstraint {
                    field: "llm.temperature".to_string(),
                },
                format!(
                    "llm.temperature ({}) is outside 0.0..=2.0 and will be clamped",
                    self.temperature
                ),
            ));
        }
        if self.max_tokens == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidConstraint {
                    field: "llm.max_tokens".to_string(),
                },
                "llm.max_tokens is 0, the provider default will be used",
            ));
        }
        issues
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileEmbeddingConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Texts sent per request.
    pub batch_size: usize,
    pub timeout_seconds: u64,
}

impl Default for FileEmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            batch_size: 64,
            timeout_seconds: 60,
        }
    }
}

impl FileEmbeddingConfig {
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_key(&self.api_key, &self.api_key_env)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.model.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyValue {
                    field: "embedding.model".to_string(),
                },
                "embedding.model cannot be empty",
            ));
        }
        if self.base_url.trim().is_empty() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyValue {
                    field: "embedding.base_url".to_string(),
                },
                "embedding.base_url cannot be empty",
            ));
        }
        if self.batch_size == 0 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidConstraint {
                    field: "embedding.batch_size".to_string(),
                },
                "embedding.batch_size must be at least 1, using 1",
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_defaults() {
        let config = FileLlmConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_llm_deserialize() {
        let toml_str = r#"
[llm]
base_url = "http://localhost:11434/v1"
model = "llama3.1"
timeout_seconds = 0
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(
            config.llm.parse_model().0,
            Model::Custom("llama3.1".to_string())
        );
        assert_eq!(config.llm.timeout_seconds, 0);
        // untouched fields keep defaults
        assert_eq!(config.llm.max_tokens, 4096);
    }

    #[test]
    fn test_empty_model_falls_back() {
        let config = FileLlmConfig {
            model: "  ".to_string(),
            ..Default::default()
        };
        let (model, issues) = config.parse_model();
        assert_eq!(model, Model::default());
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_error());
    }

    #[test]
    fn test_direct_key_wins() {
        let config = FileLlmConfig {
            api_key: Some("sk-direct".to_string()),
            api_key_env: "SENSEMAKER_TEST_UNSET_KEY_VAR".to_string(),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-direct"));
    }

    #[test]
    fn test_missing_key_is_none() {
        let config = FileEmbeddingConfig {
            api_key_env: "SENSEMAKER_TEST_UNSET_KEY_VAR".to_string(),
            ..Default::default()
        };
        assert!(config.resolve_api_key().is_none());
    }

    #[test]
    fn test_embedding_validation() {
        let config = FileEmbeddingConfig {
            model: String::new(),
            batch_size: 0,
            ..Default::default()
        };
        let issues = config.validate();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].is_error());
        assert!(!issues[1].is_error());
    }
}
