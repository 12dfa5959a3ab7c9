//! Configuration file loading for sensemaker
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `SENSEMAKER_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./sensemaker.toml` or `./.sensemaker.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/sensemaker/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileAnalysisConfig, FileConfig, FileDatabaseConfig, FileEmbeddingConfig, FileLlmConfig,
    FileLoggingConfig, FileOutputConfig,
};
pub use loader::{ConfigLoader, ENV_PREFIX};
