//! CLI command definitions

use clap::{Parser, Subcommand, ValueEnum};
use sensemaker_domain::AnalysisStrategy;
use std::path::PathBuf;

/// Output format for analysis reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// The full report as JSON
    Json,
}

impl From<OutputFormat> for sensemaker_domain::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => sensemaker_domain::OutputFormat::Text,
            OutputFormat::Json => sensemaker_domain::OutputFormat::Json,
        }
    }
}

/// Re-analysis strategy accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyArg {
    Full,
    Incremental,
}

impl From<StrategyArg> for AnalysisStrategy {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::Full => AnalysisStrategy::Full,
            StrategyArg::Incremental => AnalysisStrategy::Incremental,
        }
    }
}

/// CLI arguments for sensemaker
#[derive(Parser, Debug)]
#[command(name = "sensemaker")]
#[command(author, version, about = "Group free-text responses into themes and measure agreement")]
#[command(long_about = r#"
Sensemaker analyses the free-text responses of a conversation.

A run has four phases:
1. Embedding: every response is turned into a vector
2. Clustering: responses are grouped with an automatically chosen k
3. Consolidation: a language model merges each group into statements
4. Consensus: feedback votes are tallied per statement

Runs are tracked as jobs. Only one worker can own a job at a time; a
worker that stalls past the lock TTL is replaced, and its late result is
discarded.

Configuration files are loaded from (in priority order):
1. SENSEMAKER_* environment variables (e.g. SENSEMAKER_ANALYSIS__MIN_CLUSTER_SIZE)
2. --config <path>         Explicit config file
3. ./sensemaker.toml       Project-level config
4. ~/.config/sensemaker/config.toml   Global config

Example:
  sensemaker init-db
  sensemaker analyze conv-42
  sensemaker enqueue conv-42 --strategy incremental
  sensemaker run 1f0c6a52-7d0e-4f55-9b1e-2d8e5b0a9c11
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output format (overrides [output] format)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a queued analysis job and print its id
    Enqueue {
        conversation_id: String,
        #[arg(long, value_enum, default_value = "full")]
        strategy: StrategyArg,
    },
    /// Claim and run an existing job
    Run { job_id: String },
    /// Enqueue a job for a conversation and run it immediately
    Analyze {
        conversation_id: String,
        #[arg(long, value_enum, default_value = "full")]
        strategy: StrategyArg,
    },
    /// Create the database schema
    InitDb,
    /// List the models the configured LLM endpoint serves
    Models,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_analyze_with_strategy() {
        let cli = Cli::parse_from([
            "sensemaker",
            "-vv",
            "--output",
            "json",
            "analyze",
            "conv-1",
            "--strategy",
            "incremental",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert_eq!(
            cli.command,
            Some(Command::Analyze {
                conversation_id: "conv-1".to_string(),
                strategy: StrategyArg::Incremental,
            })
        );
    }

    #[test]
    fn test_enqueue_defaults_to_full() {
        let cli = Cli::parse_from(["sensemaker", "enqueue", "conv-1"]);
        let Some(Command::Enqueue { strategy, .. }) = cli.command else {
            panic!("expected enqueue");
        };
        assert_eq!(AnalysisStrategy::from(strategy), AnalysisStrategy::Full);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["sensemaker", "run", "job-1", "--quiet", "--no-config"]);
        assert!(cli.quiet);
        assert!(cli.no_config);
        assert_eq!(
            cli.command,
            Some(Command::Run {
                job_id: "job-1".to_string()
            })
        );
    }

    #[test]
    fn test_models_subcommand() {
        let cli = Cli::parse_from(["sensemaker", "models"]);
        assert_eq!(cli.command, Some(Command::Models));
    }

    #[test]
    fn test_show_config_without_subcommand() {
        let cli = Cli::parse_from(["sensemaker", "--show-config"]);
        assert!(cli.show_config);
        assert!(cli.command.is_none());
    }
}
