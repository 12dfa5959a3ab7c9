//! CLI entrypoint for sensemaker
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use sensemaker_application::{
    AnalysisEventLogger, AnalysisProgressNotifier, BehaviorConfig, ConsolidateClustersUseCase,
    JobRepository, LlmGateway, NoProgress, RunAnalysisOutcome, RunAnalysisUseCase,
};
use sensemaker_domain::{AnalysisConfig, AnalysisJob, AnalysisStrategy, ConversationId, Severity};
use sensemaker_infrastructure::{
    ChatSettings, ConfigLoader, FileConfig, JsonlAnalysisLogger, OpenAiEmbeddingService,
    OpenAiGateway, SqliteStore,
};
use sensemaker_presentation::{Cli, Command, ConsoleFormatter, ProgressReporter, SimpleProgress};
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CRATE_TARGETS: [&str; 4] = [
    "sensemaker",
    "sensemaker_domain",
    "sensemaker_application",
    "sensemaker_infrastructure",
];

/// Filter directives for the subscriber.
///
/// `-v` counts win over the configured level; `analysis.debug` raises our
/// own crates to `debug` without making dependencies noisy.
fn log_directives(verbose: u8, configured: Option<&str>, analysis_debug: bool) -> String {
    let base = match verbose {
        0 => configured.unwrap_or("warn"),
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    if analysis_debug && matches!(base, "warn" | "error" | "info") {
        let crates: Vec<String> = CRATE_TARGETS
            .iter()
            .map(|target| format!("{}=debug", target))
            .collect();
        format!("{},{}", base, crates.join(","))
    } else {
        base.to_string()
    }
}

fn timeout(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}

fn build_gateway(config: &FileConfig) -> Result<OpenAiGateway> {
    let llm = &config.llm;
    if llm.resolve_api_key().is_none() {
        warn!(
            "No API key found in ${}; requests will be sent unauthenticated",
            llm.api_key_env
        );
    }
    OpenAiGateway::new(
        llm.base_url.clone(),
        llm.resolve_api_key(),
        timeout(llm.timeout_seconds),
        ChatSettings {
            max_tokens: Some(llm.max_tokens),
            temperature: llm.temperature,
        },
    )
    .context("failed to create LLM gateway")
}

/// Build the job runner from configuration.
fn build_runner(
    config: &FileConfig,
    analysis: AnalysisConfig,
    store: Arc<SqliteStore>,
) -> Result<RunAnalysisUseCase<OpenAiGateway>> {
    let llm = &config.llm;
    let (model, _) = llm.parse_model();
    let gateway = Arc::new(build_gateway(config)?);

    let embedding = &config.embedding;
    let embedder = Arc::new(
        OpenAiEmbeddingService::new(
            embedding.base_url.clone(),
            embedding.resolve_api_key(),
            embedding.model.clone(),
            embedding.batch_size,
            timeout(embedding.timeout_seconds),
        )
        .context("failed to create embedding service")?,
    );

    let mut consolidator = ConsolidateClustersUseCase::new(gateway, model, analysis.clone())
        .with_behavior(BehaviorConfig::from_timeout_seconds(Some(
            llm.timeout_seconds,
        )));

    let event_logger: Option<Arc<dyn AnalysisEventLogger>> = config
        .logging
        .event_log
        .as_ref()
        .and_then(JsonlAnalysisLogger::open)
        .map(|logger| {
            info!("Writing analysis events to {}", logger.path().display());
            Arc::new(logger) as Arc<dyn AnalysisEventLogger>
        });

    if let Some(logger) = &event_logger {
        consolidator = consolidator.with_logger(Arc::clone(logger));
    }

    let mut runner = RunAnalysisUseCase::new(
        store.clone(),
        store,
        embedder,
        consolidator,
        analysis,
    );
    if let Some(logger) = event_logger {
        runner = runner.with_logger(logger);
    }
    Ok(runner)
}

async fn create_job(
    store: &SqliteStore,
    conversation_id: &str,
    strategy: AnalysisStrategy,
) -> Result<AnalysisJob> {
    let job = AnalysisJob::new(
        uuid::Uuid::new_v4().to_string(),
        ConversationId::new(conversation_id),
        strategy,
    );
    store
        .create_job(&job)
        .await
        .context("failed to create analysis job")?;
    info!("Queued job {} for conversation {}", job.id, conversation_id);
    Ok(job)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
    }

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
    }
    .map_err(|e| anyhow::anyhow!("failed to load configuration: {}", e))?;

    if cli.show_config {
        println!();
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let (level, _) = config.logging.parse_level();
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) if cli.verbose == 0 => EnvFilter::from_default_env(),
        _ => EnvFilter::new(log_directives(
            cli.verbose,
            level.as_deref(),
            config.analysis.debug,
        )),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting sensemaker");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            Severity::Warning => warn!("config: {}", issue.message),
            Severity::Error => tracing::error!("config: {}", issue.message),
        }
    }
    if issues.iter().any(|i| i.is_error()) {
        bail!("configuration has errors, see above");
    }
    let (analysis, _) = config.analysis.to_analysis_config();

    if !config.output.color {
        colored::control::set_override(false);
    }
    let format = cli
        .output
        .map(Into::into)
        .or(config.output.format)
        .unwrap_or_default();

    let Some(command) = cli.command.clone() else {
        Cli::command().print_help()?;
        return Ok(());
    };

    if command == Command::Models {
        let models = build_gateway(&config)?
            .available_models()
            .await
            .context("failed to list models")?;
        for model in models {
            let marker = if model.supports_json_mode() { "json" } else { "" };
            println!("{:<40} {}", model, marker);
        }
        return Ok(());
    }

    // === Dependency Injection ===
    let store = Arc::new(
        SqliteStore::connect(&config.database.url, config.database.max_connections)
            .await
            .context("failed to open database")?,
    );

    let job_id = match command {
        Command::InitDb => {
            store.initialize().await?;
            println!("Database initialized at {}", config.database.url);
            return Ok(());
        }
        Command::Enqueue {
            conversation_id,
            strategy,
        } => {
            let job = create_job(&store, &conversation_id, strategy.into()).await?;
            println!("{}", job.id);
            return Ok(());
        }
        Command::Models => return Ok(()),
        Command::Run { job_id } => job_id,
        Command::Analyze {
            conversation_id,
            strategy,
        } => create_job(&store, &conversation_id, strategy.into()).await?.id,
    };

    let runner = build_runner(&config, analysis, store)?;

    let progress: Box<dyn AnalysisProgressNotifier> = if cli.quiet || !config.output.show_progress
    {
        Box::new(NoProgress)
    } else if std::io::stderr().is_terminal() {
        Box::new(ProgressReporter::new())
    } else {
        Box::new(SimpleProgress)
    };

    match runner.execute_with_progress(&job_id, progress.as_ref()).await? {
        RunAnalysisOutcome::Completed(report) => {
            println!("{}", ConsoleFormatter::render(&report, format));
        }
        RunAnalysisOutcome::NotClaimed => {
            eprintln!(
                "Job {} was not claimed: it is finished or owned by another worker",
                job_id
            );
        }
        RunAnalysisOutcome::Superseded => {
            bail!(
                "job {} was reclaimed by another worker; this result was discarded",
                job_id
            );
        }
    }

    Ok(())
}
