//! Console output formatter for analysis reports

use colored::Colorize;
use sensemaker_domain::{AnalysisReport, OutputFormat, StatementAgreement};
use std::collections::HashMap;

/// Formats analysis reports for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Render in the requested format.
    pub fn render(report: &AnalysisReport, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => Self::format(report),
            OutputFormat::Json => Self::format_json(report),
        }
    }

    /// Format the complete report
    pub fn format(report: &AnalysisReport) -> String {
        let mut output = String::new();
        let agreements: HashMap<&str, &StatementAgreement> = report
            .agreements
            .iter()
            .map(|a| (a.statement_id.as_str(), a))
            .collect();

        output.push_str(&Self::header("Analysis Results"));
        output.push('\n');

        output.push_str(&format!(
            "{} {}\n",
            "Conversation:".cyan().bold(),
            report.conversation_id
        ));
        output.push_str(&format!(
            "{} {} responses in {} clusters (k chosen by {:?})\n",
            "Grouping:".cyan().bold(),
            report.response_count,
            report.clustering.k,
            report.clustering.selection
        ));

        if report.degraded_clusters() > 0 {
            output.push_str(&format!(
                "{} {} cluster(s) fell back to raw responses\n",
                "Warning:".yellow().bold(),
                report.degraded_clusters()
            ));
        }

        for result in &report.consolidations {
            output.push_str(&Self::section_header(&format!(
                "Cluster {}",
                result.cluster_index + 1
            )));

            for bucket in &result.buckets {
                output.push_str(&format!(
                    "\n{} {}\n",
                    format!("── {} ──", bucket.bucket_name).yellow().bold(),
                    format!("({} responses)", bucket.len()).dimmed()
                ));
                output.push_str(&format!("{}\n", bucket.consolidated_statement));
                if let Some(agreement) = bucket
                    .representative_id()
                    .and_then(|id| agreements.get(id.as_str()))
                {
                    output.push_str(&Self::agreement_line(agreement));
                }
            }

            if !result.unconsolidated_ids.is_empty() {
                output.push_str(&format!(
                    "\n{} {}\n",
                    "Unconsolidated:".dimmed(),
                    result
                        .unconsolidated_ids
                        .iter()
                        .map(|id| id.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        }

        let metrics = &report.metrics;
        output.push_str(&Self::section_header("Participation"));
        output.push_str(&format!(
            "  {} votes from {} voters on {} statements\n",
            metrics.total_votes, metrics.unique_voters, metrics.total_statements
        ));
        output.push_str(&format!(
            "  {}% of {} participants voted, {}% vote coverage\n",
            metrics.participant_voting_percent,
            metrics.total_participants,
            metrics.vote_coverage_percent
        ));

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(report: &AnalysisReport) -> String {
        serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
    }

    fn agreement_line(agreement: &StatementAgreement) -> String {
        if agreement.total == 0 {
            return format!("  {}\n", "no votes yet".dimmed());
        }
        format!(
            "  {} {}%  {} {}%  {} {}%  (score {:+.2}, {} votes)\n",
            "agree".green(),
            agreement.agree_percent,
            "disagree".red(),
            agreement.disagree_percent,
            "pass".dimmed(),
            agreement.pass_percent,
            agreement.consensus_score,
            agreement.total
        )
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}
